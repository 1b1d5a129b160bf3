//! Playlist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::integrity::{self, DeleteAction, EntityKind};
use crate::models::{NewPlaylist, Playlist, PlaylistEntry, PlaylistId, PlaylistPatch, Song, SongId};
use crate::repositories::{like_substring, Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Filter options for listing playlists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistFilter {
    /// Case-insensitive name substring match
    pub name_contains: Option<String>,
}

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Create a new playlist and return it with its assigned id
    async fn create(&self, input: NewPlaylist) -> Result<Playlist>;

    /// Find a playlist by its ID
    ///
    /// # Returns
    /// - `Ok(Some(playlist))` if found
    /// - `Ok(None)` if not found
    async fn get_by_id(&self, id: PlaylistId) -> Result<Option<Playlist>>;

    /// List playlists matching the filter, ordered by ascending id
    async fn list(&self, filter: PlaylistFilter, page: PageRequest) -> Result<Page<Playlist>>;

    /// Apply a partial update and return the updated playlist
    async fn update(&self, id: PlaylistId, patch: PlaylistPatch) -> Result<Playlist>;

    /// Delete a playlist
    ///
    /// Its entries are join rows and are removed in the same transaction;
    /// the referenced songs are left intact.
    async fn delete(&self, id: PlaylistId) -> Result<()>;

    /// Add a song at the end of a playlist
    ///
    /// # Errors
    /// - `NotFound` when either the playlist or the song does not exist
    /// - `Conflict` when the song is already in the playlist
    async fn add_song(&self, playlist_id: PlaylistId, song_id: SongId) -> Result<PlaylistEntry>;

    /// Remove a song from a playlist
    ///
    /// # Returns
    /// - `Ok(true)` if the entry existed and was removed
    /// - `Ok(false)` if the song was not in the playlist
    async fn remove_song(&self, playlist_id: PlaylistId, song_id: SongId) -> Result<bool>;

    /// Songs in a playlist, in the order they were added
    ///
    /// # Errors
    /// - `NotFound` when the playlist does not exist
    async fn songs_in_playlist(
        &self,
        playlist_id: PlaylistId,
        page: PageRequest,
    ) -> Result<Page<Song>>;

    /// Count total playlists
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of PlaylistRepository
pub struct SqlitePlaylistRepository {
    pool: SqlitePool,
}

impl SqlitePlaylistRepository {
    /// Create a new SqlitePlaylistRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn apply_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PlaylistFilter) {
    qb.push(" WHERE 1=1");
    if let Some(name) = &filter.name_contains {
        qb.push(" AND name LIKE ")
            .push_bind(like_substring(name))
            .push(" ESCAPE '\\'");
    }
}

#[async_trait]
impl PlaylistRepository for SqlitePlaylistRepository {
    async fn create(&self, input: NewPlaylist) -> Result<Playlist> {
        let violations = integrity::validate_new_playlist(&input);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Playlist",
                violations,
            });
        }

        let now = chrono::Utc::now().timestamp();
        let result =
            query("INSERT INTO playlists (name, created_at, updated_at) VALUES (?, ?, ?)")
                .bind(&input.name)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(Playlist {
            id: PlaylistId(result.last_insert_rowid()),
            name: input.name,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: PlaylistId) -> Result<Option<Playlist>> {
        let playlist = query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(playlist)
    }

    async fn list(&self, filter: PlaylistFilter, page: PageRequest) -> Result<Page<Playlist>> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM playlists");
        apply_filter(&mut count_qb, &filter);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM playlists");
        apply_filter(&mut qb, &filter);
        qb.push(" ORDER BY id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let playlists = qb
            .build_query_as::<Playlist>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(playlists, total, page))
    }

    async fn update(&self, id: PlaylistId, patch: PlaylistPatch) -> Result<Playlist> {
        let violations = integrity::validate_playlist_patch(&patch);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Playlist",
                violations,
            });
        }

        let mut tx = self.pool.begin().await?;

        let Some(mut playlist) = query_as::<_, Playlist>("SELECT * FROM playlists WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Err(LibraryError::NotFound {
                entity: "Playlist",
                id: id.0,
            });
        };

        if let Some(name) = patch.name {
            playlist.name = name;
        }
        playlist.updated_at = chrono::Utc::now().timestamp();

        query("UPDATE playlists SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&playlist.name)
            .bind(playlist.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(playlist)
    }

    async fn delete(&self, id: PlaylistId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Playlist, id.0).await?;

        if let DeleteAction::Cascade(set) =
            integrity::resolve_delete_action(&mut *tx, EntityKind::Playlist, id.0, false).await?
        {
            debug!(
                playlist_id = %id,
                playlist_entries = set.playlist_entries,
                "Removing entries with playlist"
            );
            query("DELETE FROM playlist_songs WHERE playlist_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        query("DELETE FROM playlists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add_song(&self, playlist_id: PlaylistId, song_id: SongId) -> Result<PlaylistEntry> {
        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Playlist, playlist_id.0).await?;
        integrity::require_foreign_key(&mut *tx, EntityKind::Song, song_id.0).await?;

        // Append position: one past the current maximum
        let (position,): (i64,) = query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_songs WHERE playlist_id = ?",
        )
        .bind(playlist_id)
        .fetch_one(&mut *tx)
        .await?;

        let added_at = chrono::Utc::now().timestamp();
        query(
            "INSERT INTO playlist_songs (playlist_id, song_id, position, added_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(song_id)
        .bind(position)
        .bind(added_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            LibraryError::on_conflict(
                "PlaylistEntry",
                &format!(
                    "song {} is already in playlist {}",
                    song_id, playlist_id
                ),
                e,
            )
        })?;

        tx.commit().await?;

        Ok(PlaylistEntry {
            playlist_id,
            song_id,
            position,
            added_at,
        })
    }

    async fn remove_song(&self, playlist_id: PlaylistId, song_id: SongId) -> Result<bool> {
        let result =
            query("DELETE FROM playlist_songs WHERE playlist_id = ? AND song_id = ?")
                .bind(playlist_id)
                .bind(song_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn songs_in_playlist(
        &self,
        playlist_id: PlaylistId,
        page: PageRequest,
    ) -> Result<Page<Song>> {
        let mut conn = self.pool.acquire().await?;

        integrity::require_foreign_key(&mut *conn, EntityKind::Playlist, playlist_id.0).await?;

        let (total,): (i64,) =
            query_as("SELECT COUNT(*) FROM playlist_songs WHERE playlist_id = ?")
                .bind(playlist_id)
                .fetch_one(&mut *conn)
                .await?;

        let songs = query_as::<_, Song>(
            "SELECT s.* FROM songs s \
             INNER JOIN playlist_songs ps ON ps.song_id = s.id \
             WHERE ps.playlist_id = ? \
             ORDER BY ps.position ASC LIMIT ? OFFSET ?",
        )
        .bind(playlist_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok(Page::new(songs, total, page))
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM playlists")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
