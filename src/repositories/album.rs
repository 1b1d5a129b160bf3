//! Album repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::integrity::{self, DeleteAction, EntityKind};
use crate::models::{Album, AlbumId, AlbumPatch, ArtistId, NewAlbum};
use crate::repositories::{like_substring, Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Filter options for listing albums.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumFilter {
    /// Restrict to albums owned by this artist
    pub artist_id: Option<ArtistId>,
    /// Case-insensitive name substring match
    pub name_contains: Option<String>,
}

/// Album repository interface for data access operations
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Create a new album and return it with its assigned id
    ///
    /// # Errors
    /// - `Validation` when the name is empty
    /// - `NotFound` when the referenced artist does not exist
    async fn create(&self, input: NewAlbum) -> Result<Album>;

    /// Find an album by its ID
    ///
    /// # Returns
    /// - `Ok(Some(album))` if found
    /// - `Ok(None)` if not found
    async fn get_by_id(&self, id: AlbumId) -> Result<Option<Album>>;

    /// List albums matching the filter, ordered by ascending id
    async fn list(&self, filter: AlbumFilter, page: PageRequest) -> Result<Page<Album>>;

    /// Apply a partial update and return the updated album
    ///
    /// # Errors
    /// - `NotFound` when the id is absent, or a changed `artist_id` is
    ///   dangling
    /// - `Validation` when a changed field violates a rule
    async fn update(&self, id: AlbumId, patch: AlbumPatch) -> Result<Album>;

    /// Delete an album under the restrict policy
    ///
    /// # Errors
    /// - `Conflict` while any song references the album
    /// - `NotFound` when the id is absent
    async fn delete(&self, id: AlbumId) -> Result<()>;

    /// Delete an album together with its songs and their playlist entries
    async fn delete_cascade(&self, id: AlbumId) -> Result<()>;

    /// Albums owned by an artist, ordered by ascending id
    async fn albums_by_artist(
        &self,
        artist_id: ArtistId,
        page: PageRequest,
    ) -> Result<Page<Album>>;

    /// Count total albums
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of AlbumRepository
pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    /// Create a new SqliteAlbumRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn delete_with_policy(&self, id: AlbumId, cascade: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Album, id.0).await?;

        match integrity::resolve_delete_action(&mut *tx, EntityKind::Album, id.0, cascade).await? {
            DeleteAction::Reject { reason } => {
                return Err(LibraryError::Conflict {
                    entity: "Album",
                    reason,
                });
            }
            DeleteAction::Cascade(set) => {
                debug!(
                    album_id = %id,
                    songs = set.songs,
                    playlist_entries = set.playlist_entries,
                    "Cascading album delete"
                );

                query(
                    "DELETE FROM playlist_songs WHERE song_id IN \
                     (SELECT id FROM songs WHERE album_id = ?)",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;

                query("DELETE FROM songs WHERE album_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            DeleteAction::Allow => {}
        }

        query("DELETE FROM albums WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn apply_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AlbumFilter) {
    qb.push(" WHERE 1=1");
    if let Some(artist_id) = filter.artist_id {
        qb.push(" AND artist_id = ").push_bind(artist_id.0);
    }
    if let Some(name) = &filter.name_contains {
        qb.push(" AND name LIKE ")
            .push_bind(like_substring(name))
            .push(" ESCAPE '\\'");
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn create(&self, input: NewAlbum) -> Result<Album> {
        let violations = integrity::validate_new_album(&input);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Album",
                violations,
            });
        }

        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Artist, input.artist_id.0).await?;

        let now = chrono::Utc::now().timestamp();
        let result = query(
            "INSERT INTO albums (name, artist_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(input.artist_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = AlbumId(result.last_insert_rowid());
        tx.commit().await?;

        Ok(Album {
            id,
            name: input.name,
            artist_id: input.artist_id,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: AlbumId) -> Result<Option<Album>> {
        let album = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(album)
    }

    async fn list(&self, filter: AlbumFilter, page: PageRequest) -> Result<Page<Album>> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM albums");
        apply_filter(&mut count_qb, &filter);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM albums");
        apply_filter(&mut qb, &filter);
        qb.push(" ORDER BY id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let albums = qb.build_query_as::<Album>().fetch_all(&self.pool).await?;

        Ok(Page::new(albums, total, page))
    }

    async fn update(&self, id: AlbumId, patch: AlbumPatch) -> Result<Album> {
        let violations = integrity::validate_album_patch(&patch);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Album",
                violations,
            });
        }

        let mut tx = self.pool.begin().await?;

        let Some(mut album) = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Err(LibraryError::NotFound {
                entity: "Album",
                id: id.0,
            });
        };

        if let Some(name) = patch.name {
            album.name = name;
        }
        if let Some(artist_id) = patch.artist_id {
            // Changed reference must exist
            integrity::require_foreign_key(&mut *tx, EntityKind::Artist, artist_id.0).await?;
            album.artist_id = artist_id;
        }
        album.updated_at = chrono::Utc::now().timestamp();

        query("UPDATE albums SET name = ?, artist_id = ?, updated_at = ? WHERE id = ?")
            .bind(&album.name)
            .bind(album.artist_id)
            .bind(album.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(album)
    }

    async fn delete(&self, id: AlbumId) -> Result<()> {
        self.delete_with_policy(id, false).await
    }

    async fn delete_cascade(&self, id: AlbumId) -> Result<()> {
        self.delete_with_policy(id, true).await
    }

    async fn albums_by_artist(
        &self,
        artist_id: ArtistId,
        page: PageRequest,
    ) -> Result<Page<Album>> {
        self.list(
            AlbumFilter {
                artist_id: Some(artist_id),
                name_contains: None,
            },
            page,
        )
        .await
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM albums")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
