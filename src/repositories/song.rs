//! Song repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::integrity::{self, DeleteAction, EntityKind};
use crate::models::{AlbumId, ArtistId, NewSong, Song, SongId, SongPatch};
use crate::repositories::{like_substring, Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

/// Filter options for listing songs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongFilter {
    /// Restrict to songs by this artist
    pub artist_id: Option<ArtistId>,
    /// Restrict to songs on this album
    pub album_id: Option<AlbumId>,
    /// Case-insensitive name substring match
    pub name_contains: Option<String>,
}

/// Song repository interface for data access operations
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Create a new song and return it with its assigned id
    ///
    /// # Errors
    /// - `Validation` when the name is empty or the duration is not
    ///   positive (all violations reported together)
    /// - `NotFound` when the referenced artist or album does not exist;
    ///   nothing is persisted in that case
    async fn create(&self, input: NewSong) -> Result<Song>;

    /// Find a song by its ID
    ///
    /// # Returns
    /// - `Ok(Some(song))` if found
    /// - `Ok(None)` if not found
    async fn get_by_id(&self, id: SongId) -> Result<Option<Song>>;

    /// List songs matching the filter, ordered by ascending id
    async fn list(&self, filter: SongFilter, page: PageRequest) -> Result<Page<Song>>;

    /// Apply a partial update and return the updated song
    ///
    /// Changed foreign keys are re-validated against the same snapshot the
    /// write happens on.
    async fn update(&self, id: SongId, patch: SongPatch) -> Result<Song>;

    /// Delete a song
    ///
    /// Playlist entries referencing the song are join rows without identity
    /// of their own and are removed in the same transaction.
    async fn delete(&self, id: SongId) -> Result<()>;

    /// Songs by an artist, ordered by ascending id
    async fn songs_by_artist(&self, artist_id: ArtistId, page: PageRequest)
        -> Result<Page<Song>>;

    /// Songs on an album, ordered by ascending id
    async fn songs_by_album(&self, album_id: AlbumId, page: PageRequest) -> Result<Page<Song>>;

    /// Count total songs
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of SongRepository
pub struct SqliteSongRepository {
    pool: SqlitePool,
}

impl SqliteSongRepository {
    /// Create a new SqliteSongRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn apply_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SongFilter) {
    qb.push(" WHERE 1=1");
    if let Some(artist_id) = filter.artist_id {
        qb.push(" AND artist_id = ").push_bind(artist_id.0);
    }
    if let Some(album_id) = filter.album_id {
        qb.push(" AND album_id = ").push_bind(album_id.0);
    }
    if let Some(name) = &filter.name_contains {
        qb.push(" AND name LIKE ")
            .push_bind(like_substring(name))
            .push(" ESCAPE '\\'");
    }
}

/// The album's artist should match the song's artist. Compilations and
/// guest tracks legitimately break this, so a mismatch is logged rather
/// than rejected.
async fn warn_on_artist_mismatch(
    conn: &mut SqliteConnection,
    song_artist: ArtistId,
    album_id: AlbumId,
) -> Result<()> {
    let (album_artist,): (i64,) = query_as("SELECT artist_id FROM albums WHERE id = ?")
        .bind(album_id)
        .fetch_one(conn)
        .await?;

    if album_artist != song_artist.0 {
        warn!(
            song_artist_id = %song_artist,
            album_id = %album_id,
            album_artist_id = album_artist,
            "Song artist differs from album artist"
        );
    }

    Ok(())
}

#[async_trait]
impl SongRepository for SqliteSongRepository {
    async fn create(&self, input: NewSong) -> Result<Song> {
        let violations = integrity::validate_new_song(&input);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Song",
                violations,
            });
        }

        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Artist, input.artist_id.0).await?;
        integrity::require_foreign_key(&mut *tx, EntityKind::Album, input.album_id.0).await?;
        warn_on_artist_mismatch(&mut *tx, input.artist_id, input.album_id).await?;

        let now = chrono::Utc::now().timestamp();
        let result = query(
            "INSERT INTO songs (name, artist_id, album_id, duration_seconds, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(input.artist_id)
        .bind(input.album_id)
        .bind(input.duration_seconds)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = SongId(result.last_insert_rowid());
        tx.commit().await?;

        Ok(Song {
            id,
            name: input.name,
            artist_id: input.artist_id,
            album_id: input.album_id,
            duration_seconds: input.duration_seconds,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: SongId) -> Result<Option<Song>> {
        let song = query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(song)
    }

    async fn list(&self, filter: SongFilter, page: PageRequest) -> Result<Page<Song>> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM songs");
        apply_filter(&mut count_qb, &filter);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM songs");
        apply_filter(&mut qb, &filter);
        qb.push(" ORDER BY id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let songs = qb.build_query_as::<Song>().fetch_all(&self.pool).await?;

        Ok(Page::new(songs, total, page))
    }

    async fn update(&self, id: SongId, patch: SongPatch) -> Result<Song> {
        let violations = integrity::validate_song_patch(&patch);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Song",
                violations,
            });
        }

        let mut tx = self.pool.begin().await?;

        let Some(mut song) = query_as::<_, Song>("SELECT * FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Err(LibraryError::NotFound {
                entity: "Song",
                id: id.0,
            });
        };

        if let Some(name) = patch.name {
            song.name = name;
        }
        if let Some(artist_id) = patch.artist_id {
            integrity::require_foreign_key(&mut *tx, EntityKind::Artist, artist_id.0).await?;
            song.artist_id = artist_id;
        }
        if let Some(album_id) = patch.album_id {
            integrity::require_foreign_key(&mut *tx, EntityKind::Album, album_id.0).await?;
            song.album_id = album_id;
        }
        if let Some(duration) = patch.duration_seconds {
            song.duration_seconds = duration;
        }
        warn_on_artist_mismatch(&mut *tx, song.artist_id, song.album_id).await?;
        song.updated_at = chrono::Utc::now().timestamp();

        query(
            "UPDATE songs SET name = ?, artist_id = ?, album_id = ?, duration_seconds = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&song.name)
        .bind(song.artist_id)
        .bind(song.album_id)
        .bind(song.duration_seconds)
        .bind(song.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(song)
    }

    async fn delete(&self, id: SongId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Song, id.0).await?;

        if let DeleteAction::Cascade(set) =
            integrity::resolve_delete_action(&mut *tx, EntityKind::Song, id.0, false).await?
        {
            debug!(
                song_id = %id,
                playlist_entries = set.playlist_entries,
                "Removing playlist entries with song"
            );
            query("DELETE FROM playlist_songs WHERE song_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        query("DELETE FROM songs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn songs_by_artist(
        &self,
        artist_id: ArtistId,
        page: PageRequest,
    ) -> Result<Page<Song>> {
        self.list(
            SongFilter {
                artist_id: Some(artist_id),
                ..SongFilter::default()
            },
            page,
        )
        .await
    }

    async fn songs_by_album(&self, album_id: AlbumId, page: PageRequest) -> Result<Page<Song>> {
        self.list(
            SongFilter {
                album_id: Some(album_id),
                ..SongFilter::default()
            },
            page,
        )
        .await
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{NewAlbum, NewArtist};
    use crate::repositories::album::{AlbumRepository, SqliteAlbumRepository};
    use crate::repositories::artist::{ArtistRepository, SqliteArtistRepository};

    async fn setup() -> (SqlitePool, ArtistId, AlbumId) {
        let pool = create_test_pool().await.unwrap();
        let artist = SqliteArtistRepository::new(pool.clone())
            .create(NewArtist::new("Test Artist"))
            .await
            .unwrap();
        let album = SqliteAlbumRepository::new(pool.clone())
            .create(NewAlbum::new("Test Album", artist.id))
            .await
            .unwrap();
        (pool, artist.id, album.id)
    }

    #[tokio::test]
    async fn test_create_and_get_song() {
        let (pool, artist_id, album_id) = setup().await;
        let repo = SqliteSongRepository::new(pool);

        let song = repo
            .create(NewSong::new("Test Song", artist_id, album_id, 246))
            .await
            .unwrap();

        let found = repo.get_by_id(song.id).await.unwrap();
        assert_eq!(found, Some(song));
    }

    #[tokio::test]
    async fn test_create_reports_all_violations_at_once() {
        let (pool, artist_id, album_id) = setup().await;
        let repo = SqliteSongRepository::new(pool);

        let err = repo
            .create(NewSong::new("", artist_id, album_id, -3))
            .await
            .unwrap_err();

        match err {
            LibraryError::Validation { entity, violations } => {
                assert_eq!(entity, "Song");
                assert_eq!(violations.len(), 2);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_with_dangling_references_persists_nothing() {
        let (pool, artist_id, _) = setup().await;
        let repo = SqliteSongRepository::new(pool);

        let err = repo
            .create(NewSong::new("Orphan", artist_id, AlbumId(404), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { entity: "Album", id: 404 }));

        let err = repo
            .create(NewSong::new("Orphan", ArtistId(404), AlbumId(1), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { entity: "Artist", id: 404 }));

        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_song_duration() {
        let (pool, artist_id, album_id) = setup().await;
        let repo = SqliteSongRepository::new(pool);

        let song = repo
            .create(NewSong::new("Test Song", artist_id, album_id, 100))
            .await
            .unwrap();

        let updated = repo
            .update(
                song.id,
                SongPatch {
                    duration_seconds: Some(200),
                    ..SongPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.duration_seconds, 200);
        assert_eq!(updated.name, "Test Song");
    }

    #[tokio::test]
    async fn test_update_rejects_nonpositive_duration() {
        let (pool, artist_id, album_id) = setup().await;
        let repo = SqliteSongRepository::new(pool);

        let song = repo
            .create(NewSong::new("Test Song", artist_id, album_id, 100))
            .await
            .unwrap();

        let err = repo
            .update(
                song.id,
                SongPatch {
                    duration_seconds: Some(0),
                    ..SongPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_song_removes_playlist_entries() {
        let (pool, artist_id, album_id) = setup().await;
        let repo = SqliteSongRepository::new(pool.clone());

        let song = repo
            .create(NewSong::new("Listed", artist_id, album_id, 100))
            .await
            .unwrap();

        sqlx::query("INSERT INTO playlists (name, created_at, updated_at) VALUES ('P', 0, 0)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO playlist_songs (playlist_id, song_id, position, added_at) \
             VALUES (1, ?, 0, 0)",
        )
        .bind(song.id)
        .execute(&pool)
        .await
        .unwrap();

        repo.delete(song.id).await.unwrap();

        let (entries,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM playlist_songs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(entries, 0);

        // The playlist itself is untouched
        let (playlists,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM playlists")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(playlists, 1);
    }

    #[tokio::test]
    async fn test_songs_by_artist_and_album() {
        let (pool, artist_id, album_id) = setup().await;
        let other_artist = SqliteArtistRepository::new(pool.clone())
            .create(NewArtist::new("Other"))
            .await
            .unwrap();
        let other_album = SqliteAlbumRepository::new(pool.clone())
            .create(NewAlbum::new("Other Album", other_artist.id))
            .await
            .unwrap();
        let repo = SqliteSongRepository::new(pool);

        repo.create(NewSong::new("A", artist_id, album_id, 100))
            .await
            .unwrap();
        repo.create(NewSong::new("B", artist_id, album_id, 100))
            .await
            .unwrap();
        repo.create(NewSong::new("C", other_artist.id, other_album.id, 100))
            .await
            .unwrap();

        let by_artist = repo
            .songs_by_artist(artist_id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_artist.total, 2);

        let by_album = repo
            .songs_by_album(other_album.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_album.total, 1);
        assert_eq!(by_album.items[0].name, "C");
    }

    #[tokio::test]
    async fn test_list_name_filter() {
        let (pool, artist_id, album_id) = setup().await;
        let repo = SqliteSongRepository::new(pool);

        repo.create(NewSong::new("minipops 67", artist_id, album_id, 246))
            .await
            .unwrap();
        repo.create(NewSong::new("produk 29", artist_id, album_id, 308))
            .await
            .unwrap();

        let page = repo
            .list(
                SongFilter {
                    name_contains: Some("pops".to_string()),
                    ..SongFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "minipops 67");
    }

    #[tokio::test]
    async fn test_cross_artist_song_is_accepted() {
        // A song whose artist differs from its album's artist is legal
        // (compilation case); only a warning is logged.
        let (pool, _, album_id) = setup().await;
        let guest = SqliteArtistRepository::new(pool.clone())
            .create(NewArtist::new("Guest"))
            .await
            .unwrap();
        let repo = SqliteSongRepository::new(pool);

        let song = repo
            .create(NewSong::new("Feature", guest.id, album_id, 180))
            .await
            .unwrap();
        assert_eq!(song.artist_id, guest.id);
    }
}
