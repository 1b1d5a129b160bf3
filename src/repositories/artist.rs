//! Artist repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::integrity::{self, DeleteAction, EntityKind};
use crate::models::{Artist, ArtistId, ArtistPatch, NewArtist};
use crate::repositories::{like_substring, Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Filter options for listing artists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistFilter {
    /// Case-insensitive name substring match
    pub name_contains: Option<String>,
}

/// Artist repository interface for data access operations
#[async_trait]
pub trait ArtistRepository: Send + Sync {
    /// Create a new artist and return it with its assigned id
    ///
    /// # Errors
    /// - `Validation` when the name is empty
    async fn create(&self, input: NewArtist) -> Result<Artist>;

    /// Find an artist by its ID
    ///
    /// # Returns
    /// - `Ok(Some(artist))` if found
    /// - `Ok(None)` if not found
    async fn get_by_id(&self, id: ArtistId) -> Result<Option<Artist>>;

    /// List artists matching the filter, ordered by ascending id
    async fn list(&self, filter: ArtistFilter, page: PageRequest) -> Result<Page<Artist>>;

    /// Apply a partial update and return the updated artist
    ///
    /// # Errors
    /// - `NotFound` when the id is absent
    /// - `Validation` when a changed field violates a rule
    async fn update(&self, id: ArtistId, patch: ArtistPatch) -> Result<Artist>;

    /// Delete an artist under the restrict policy
    ///
    /// # Errors
    /// - `Conflict` while any album or song references the artist
    /// - `NotFound` when the id is absent
    async fn delete(&self, id: ArtistId) -> Result<()>;

    /// Delete an artist together with all of its albums, songs, and the
    /// playlist entries of those songs
    async fn delete_cascade(&self, id: ArtistId) -> Result<()>;

    /// Find an artist by exact name
    ///
    /// Supports the caller-side lookup-or-create flow of import adapters.
    /// Names are not unique; the earliest-created match wins.
    async fn find_by_name(&self, name: &str) -> Result<Option<Artist>>;

    /// Count total artists
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of ArtistRepository
pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    /// Create a new SqliteArtistRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn delete_with_policy(&self, id: ArtistId, cascade: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        integrity::require_foreign_key(&mut *tx, EntityKind::Artist, id.0).await?;

        match integrity::resolve_delete_action(&mut *tx, EntityKind::Artist, id.0, cascade).await? {
            DeleteAction::Reject { reason } => {
                return Err(LibraryError::Conflict {
                    entity: "Artist",
                    reason,
                });
            }
            DeleteAction::Cascade(set) => {
                debug!(
                    artist_id = %id,
                    albums = set.albums,
                    songs = set.songs,
                    playlist_entries = set.playlist_entries,
                    "Cascading artist delete"
                );

                // Songs owned by the artist, plus songs sitting on the
                // artist's albums (guest tracks), all lose their join rows
                // first.
                query(
                    "DELETE FROM playlist_songs WHERE song_id IN \
                     (SELECT id FROM songs WHERE artist_id = ?1 \
                      OR album_id IN (SELECT id FROM albums WHERE artist_id = ?1))",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;

                query(
                    "DELETE FROM songs WHERE artist_id = ?1 \
                     OR album_id IN (SELECT id FROM albums WHERE artist_id = ?1)",
                )
                .bind(id)
                .execute(&mut *tx)
                .await?;

                query("DELETE FROM albums WHERE artist_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            DeleteAction::Allow => {}
        }

        query("DELETE FROM artists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn apply_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ArtistFilter) {
    qb.push(" WHERE 1=1");
    if let Some(name) = &filter.name_contains {
        qb.push(" AND name LIKE ")
            .push_bind(like_substring(name))
            .push(" ESCAPE '\\'");
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn create(&self, input: NewArtist) -> Result<Artist> {
        let violations = integrity::validate_new_artist(&input);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Artist",
                violations,
            });
        }

        let now = chrono::Utc::now().timestamp();
        let result = query("INSERT INTO artists (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(&input.name)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(Artist {
            id: ArtistId(result.last_insert_rowid()),
            name: input.name,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: ArtistId) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>("SELECT * FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(artist)
    }

    async fn list(&self, filter: ArtistFilter, page: PageRequest) -> Result<Page<Artist>> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM artists");
        apply_filter(&mut count_qb, &filter);
        let (total,): (i64,) = count_qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM artists");
        apply_filter(&mut qb, &filter);
        qb.push(" ORDER BY id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let artists = qb
            .build_query_as::<Artist>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(artists, total, page))
    }

    async fn update(&self, id: ArtistId, patch: ArtistPatch) -> Result<Artist> {
        let violations = integrity::validate_artist_patch(&patch);
        if !violations.is_empty() {
            return Err(LibraryError::Validation {
                entity: "Artist",
                violations,
            });
        }

        let mut tx = self.pool.begin().await?;

        let Some(mut artist) = query_as::<_, Artist>("SELECT * FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Err(LibraryError::NotFound {
                entity: "Artist",
                id: id.0,
            });
        };

        if let Some(name) = patch.name {
            artist.name = name;
        }
        artist.updated_at = chrono::Utc::now().timestamp();

        query("UPDATE artists SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&artist.name)
            .bind(artist.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(artist)
    }

    async fn delete(&self, id: ArtistId) -> Result<()> {
        self.delete_with_policy(id, false).await
    }

    async fn delete_cascade(&self, id: ArtistId) -> Result<()> {
        self.delete_with_policy(id, true).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let artist =
            query_as::<_, Artist>("SELECT * FROM artists WHERE name = ? ORDER BY id ASC LIMIT 1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(artist)
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = query_as("SELECT COUNT(*) FROM artists")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
