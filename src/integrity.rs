//! Cross-entity integrity enforcement
//!
//! Pure validation invoked by the repository layer before any mutation:
//! aggregated field checks on inputs, foreign-key existence lookups, and
//! delete-policy resolution. All database access here is read-only and runs
//! on the caller's transaction, so validate-then-write stays atomic.
//!
//! Delete policy: Artist and Album are restrict-by-default (rejected while
//! dependents exist) with an explicit cascade opt-in; `playlist_songs` rows
//! have no independent identity and always cascade away with either parent.

use crate::error::{Result, Violation};
use crate::models::{AlbumPatch, ArtistPatch, NewAlbum, NewArtist, NewPlaylist, NewSong,
    PlaylistPatch, SongPatch};
use crate::LibraryError;
use sqlx::SqliteConnection;

/// The four id-bearing catalog entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Artist,
    Album,
    Song,
    Playlist,
}

impl EntityKind {
    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Song => "songs",
            EntityKind::Playlist => "playlists",
        }
    }

    /// Display name used in errors.
    pub fn entity(self) -> &'static str {
        match self {
            EntityKind::Artist => "Artist",
            EntityKind::Album => "Album",
            EntityKind::Song => "Song",
            EntityKind::Playlist => "Playlist",
        }
    }
}

/// Resolution of a delete request against the documented policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteAction {
    /// No dependents; the row may be deleted as-is.
    Allow,
    /// Dependents exist and will be removed along with the row.
    Cascade(CascadeSet),
    /// Dependents exist and cascade was not requested.
    Reject { reason: String },
}

/// Dependent rows that a cascading delete will remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSet {
    pub albums: i64,
    pub songs: i64,
    pub playlist_entries: i64,
}

impl CascadeSet {
    fn is_empty(self) -> bool {
        self.albums == 0 && self.songs == 0 && self.playlist_entries == 0
    }
}

// =============================================================================
// Field validation (aggregates every violation, not just the first)
// =============================================================================

fn check_name(name: &str, violations: &mut Vec<Violation>) {
    if name.trim().is_empty() {
        violations.push(Violation::new("name", "must not be empty"));
    }
}

fn check_duration(duration_seconds: i64, violations: &mut Vec<Violation>) {
    if duration_seconds <= 0 {
        violations.push(Violation::new(
            "duration_seconds",
            format!("must be positive, got {}", duration_seconds),
        ));
    }
}

pub fn validate_new_artist(input: &NewArtist) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_name(&input.name, &mut violations);
    violations
}

pub fn validate_new_album(input: &NewAlbum) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_name(&input.name, &mut violations);
    violations
}

pub fn validate_new_song(input: &NewSong) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_name(&input.name, &mut violations);
    check_duration(input.duration_seconds, &mut violations);
    violations
}

pub fn validate_new_playlist(input: &NewPlaylist) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_name(&input.name, &mut violations);
    violations
}

pub fn validate_artist_patch(patch: &ArtistPatch) -> Vec<Violation> {
    let mut violations = Vec::new();
    if let Some(name) = &patch.name {
        check_name(name, &mut violations);
    }
    violations
}

pub fn validate_album_patch(patch: &AlbumPatch) -> Vec<Violation> {
    let mut violations = Vec::new();
    if let Some(name) = &patch.name {
        check_name(name, &mut violations);
    }
    violations
}

pub fn validate_song_patch(patch: &SongPatch) -> Vec<Violation> {
    let mut violations = Vec::new();
    if let Some(name) = &patch.name {
        check_name(name, &mut violations);
    }
    if let Some(duration) = patch.duration_seconds {
        check_duration(duration, &mut violations);
    }
    violations
}

pub fn validate_playlist_patch(patch: &PlaylistPatch) -> Vec<Violation> {
    let mut violations = Vec::new();
    if let Some(name) = &patch.name {
        check_name(name, &mut violations);
    }
    violations
}

// =============================================================================
// Foreign-key existence
// =============================================================================

/// Check whether a row of the given kind exists.
pub async fn foreign_key_exists(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: i64,
) -> Result<bool> {
    // Table names come from the EntityKind match, never from input.
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", kind.table());
    let (exists,): (i64,) = sqlx::query_as(&sql).bind(id).fetch_one(conn).await?;
    Ok(exists != 0)
}

/// Fail with [`LibraryError::NotFound`] when the referenced row is absent.
pub async fn require_foreign_key(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: i64,
) -> Result<()> {
    if foreign_key_exists(conn, kind, id).await? {
        Ok(())
    } else {
        Err(LibraryError::NotFound {
            entity: kind.entity(),
            id,
        })
    }
}

// =============================================================================
// Delete-policy resolution
// =============================================================================

/// Resolve what deleting the given row entails under the documented policy.
///
/// Artist/Album with dependents: `Reject` unless `cascade_requested`, in
/// which case every transitive dependent is listed in the `CascadeSet`.
/// Song/Playlist: their join rows always cascade, so the result is never
/// `Reject` regardless of the flag.
pub async fn resolve_delete_action(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: i64,
    cascade_requested: bool,
) -> Result<DeleteAction> {
    let set = match kind {
        EntityKind::Artist => {
            let (albums,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM albums WHERE artist_id = ?")
                    .bind(id)
                    .fetch_one(&mut *conn)
                    .await?;
            // Guest songs on the artist's albums count too, since those
            // albums go away with the artist.
            let (songs,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM songs WHERE artist_id = ?1 \
                 OR album_id IN (SELECT id FROM albums WHERE artist_id = ?1)",
            )
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
            let (playlist_entries,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM playlist_songs WHERE song_id IN \
                 (SELECT id FROM songs WHERE artist_id = ?1 \
                  OR album_id IN (SELECT id FROM albums WHERE artist_id = ?1))",
            )
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;

            CascadeSet {
                albums,
                songs,
                playlist_entries,
            }
        }
        EntityKind::Album => {
            let (songs,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM songs WHERE album_id = ?")
                    .bind(id)
                    .fetch_one(&mut *conn)
                    .await?;
            let (playlist_entries,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM playlist_songs \
                 WHERE song_id IN (SELECT id FROM songs WHERE album_id = ?)",
            )
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;

            CascadeSet {
                albums: 0,
                songs,
                playlist_entries,
            }
        }
        EntityKind::Song => {
            let (playlist_entries,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM playlist_songs WHERE song_id = ?")
                    .bind(id)
                    .fetch_one(&mut *conn)
                    .await?;

            CascadeSet {
                playlist_entries,
                ..CascadeSet::default()
            }
        }
        EntityKind::Playlist => {
            let (playlist_entries,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM playlist_songs WHERE playlist_id = ?")
                    .bind(id)
                    .fetch_one(&mut *conn)
                    .await?;

            CascadeSet {
                playlist_entries,
                ..CascadeSet::default()
            }
        }
    };

    if set.is_empty() {
        return Ok(DeleteAction::Allow);
    }

    // Join rows never block a delete on their own.
    let restricted = set.albums > 0 || set.songs > 0;
    if restricted && !cascade_requested {
        return Ok(DeleteAction::Reject {
            reason: format!(
                "{} {} is referenced by {} album(s) and {} song(s)",
                kind.entity(),
                id,
                set.albums,
                set.songs
            ),
        });
    }

    Ok(DeleteAction::Cascade(set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlbumId, ArtistId};

    #[test]
    fn test_validate_new_song_aggregates_all_violations() {
        let input = NewSong::new("   ", ArtistId(1), AlbumId(1), 0);
        let violations = validate_new_song(&input);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].field, "name");
        assert_eq!(violations[1].field, "duration_seconds");
    }

    #[test]
    fn test_validate_new_song_accepts_valid_input() {
        let input = NewSong::new("minipops 67", ArtistId(1), AlbumId(1), 246);
        assert!(validate_new_song(&input).is_empty());
    }

    #[test]
    fn test_validate_patch_skips_unset_fields() {
        assert!(validate_song_patch(&SongPatch::default()).is_empty());

        let patch = SongPatch {
            duration_seconds: Some(-5),
            ..SongPatch::default()
        };
        let violations = validate_song_patch(&patch);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "duration_seconds");
    }

    #[tokio::test]
    async fn test_foreign_key_exists() {
        let pool = crate::db::create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        assert!(!foreign_key_exists(&mut *conn, EntityKind::Artist, 1)
            .await
            .unwrap());

        sqlx::query("INSERT INTO artists (name, created_at, updated_at) VALUES ('X', 0, 0)")
            .execute(&mut *conn)
            .await
            .unwrap();

        assert!(foreign_key_exists(&mut *conn, EntityKind::Artist, 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_require_foreign_key_reports_entity_and_id() {
        let pool = crate::db::create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let err = require_foreign_key(&mut *conn, EntityKind::Album, 99)
            .await
            .unwrap_err();
        match err {
            LibraryError::NotFound { entity, id } => {
                assert_eq!(entity, "Album");
                assert_eq!(id, 99);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_delete_action_restricts_referenced_artist() {
        let pool = crate::db::create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        sqlx::query("INSERT INTO artists (name, created_at, updated_at) VALUES ('A', 0, 0)")
            .execute(&mut *conn)
            .await
            .unwrap();
        sqlx::query("INSERT INTO albums (name, artist_id, created_at, updated_at) VALUES ('B', 1, 0, 0)")
            .execute(&mut *conn)
            .await
            .unwrap();

        let action = resolve_delete_action(&mut *conn, EntityKind::Artist, 1, false)
            .await
            .unwrap();
        assert!(matches!(action, DeleteAction::Reject { .. }));

        let action = resolve_delete_action(&mut *conn, EntityKind::Artist, 1, true)
            .await
            .unwrap();
        match action {
            DeleteAction::Cascade(set) => {
                assert_eq!(set.albums, 1);
                assert_eq!(set.songs, 0);
            }
            other => panic!("expected Cascade, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_delete_action_allows_unreferenced_rows() {
        let pool = crate::db::create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        sqlx::query("INSERT INTO artists (name, created_at, updated_at) VALUES ('A', 0, 0)")
            .execute(&mut *conn)
            .await
            .unwrap();

        let action = resolve_delete_action(&mut *conn, EntityKind::Artist, 1, false)
            .await
            .unwrap();
        assert_eq!(action, DeleteAction::Allow);
    }
}
