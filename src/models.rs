//! Domain models for the music library catalog
//!
//! Entities mirror the five catalog tables. Ids are opaque surrogate keys
//! assigned monotonically by the storage engine, wrapped in newtypes so a
//! `SongId` can never be passed where an `AlbumId` is expected.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

macro_rules! surrogate_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize, sqlx::Type,
        )]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

surrogate_id!(
    /// Unique identifier for an artist
    ArtistId
);
surrogate_id!(
    /// Unique identifier for an album
    AlbumId
);
surrogate_id!(
    /// Unique identifier for a song
    SongId
);
surrogate_id!(
    /// Unique identifier for a playlist
    PlaylistId
);

// =============================================================================
// Entities
// =============================================================================

/// A recording artist. Names need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Artist {
    /// Unique identifier
    pub id: ArtistId,
    /// Artist name
    pub name: String,
    /// Timestamps (Unix epoch seconds)
    pub created_at: i64,
    pub updated_at: i64,
}

/// An album owned by exactly one artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Album {
    /// Unique identifier
    pub id: AlbumId,
    /// Album name
    pub name: String,
    /// Owning artist reference
    pub artist_id: ArtistId,
    /// Timestamps (Unix epoch seconds)
    pub created_at: i64,
    pub updated_at: i64,
}

/// A song referencing its artist and album.
///
/// The album's artist should normally match the song's artist; a mismatch
/// (compilations, guest tracks) is accepted and logged at WARN level by the
/// repository layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Song {
    /// Unique identifier
    pub id: SongId,
    /// Song name
    pub name: String,
    /// Artist reference
    pub artist_id: ArtistId,
    /// Album reference
    pub album_id: AlbumId,
    /// Duration in whole seconds, strictly positive
    pub duration_seconds: i64,
    /// Timestamps (Unix epoch seconds)
    pub created_at: i64,
    pub updated_at: i64,
}

/// A user playlist. Membership lives in `playlist_songs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    /// Unique identifier
    pub id: PlaylistId,
    /// Playlist name
    pub name: String,
    /// Timestamps (Unix epoch seconds)
    pub created_at: i64,
    pub updated_at: i64,
}

/// One row of the playlist/song join table. A song appears at most once per
/// playlist; `position` preserves insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistEntry {
    pub playlist_id: PlaylistId,
    pub song_id: SongId,
    /// Zero-based insertion position within the playlist
    pub position: i64,
    /// When the song was added (Unix epoch seconds)
    pub added_at: i64,
}

// =============================================================================
// Create inputs (entity shape minus the assigned id)
// =============================================================================

/// Input for creating an artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArtist {
    pub name: String,
}

impl NewArtist {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Input for creating an album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAlbum {
    pub name: String,
    pub artist_id: ArtistId,
}

impl NewAlbum {
    pub fn new(name: impl Into<String>, artist_id: ArtistId) -> Self {
        Self {
            name: name.into(),
            artist_id,
        }
    }
}

/// Input for creating a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSong {
    pub name: String,
    pub artist_id: ArtistId,
    pub album_id: AlbumId,
    pub duration_seconds: i64,
}

impl NewSong {
    pub fn new(
        name: impl Into<String>,
        artist_id: ArtistId,
        album_id: AlbumId,
        duration_seconds: i64,
    ) -> Self {
        Self {
            name: name.into(),
            artist_id,
            album_id,
            duration_seconds,
        }
    }
}

/// Input for creating a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
}

impl NewPlaylist {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// =============================================================================
// Partial updates
// =============================================================================

/// Partial update for an artist. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistPatch {
    pub name: Option<String>,
}

/// Partial update for an album. Changing `artist_id` re-validates the
/// reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumPatch {
    pub name: Option<String>,
    pub artist_id: Option<ArtistId>,
}

/// Partial update for a song. Changed foreign keys are re-validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongPatch {
    pub name: Option<String>,
    pub artist_id: Option<ArtistId>,
    pub album_id: Option<AlbumId>,
    pub duration_seconds: Option<i64>,
}

/// Partial update for a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistPatch {
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(ArtistId(7).to_string(), "7");
        assert_eq!(SongId(12).to_string(), "12");
    }

    #[test]
    fn test_id_ordering_is_monotonic() {
        assert!(AlbumId(1) < AlbumId(2));
        assert!(PlaylistId(10) > PlaylistId(9));
    }

    #[test]
    fn test_new_song_constructor() {
        let song = NewSong::new("minipops 67", ArtistId(1), AlbumId(2), 246);
        assert_eq!(song.name, "minipops 67");
        assert_eq!(song.artist_id, ArtistId(1));
        assert_eq!(song.album_id, AlbumId(2));
        assert_eq!(song.duration_seconds, 246);
    }

    #[test]
    fn test_patch_default_changes_nothing() {
        let patch = SongPatch::default();
        assert!(patch.name.is_none());
        assert!(patch.artist_id.is_none());
        assert!(patch.album_id.is_none());
        assert!(patch.duration_seconds.is_none());
    }
}
