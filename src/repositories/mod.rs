//! # Repository Pattern Implementation
//!
//! One repository per catalog entity, each a trait with a SQLite
//! implementation. Every mutation runs inside a transaction: field
//! validation and foreign-key checks happen on the same connection as the
//! write, so a failed check never leaves a partial row behind.
//!
//! ## Available Repositories
//!
//! - `ArtistRepository` - artists, plus exact-name lookup for the scanner's
//!   lookup-or-create flow
//! - `AlbumRepository` - albums with their owning artist
//! - `SongRepository` - songs with artist/album references and duration
//! - `PlaylistRepository` - playlists and their ordered song membership

pub mod album;
pub mod artist;
pub mod pagination;
pub mod playlist;
pub mod song;

pub use album::{AlbumFilter, AlbumRepository, SqliteAlbumRepository};
pub use artist::{ArtistFilter, ArtistRepository, SqliteArtistRepository};
pub use pagination::{Page, PageRequest};
pub use playlist::{PlaylistFilter, PlaylistRepository, SqlitePlaylistRepository};
pub use song::{SongFilter, SongRepository, SqliteSongRepository};

/// Turn a caller-supplied substring into a `LIKE` pattern that matches it
/// literally. `%`, `_`, and the escape character itself are escaped; the
/// clause using the pattern must carry `ESCAPE '\'`.
pub(crate) fn like_substring(substring: &str) -> String {
    let mut pattern = String::with_capacity(substring.len() + 2);
    pattern.push('%');
    for c in substring.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_substring;

    #[test]
    fn test_like_substring_wraps_plain_text() {
        assert_eq!(like_substring("syro"), "%syro%");
    }

    #[test]
    fn test_like_substring_escapes_wildcards() {
        assert_eq!(like_substring("a_c"), "%a\\_c%");
        assert_eq!(like_substring("100%"), "%100\\%%");
        assert_eq!(like_substring("a\\b"), "%a\\\\b%");
    }
}
