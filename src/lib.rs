//! # Music Library Catalog
//!
//! Data-access layer for a personal music library: artists, albums, songs,
//! playlists, and playlist membership, backed by SQLite.
//!
//! ## Overview
//!
//! - Schema and migrations owned by the [`db`] module
//! - One repository per entity with CRUD, filtered listing, and
//!   relationship-aware queries ([`repositories`])
//! - Cross-entity validation (foreign keys, delete policy, aggregated field
//!   checks) in [`integrity`], invoked by every mutation inside its
//!   transaction
//!
//! Delete policy: artists and albums are restrict-by-default with an
//! explicit cascade opt-in; playlist membership rows always cascade with
//! either parent.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use muselib::db::{create_pool, DatabaseConfig};
//! use muselib::models::NewArtist;
//! use muselib::repositories::{ArtistRepository, SqliteArtistRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("library.db")).await?;
//! let artists = SqliteArtistRepository::new(pool.clone());
//! let artist = artists.create(NewArtist::new("Aphex Twin")).await?;
//! ```

pub mod db;
pub mod error;
pub mod integrity;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result, Violation};
