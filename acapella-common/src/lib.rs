//! # Acapella Common Library
//!
//! Shared code for the Acapella ingestion tools including:
//! - Discography records (artist, album, track) and the snapshot document
//! - Configuration resolution
//! - Database initialization and schema
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{AlbumRecord, ArtistRecord, LinkMap, Snapshot, TrackRecord};
