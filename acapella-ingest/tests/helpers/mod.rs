//! Test Helper Utilities
//!
//! Shared utilities for testing acapella-ingest

#![allow(dead_code)]

pub mod db_utils;
pub mod fake_services;

pub use db_utils::{count_rows, create_test_db, get_table_columns, has_column, ColumnInfo};
pub use fake_services::{
    coldplay_fixture, fast_policy, test_config, FakeCoverArt, FakeTransport, AUDIODB_URL, MB_BASE,
    MB_ARTIST_SEARCH_URL, SEARCH_URL, WIKIMEDIA_URL,
};
