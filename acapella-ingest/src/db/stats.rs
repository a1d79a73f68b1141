//! Catalog verification queries for the upload tool

use acapella_common::Result;
use sqlx::{Row, SqlitePool};

/// Row counts plus the artists with the most songs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub artists: i64,
    pub albums: i64,
    pub songs: i64,
    /// Most songs first
    pub top_artists: Vec<ArtistCounts>,
}

/// Albums and songs credited to one artist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCounts {
    pub name: String,
    pub albums: i64,
    pub songs: i64,
}

/// SQLite library version; doubles as a connectivity check
pub async fn check_connection(pool: &SqlitePool) -> Result<String> {
    let version: String = sqlx::query_scalar("SELECT sqlite_version()")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn catalog_stats(pool: &SqlitePool, top: i64) -> Result<CatalogStats> {
    let rows = sqlx::query(
        r#"
        SELECT a.name AS name,
               COUNT(DISTINCT aa.album_id) AS albums,
               COUNT(DISTINCT sa.song_id) AS songs
        FROM artists a
        LEFT JOIN album_artists aa ON aa.artist_id = a.id
        LEFT JOIN song_artists sa ON sa.artist_id = a.id
        GROUP BY a.id, a.name
        ORDER BY songs DESC, a.name ASC
        LIMIT ?
        "#,
    )
    .bind(top)
    .fetch_all(pool)
    .await?;

    Ok(CatalogStats {
        artists: count_rows(pool, "artists").await?,
        albums: count_rows(pool, "albums").await?,
        songs: count_rows(pool, "songs").await?,
        top_artists: rows
            .iter()
            .map(|row| ArtistCounts {
                name: row.get("name"),
                albums: row.get("albums"),
                songs: row.get("songs"),
            })
            .collect(),
    })
}
