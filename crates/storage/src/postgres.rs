//! PostgreSQL tile store: one table per collection.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use radar_common::{TileError, TileRecord, TileResult};

use crate::tile_store::{validate_collection, StoredTile, TileStore};

/// Tile documents in PostgreSQL.
///
/// Each collection (e.g. `KFWS`) is a table created on first use. Column
/// names follow the document fields, including the camelCase `tileName`.
pub struct PostgresTileStore {
    pool: PgPool,
    ready: RwLock<HashSet<String>>,
}

impl PostgresTileStore {
    /// Connect to the database at `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> TileResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| TileError::Persistence(format!("Connection failed: {}", e)))?;

        info!(max_connections = max_connections, "Connected to tile database");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            ready: RwLock::new(HashSet::new()),
        }
    }

    /// Create the collection's table and index if they do not exist.
    #[instrument(skip(self))]
    pub async fn ensure_collection(&self, collection: &str) -> TileResult<()> {
        validate_collection(collection)?;

        if self.ready.read().await.contains(collection) {
            return Ok(());
        }

        for statement in collection_schema(collection).split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| TileError::Persistence(format!("Create collection failed: {}", e)))?;
            }
        }

        self.ready.write().await.insert(collection.to_string());
        debug!(collection = collection, "Collection ready");
        Ok(())
    }
}

#[async_trait]
impl TileStore for PostgresTileStore {
    #[instrument(skip(self, record), fields(tile = %record.tile_name, zoom = record.zoom))]
    async fn insert_tile(&self, collection: &str, record: &TileRecord) -> TileResult<Uuid> {
        self.ensure_collection(collection).await?;

        let id = Uuid::new_v4();
        let sql = format!(
            r#"INSERT INTO "{}" (id, product, zoom, "timestamp", tile, "tileName", code, angle, inserted_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            collection
        );

        sqlx::query(&sql)
            .bind(id)
            .bind(&record.product)
            .bind(record.zoom as i32)
            .bind(record.timestamp)
            .bind(&record.tile)
            .bind(&record.tile_name)
            .bind(record.code)
            .bind(record.angle)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| TileError::Persistence(format!("Insert failed: {}", e)))?;

        Ok(id)
    }

    async fn list_tiles(&self, collection: &str, product: &str, zoom: u32) -> TileResult<Vec<StoredTile>> {
        self.ensure_collection(collection).await?;

        let sql = format!(
            r#"SELECT id, product, zoom, "timestamp", tile, "tileName", code, angle
               FROM "{}" WHERE product = $1 AND zoom = $2 ORDER BY "tileName""#,
            collection
        );

        let rows = sqlx::query_as::<_, TileRow>(&sql)
            .bind(product)
            .bind(zoom as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TileError::Persistence(format!("Query failed: {}", e)))?;

        Ok(rows.into_iter().map(StoredTile::from).collect())
    }
}

/// DDL for one collection. The name must already be validated.
fn collection_schema(collection: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{name}" (
    id UUID PRIMARY KEY,
    product TEXT NOT NULL,
    zoom INTEGER NOT NULL,
    "timestamp" BIGINT NOT NULL,
    tile BYTEA NOT NULL,
    "tileName" TEXT NOT NULL,
    code SMALLINT NOT NULL,
    angle DOUBLE PRECISION NOT NULL,
    inserted_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS "{name}_product_zoom_idx" ON "{name}" (product, zoom, "timestamp");
"#,
        name = collection
    )
}

#[derive(FromRow)]
struct TileRow {
    id: Uuid,
    product: String,
    zoom: i32,
    timestamp: i64,
    tile: Vec<u8>,
    #[sqlx(rename = "tileName")]
    tile_name: String,
    code: i16,
    angle: f64,
}

impl From<TileRow> for StoredTile {
    fn from(row: TileRow) -> Self {
        StoredTile {
            id: row.id,
            record: TileRecord {
                product: row.product,
                zoom: row.zoom.max(0) as u32,
                timestamp: row.timestamp,
                tile: row.tile,
                tile_name: row.tile_name,
                code: row.code,
                angle: row.angle,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_schema_quotes_identifiers() {
        let sql = collection_schema("KFWS");
        assert!(sql.contains(r#"CREATE TABLE IF NOT EXISTS "KFWS""#));
        assert!(sql.contains(r#""tileName" TEXT NOT NULL"#));
        assert!(sql.contains(r#""KFWS_product_zoom_idx""#));
        assert_eq!(sql.split(';').filter(|s| !s.trim().is_empty()).count(), 2);
    }

    #[test]
    fn test_row_conversion() {
        let row = TileRow {
            id: Uuid::nil(),
            product: "N0Q".to_string(),
            zoom: 5,
            timestamp: 1_705_321_800,
            tile: vec![1, 2, 3],
            tile_name: "3_4".to_string(),
            code: 94,
            angle: 0.5,
        };
        let stored = StoredTile::from(row);
        assert_eq!(stored.record.zoom, 5);
        assert_eq!(stored.record.tile_name, "3_4");
    }
}
