//! Server-Metadaten (dauerhafte Instanz-Kennung)

use sqlx::Row as _;
use tracing::info;
use uuid::Uuid;

use crate::repository::{DbResult, ServerMetaRepository};
use crate::sqlite::pool::SqliteDb;

const SERVER_KENNUNG: &str = "server_id";

impl ServerMetaRepository for SqliteDb {
    async fn server_kennung(&self) -> DbResult<String> {
        let vorhanden = sqlx::query("SELECT value FROM server_meta WHERE key = ?")
            .bind(SERVER_KENNUNG)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = vorhanden {
            return Ok(row.try_get("value")?);
        }

        let neu = Uuid::new_v4().to_string();
        // Bei gleichzeitigem Start gewinnt der erste Eintrag
        sqlx::query("INSERT OR IGNORE INTO server_meta (key, value) VALUES (?, ?)")
            .bind(SERVER_KENNUNG)
            .bind(&neu)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT value FROM server_meta WHERE key = ?")
            .bind(SERVER_KENNUNG)
            .fetch_one(&self.pool)
            .await?;
        let kennung: String = row.try_get("value")?;
        info!(server = %kennung, "Server-Kennung angelegt");
        Ok(kennung)
    }
}
