//! SQLite-Implementierung des UpdateRepository

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::Row as _;

use reflector_core::{LocalProjectId, UpdateId, UserId};

use crate::error::DbError;
use crate::models::UpdateRecord;
use crate::repository::{DbResult, UpdateRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{id_lesen, update_id_schreiben};

impl UpdateRepository for SqliteDb {
    async fn append_update(
        &self,
        lpid: LocalProjectId,
        userid: UserId,
        command: &str,
        payload: &Map<String, Value>,
    ) -> DbResult<UpdateId> {
        let payload = serde_json::to_string(payload)?;
        let mut tx = self.pool.begin().await?;

        let letzte: i64 =
            sqlx::query("SELECT COALESCE(MAX(updateid), 0) AS letzte FROM updates WHERE lpid = ?")
                .bind(i64::from(lpid.inner()))
                .fetch_one(&mut *tx)
                .await?
                .try_get("letzte")?;
        let neue = UpdateId(letzte as u64).naechste();

        sqlx::query(
            "INSERT INTO updates (lpid, updateid, userid, command, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(i64::from(lpid.inner()))
        .bind(update_id_schreiben("updates.updateid", neue)?)
        .bind(i64::from(userid.inner()))
        .bind(command)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(neue)
    }

    async fn last_update_id(&self, lpid: LocalProjectId) -> DbResult<UpdateId> {
        let letzte: i64 =
            sqlx::query("SELECT COALESCE(MAX(updateid), 0) AS letzte FROM updates WHERE lpid = ?")
                .bind(i64::from(lpid.inner()))
                .fetch_one(&self.pool)
                .await?
                .try_get("letzte")?;
        Ok(UpdateId(letzte as u64))
    }

    async fn updates_since(
        &self,
        lpid: LocalProjectId,
        nach: UpdateId,
    ) -> DbResult<Vec<UpdateRecord>> {
        // Ein Stand jenseits von i64 liegt hinter jeder gespeicherten ID
        let Ok(nach) = i64::try_from(nach.inner()) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            "SELECT lpid, updateid, userid, command, payload FROM updates
             WHERE lpid = ? AND updateid > ?
             ORDER BY updateid",
        )
        .bind(i64::from(lpid.inner()))
        .bind(nach)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_update).collect()
    }
}

fn row_to_update(row: &sqlx::sqlite::SqliteRow) -> DbResult<UpdateRecord> {
    let payload: String = row.try_get("payload")?;
    let payload = match serde_json::from_str(&payload)? {
        Value::Object(map) => map,
        anderes => {
            return Err(DbError::UngueltigeDaten(format!(
                "Update-Payload ist kein Objekt: {anderes}"
            )))
        }
    };
    let updateid: i64 = row.try_get("updateid")?;

    Ok(UpdateRecord {
        lpid: LocalProjectId(id_lesen("updates.lpid", row.try_get("lpid")?)?),
        updateid: UpdateId(updateid as u64),
        userid: UserId(id_lesen("updates.userid", row.try_get("userid")?)?),
        command: row.try_get("command")?,
        payload,
    })
}
