//! SQLite-Implementierung des SnapshotRepository

use chrono::Utc;
use sqlx::Row as _;

use reflector_core::{LocalProjectId, SnapshotId, UpdateId, UserId};

use crate::models::SnapshotRecord;
use crate::repository::{DbResult, SnapshotRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{id_lesen, update_id_schreiben, zeit_lesen};

impl SnapshotRepository for SqliteDb {
    async fn create_snapshot(
        &self,
        lpid: LocalProjectId,
        updateid: UpdateId,
        beschreibung: &str,
        owner: UserId,
    ) -> DbResult<SnapshotRecord> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO snapshots (lpid, updateid, description, owner, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(i64::from(lpid.inner()))
        .bind(update_id_schreiben("snapshots.updateid", updateid)?)
        .bind(beschreibung)
        .bind(i64::from(owner.inner()))
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(SnapshotRecord {
            id: SnapshotId(id_lesen("snapshots.id", id)?),
            lpid,
            updateid,
            beschreibung: beschreibung.to_string(),
            owner,
            created_at: now,
        })
    }

    async fn get_snapshot(&self, id: SnapshotId) -> DbResult<Option<SnapshotRecord>> {
        let row = sqlx::query(
            "SELECT id, lpid, updateid, description, owner, created_at
             FROM snapshots WHERE id = ?",
        )
        .bind(i64::from(id.0))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_snapshot(&r)).transpose()
    }

    async fn list_snapshots(&self, hash: &str) -> DbResult<Vec<SnapshotRecord>> {
        let rows = sqlx::query(
            "SELECT s.id, s.lpid, s.updateid, s.description, s.owner, s.created_at
             FROM snapshots s JOIN projects p ON p.lpid = s.lpid
             WHERE p.hash = ?
             ORDER BY s.id",
        )
        .bind(hash)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_snapshot).collect()
    }
}

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> DbResult<SnapshotRecord> {
    let updateid: i64 = row.try_get("updateid")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(SnapshotRecord {
        id: SnapshotId(id_lesen("snapshots.id", row.try_get("id")?)?),
        lpid: LocalProjectId(id_lesen("snapshots.lpid", row.try_get("lpid")?)?),
        updateid: UpdateId(updateid as u64),
        beschreibung: row.try_get("description")?,
        owner: UserId(id_lesen("snapshots.owner", row.try_get("owner")?)?),
        created_at: zeit_lesen("created_at", &created_at)?,
    })
}
