//! SQLite-Implementierung des UserRepository

use chrono::Utc;
use sqlx::Row as _;

use reflector_core::{PermissionPair, UserId};

use crate::error::DbError;
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::repository::{DbResult, UserRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{id_lesen, maske_lesen, maske_schreiben, zeit_lesen};

const BENUTZER_SELECT: &str =
    "SELECT id, username, pwkey, publish, subscribe, created_at FROM users";

impl UserRepository for SqliteDb {
    async fn create_user(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let now = Utc::now();

        let id = sqlx::query(
            "INSERT INTO users (username, pwkey, publish, subscribe, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(data.username)
        .bind(data.pwkey)
        .bind(maske_schreiben(data.masken.publish))
        .bind(maske_schreiben(data.masken.subscribe))
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DbError::eindeutig_oder(e, || {
                format!("Benutzername '{}' bereits vergeben", data.username)
            })
        })?
        .last_insert_rowid();

        Ok(BenutzerRecord {
            id: UserId(id_lesen("users.id", id)?),
            username: data.username.to_string(),
            pwkey: data.pwkey.to_string(),
            masken: data.masken,
            created_at: now,
        })
    }

    async fn get_user(&self, id: UserId) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(&format!("{BENUTZER_SELECT} WHERE id = ?"))
            .bind(i64::from(id.inner()))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }

    async fn get_user_by_name(&self, username: &str) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(&format!("{BENUTZER_SELECT} WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }

    async fn set_user_permissions(
        &self,
        username: &str,
        masken: PermissionPair,
    ) -> DbResult<bool> {
        let affected = sqlx::query("UPDATE users SET publish = ?, subscribe = ? WHERE username = ?")
            .bind(maske_schreiben(masken.publish))
            .bind(maske_schreiben(masken.subscribe))
            .bind(username)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn list_users(&self) -> DbResult<Vec<BenutzerRecord>> {
        let rows = sqlx::query(&format!("{BENUTZER_SELECT} ORDER BY username"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_benutzer).collect()
    }
}

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    let created_at: String = row.try_get("created_at")?;

    Ok(BenutzerRecord {
        id: UserId(id_lesen("users.id", row.try_get("id")?)?),
        username: row.try_get("username")?,
        pwkey: row.try_get("pwkey")?,
        masken: PermissionPair::neu(
            maske_lesen(row.try_get("publish")?),
            maske_lesen(row.try_get("subscribe")?),
        ),
        created_at: zeit_lesen("created_at", &created_at)?,
    })
}
