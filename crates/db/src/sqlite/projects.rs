//! SQLite-Implementierung des ProjectRepository
//!
//! Forks kopieren die Quell-Updates in derselben Transaktion, in der das
//! neue Projekt angelegt wird. Ein halb kopierter Fork ist damit nie
//! sichtbar.

use chrono::Utc;
use sqlx::{Row as _, Sqlite, Transaction};
use tracing::debug;

use reflector_core::{GlobalProjectId, LocalProjectId, PermissionPair, UpdateId, UserId};

use crate::error::DbError;
use crate::models::{ForkQuelle, NeuesProjekt, ProjektRecord};
use crate::repository::{DbResult, ProjectRepository, ServerMetaRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{id_lesen, maske_lesen, maske_schreiben, update_id_schreiben, zeit_lesen};

const PROJEKT_SELECT: &str = "SELECT p.lpid, p.gpid, p.hash, p.description, p.owner,
        u.username AS owner_name, p.parent, p.forked_at, p.publish, p.subscribe, p.created_at
     FROM projects p JOIN users u ON u.id = p.owner";

impl SqliteDb {
    /// Fuegt die Projektzeile ein und vergibt die globale ID
    async fn projekt_einfuegen(
        tx: &mut Transaction<'_, Sqlite>,
        data: &NeuesProjekt<'_>,
        server_kennung: &str,
        quelle: Option<ForkQuelle>,
    ) -> DbResult<LocalProjectId> {
        let gpid_text = data.gpid.map(|g| g.as_str().to_string());
        let id = sqlx::query(
            "INSERT INTO projects
                (gpid, hash, description, owner, parent, forked_at, publish, subscribe, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(gpid_text)
        .bind(data.hash)
        .bind(data.beschreibung)
        .bind(i64::from(data.owner.inner()))
        .bind(quelle.map(|q| i64::from(q.lpid.inner())))
        .bind(
            quelle
                .map(|q| update_id_schreiben("projects.forked_at", q.bis))
                .transpose()?,
        )
        .bind(maske_schreiben(data.masken.publish))
        .bind(maske_schreiben(data.masken.subscribe))
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            DbError::eindeutig_oder(e, || {
                let gpid = data.gpid.map(GlobalProjectId::as_str).unwrap_or_default();
                format!("Globale Projekt-ID '{gpid}' existiert bereits")
            })
        })?
        .last_insert_rowid();
        let lpid = LocalProjectId(id_lesen("projects.lpid", id)?);

        if data.gpid.is_none() {
            let gpid = GlobalProjectId::aus_lokal(server_kennung, lpid);
            sqlx::query("UPDATE projects SET gpid = ? WHERE lpid = ?")
                .bind(gpid.as_str())
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(lpid)
    }

    async fn projekt_laden(&self, lpid: LocalProjectId) -> DbResult<ProjektRecord> {
        self.get_project(lpid)
            .await?
            .ok_or_else(|| DbError::intern(format!("Projekt {lpid} nach Anlegen nicht gefunden")))
    }
}

impl ProjectRepository for SqliteDb {
    async fn create_project(&self, data: NeuesProjekt<'_>) -> DbResult<ProjektRecord> {
        // Vor der Transaktion lesen: der In-Memory-Pool hat nur eine Verbindung
        let kennung = self.server_kennung().await?;

        let mut tx = self.pool.begin().await?;
        let lpid = Self::projekt_einfuegen(&mut tx, &data, &kennung, None).await?;
        tx.commit().await?;

        debug!(lpid = %lpid, hash = %data.hash, "Projekt angelegt");
        self.projekt_laden(lpid).await
    }

    async fn fork_project(
        &self,
        data: NeuesProjekt<'_>,
        quelle: ForkQuelle,
    ) -> DbResult<ProjektRecord> {
        let kennung = self.server_kennung().await?;

        let mut tx = self.pool.begin().await?;
        let lpid = Self::projekt_einfuegen(&mut tx, &data, &kennung, Some(quelle)).await?;

        let kopiert = sqlx::query(
            "INSERT INTO updates (lpid, updateid, userid, command, payload, created_at)
             SELECT ?, ROW_NUMBER() OVER (ORDER BY updateid), userid, command, payload, created_at
             FROM updates
             WHERE lpid = ? AND updateid <= ?",
        )
        .bind(i64::from(lpid.inner()))
        .bind(i64::from(quelle.lpid.inner()))
        .bind(i64::try_from(quelle.bis.inner()).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        debug!(
            lpid = %lpid,
            quelle = %quelle.lpid,
            bis = %quelle.bis,
            kopiert,
            "Projekt geforkt"
        );
        self.projekt_laden(lpid).await
    }

    async fn get_project(&self, lpid: LocalProjectId) -> DbResult<Option<ProjektRecord>> {
        let row = sqlx::query(&format!("{PROJEKT_SELECT} WHERE p.lpid = ?"))
            .bind(i64::from(lpid.inner()))
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_projekt(&r)).transpose()
    }

    async fn get_project_by_gpid(
        &self,
        gpid: &GlobalProjectId,
    ) -> DbResult<Option<ProjektRecord>> {
        let row = sqlx::query(&format!("{PROJEKT_SELECT} WHERE p.gpid = ?"))
            .bind(gpid.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_projekt(&r)).transpose()
    }

    async fn list_projects(&self, hash: &str) -> DbResult<Vec<ProjektRecord>> {
        let rows = sqlx::query(&format!("{PROJEKT_SELECT} WHERE p.hash = ? ORDER BY p.lpid"))
            .bind(hash)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_projekt).collect()
    }

    async fn set_project_permissions(
        &self,
        lpid: LocalProjectId,
        masken: PermissionPair,
    ) -> DbResult<bool> {
        let affected = sqlx::query("UPDATE projects SET publish = ?, subscribe = ? WHERE lpid = ?")
            .bind(maske_schreiben(masken.publish))
            .bind(maske_schreiben(masken.subscribe))
            .bind(i64::from(lpid.inner()))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_projekt(row: &sqlx::sqlite::SqliteRow) -> DbResult<ProjektRecord> {
    let parent: Option<i64> = row.try_get("parent")?;
    let forked_at: Option<i64> = row.try_get("forked_at")?;
    let gpid: Option<String> = row.try_get("gpid")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ProjektRecord {
        lpid: LocalProjectId(id_lesen("projects.lpid", row.try_get("lpid")?)?),
        gpid: GlobalProjectId(gpid.unwrap_or_default()),
        hash: row.try_get("hash")?,
        beschreibung: row.try_get("description")?,
        owner: UserId(id_lesen("projects.owner", row.try_get("owner")?)?),
        owner_name: row.try_get("owner_name")?,
        parent: parent
            .map(|p| id_lesen("projects.parent", p).map(LocalProjectId))
            .transpose()?,
        forked_at: forked_at.map(|u| UpdateId(u as u64)),
        masken: PermissionPair::neu(
            maske_lesen(row.try_get("publish")?),
            maske_lesen(row.try_get("subscribe")?),
        ),
        created_at: zeit_lesen("created_at", &created_at)?,
    })
}
