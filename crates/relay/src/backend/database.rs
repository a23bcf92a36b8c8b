//! Datenbank-Backend – Konten, Projekte und Historien in SQLite
//!
//! Das Anlegen von Projekten (neu, Fork, Migration) ist prozessweit
//! serialisiert, damit die Vergabe lokaler IDs und die Pruefung auf
//! doppelte globale IDs nicht ineinanderlaufen.

use async_trait::async_trait;
use reflector_auth::{Anmeldepruefung, Challenge};
use reflector_core::{
    GlobalProjectId, LocalProjectId, PermissionPair, SnapshotId, UpdateId, UserId,
};
use reflector_db::models::{ForkQuelle, NeuesProjekt, ProjektRecord, SnapshotRecord};
use reflector_db::{
    ProjectRepository, SnapshotRepository, SqliteDb, UpdateRepository, UserRepository,
};
use reflector_protocol::control::ForkFollow;
use reflector_protocol::Message;
use tokio::sync::Mutex;

use crate::backend::{
    Forkergebnis, Maskenwahl, ProjectBackend, ProjectInfo, Projektbindung, SnapshotInfo,
};
use crate::broadcast::Broadcaster;
use crate::error::{BackendError, BackendResult};
use crate::session::Session;

pub struct DatabaseBackend {
    db: SqliteDb,
    broadcaster: Broadcaster,
    projekt_sperre: Mutex<()>,
}

impl DatabaseBackend {
    /// Erstellt das Backend; `broadcaster` muss derselbe sein, den die
    /// Sessions verwenden
    pub fn neu(db: SqliteDb, broadcaster: Broadcaster) -> Self {
        Self {
            db,
            broadcaster,
            projekt_sperre: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &SqliteDb {
        &self.db
    }

    async fn projekt_laden(&self, lpid: LocalProjectId) -> BackendResult<ProjektRecord> {
        self.db
            .get_project(lpid)
            .await?
            .ok_or(BackendError::ProjektUnbekannt(lpid))
    }

    /// Prueft den angeforderten Stand gegen die Historie des Projekts
    async fn stand_pruefen(&self, lpid: LocalProjectId, bis: UpdateId) -> BackendResult<()> {
        let aktuell = self.db.last_update_id(lpid).await?;
        if bis > aktuell {
            return Err(BackendError::UpdateJenseits {
                angefordert: bis,
                aktuell,
            });
        }
        Ok(())
    }

    async fn forken(
        &self,
        owner: UserId,
        eltern: &ProjektRecord,
        bis: UpdateId,
        beschreibung: &str,
        masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis> {
        let daten = NeuesProjekt {
            gpid: None,
            hash: &eltern.hash,
            beschreibung,
            owner,
            masken: masken.aufloesen(eltern.masken),
        };
        let quelle = ForkQuelle {
            lpid: eltern.lpid,
            bis,
        };

        let neu = {
            let _sperre = self.projekt_sperre.lock().await;
            self.db.fork_project(daten, quelle).await?
        };

        tracing::info!(
            quelle = %eltern.lpid,
            lpid = %neu.lpid,
            bis = %bis,
            "Projekt geforkt"
        );
        Ok(Forkergebnis {
            bindung: bindung_aus(&neu),
            quelle: eltern.lpid,
            stand: bis,
        })
    }
}

fn angemeldet(session: &Session) -> BackendResult<UserId> {
    session.user_id().ok_or(BackendError::NichtAngemeldet)
}

fn gebunden(session: &Session) -> BackendResult<LocalProjectId> {
    session.lpid().ok_or(BackendError::NichtGebunden)
}

fn bindung_aus(p: &ProjektRecord) -> Projektbindung {
    Projektbindung {
        lpid: p.lpid,
        gpid: p.gpid.clone(),
        masken: p.masken,
    }
}

impl From<ProjektRecord> for ProjectInfo {
    fn from(p: ProjektRecord) -> Self {
        Self {
            lpid: p.lpid,
            gpid: p.gpid,
            hash: p.hash,
            beschreibung: p.beschreibung,
            owner: p.owner_name,
            parent: p.parent,
            forked_at: p.forked_at,
            masken: p.masken,
        }
    }
}

impl From<SnapshotRecord> for SnapshotInfo {
    fn from(s: SnapshotRecord) -> Self {
        Self {
            id: s.id,
            lpid: s.lpid,
            updateid: s.updateid,
            beschreibung: s.beschreibung,
        }
    }
}

#[async_trait]
impl ProjectBackend for DatabaseBackend {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn authenticate(
        &self,
        session: &mut Session,
        username: &str,
        challenge: &Challenge,
        antwort: &str,
    ) -> BackendResult<Option<UserId>> {
        let konto = self.db.get_user_by_name(username).await?;

        // Auch fuer unbekannte Konten wird eine volle Pruefung gerechnet
        let pruefung = Anmeldepruefung {
            schluessel_hex: konto.as_ref().map(|k| k.pwkey.as_str()),
            challenge,
            antwort,
        };
        if !pruefung.erfolgreich() {
            return Ok(None);
        }
        let Some(konto) = konto else {
            return Ok(None);
        };

        session.set_konto_masken(konto.masken);
        Ok(Some(konto.id))
    }

    async fn project_info(&self, lpid: LocalProjectId) -> BackendResult<Option<ProjectInfo>> {
        Ok(self.db.get_project(lpid).await?.map(ProjectInfo::from))
    }

    async fn project_list(&self, hash: &str) -> BackendResult<Vec<ProjectInfo>> {
        let projekte = self.db.list_projects(hash).await?;
        Ok(projekte.into_iter().map(ProjectInfo::from).collect())
    }

    async fn snapshot_list(&self, hash: &str) -> BackendResult<Vec<SnapshotInfo>> {
        let snapshots = self.db.list_snapshots(hash).await?;
        Ok(snapshots.into_iter().map(SnapshotInfo::from).collect())
    }

    async fn join_project(
        &self,
        session: &Session,
        lpid: LocalProjectId,
    ) -> BackendResult<Projektbindung> {
        let user = angemeldet(session)?;
        let projekt = self.projekt_laden(lpid).await?;

        if projekt.owner != user && projekt.masken == PermissionPair::NONE {
            return Err(BackendError::KeinZugriff(lpid));
        }
        Ok(bindung_aus(&projekt))
    }

    async fn snap_project(
        &self,
        session: &Session,
        bis: UpdateId,
        beschreibung: &str,
    ) -> BackendResult<SnapshotId> {
        let user = angemeldet(session)?;
        let lpid = gebunden(session)?;
        self.stand_pruefen(lpid, bis).await?;

        let snapshot = self
            .db
            .create_snapshot(lpid, bis, beschreibung, user)
            .await?;
        tracing::info!(lpid = %lpid, snapshot = %snapshot.id, bis = %bis, "Snapshot angelegt");
        Ok(snapshot.id)
    }

    async fn fork_project(
        &self,
        session: &Session,
        bis: UpdateId,
        beschreibung: &str,
        masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis> {
        let user = angemeldet(session)?;
        let lpid = gebunden(session)?;
        let eltern = self.projekt_laden(lpid).await?;
        self.stand_pruefen(lpid, bis).await?;

        self.forken(user, &eltern, bis, beschreibung, masken).await
    }

    async fn snapfork_project(
        &self,
        session: &Session,
        snapshot: SnapshotId,
        beschreibung: &str,
        masken: Maskenwahl,
    ) -> BackendResult<Forkergebnis> {
        let user = angemeldet(session)?;
        let snap = self
            .db
            .get_snapshot(snapshot)
            .await?
            .ok_or(BackendError::SnapshotUnbekannt(snapshot))?;
        let eltern = self.projekt_laden(snap.lpid).await?;

        self.forken(user, &eltern, snap.updateid, beschreibung, masken)
            .await
    }

    async fn send_fork_follows(
        &self,
        ausloeser: &Session,
        alt: LocalProjectId,
        bis: UpdateId,
        beschreibung: &str,
    ) -> BackendResult<usize> {
        let lpid = gebunden(ausloeser)?;
        let angebot = ForkFollow {
            user: ausloeser.username().to_string(),
            lpid,
            gpid: ausloeser.gpid().cloned().unwrap_or_default(),
            lastupdateid: bis,
            desc: beschreibung.to_string(),
        };
        Ok(self
            .broadcaster
            .fork_follow_senden(alt, ausloeser.id(), &angebot))
    }

    async fn send_latest_updates(
        &self,
        session: &mut Session,
        nach: UpdateId,
    ) -> BackendResult<usize> {
        let lpid = gebunden(session)?;
        let updates = self.db.updates_since(lpid, nach).await?;

        let mut zugestellt = 0;
        for update in updates {
            let nachricht = Message {
                command: update.command,
                body: update.payload,
            }
            .mit_update_id(update.updateid);
            if session.post(nachricht) {
                zugestellt += 1;
            }
        }
        tracing::debug!(session = %session.id(), lpid = %lpid, nach = %nach, zugestellt, "Historie nachgeliefert");
        Ok(zugestellt)
    }

    async fn add_project(
        &self,
        session: &Session,
        hash: &str,
        beschreibung: &str,
        masken: PermissionPair,
    ) -> BackendResult<Projektbindung> {
        let owner = angemeldet(session)?;
        let daten = NeuesProjekt {
            gpid: None,
            hash,
            beschreibung,
            owner,
            masken,
        };

        let projekt = {
            let _sperre = self.projekt_sperre.lock().await;
            self.db.create_project(daten).await?
        };
        tracing::info!(lpid = %projekt.lpid, gpid = %projekt.gpid, hash = %hash, "Projekt angelegt");
        Ok(bindung_aus(&projekt))
    }

    async fn migrate_project(
        &self,
        owner: &str,
        gpid: &GlobalProjectId,
        hash: &str,
        beschreibung: &str,
        masken: PermissionPair,
    ) -> BackendResult<LocalProjectId> {
        let konto = self
            .db
            .get_user_by_name(owner)
            .await?
            .ok_or_else(|| BackendError::BenutzerUnbekannt(owner.to_string()))?;

        let _sperre = self.projekt_sperre.lock().await;
        if self.db.get_project_by_gpid(gpid).await?.is_some() {
            return Err(BackendError::GpidVorhanden(gpid.clone()));
        }
        let daten = NeuesProjekt {
            gpid: Some(gpid),
            hash,
            beschreibung,
            owner: konto.id,
            masken,
        };
        let projekt = self.db.create_project(daten).await.map_err(|e| {
            if e.ist_eindeutigkeit() {
                BackendError::GpidVorhanden(gpid.clone())
            } else {
                BackendError::from(e)
            }
        })?;

        tracing::info!(lpid = %projekt.lpid, gpid = %gpid, owner = %owner, "Projekt migriert");
        Ok(projekt.lpid)
    }

    async fn lpid2gpid(&self, lpid: LocalProjectId) -> BackendResult<GlobalProjectId> {
        Ok(self.projekt_laden(lpid).await?.gpid)
    }

    async fn record_update(&self, session: &Session, update: &Message) -> BackendResult<UpdateId> {
        let user = angemeldet(session)?;
        let lpid = gebunden(session)?;
        let id = self
            .db
            .append_update(lpid, user, &update.command, &update.body)
            .await?;
        Ok(id)
    }

    async fn set_project_permissions(
        &self,
        session: &Session,
        masken: PermissionPair,
    ) -> BackendResult<()> {
        let user = angemeldet(session)?;
        let lpid = gebunden(session)?;
        let projekt = self.projekt_laden(lpid).await?;
        if projekt.owner != user {
            return Err(BackendError::NurEigentuemer);
        }

        if !self.db.set_project_permissions(lpid, masken).await? {
            return Err(BackendError::ProjektUnbekannt(lpid));
        }
        tracing::info!(
            lpid = %lpid,
            publish = %masken.publish,
            subscribe = %masken.subscribe,
            "Projektmasken geaendert"
        );
        Ok(())
    }
}
