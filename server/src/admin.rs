//! Verwaltungskommandos fuer Konten und Projekte
//!
//! Laufen ohne TCP-Listener direkt gegen die Datenbank und geben ihr
//! Ergebnis als Textzeilen zurueck; `main` schreibt sie auf stdout.

use anyhow::Context;
use reflector_auth::passwort_schluessel;
use reflector_core::{GlobalProjectId, LocalProjectId, PermissionPair};
use reflector_db::models::NeuerBenutzer;
use reflector_db::UserRepository;
use reflector_relay::{DatabaseBackend, ProjectBackend};

/// Legt ein Konto an
pub async fn benutzer_anlegen(
    backend: &DatabaseBackend,
    name: &str,
    passwort: &str,
    masken: PermissionPair,
) -> anyhow::Result<String> {
    let schluessel = passwort_schluessel(passwort);
    let konto = backend
        .db()
        .create_user(NeuerBenutzer {
            username: name,
            pwkey: &schluessel,
            masken,
        })
        .await
        .with_context(|| format!("Konto '{name}' nicht angelegt"))?;

    tracing::info!(user = %name, id = %konto.id, "Konto angelegt");
    Ok(format!("{} {}", konto.id, konto.username))
}

/// Setzt die Kontomasken eines bestehenden Kontos
pub async fn benutzer_masken(
    backend: &DatabaseBackend,
    name: &str,
    masken: PermissionPair,
) -> anyhow::Result<String> {
    if !backend.db().set_user_permissions(name, masken).await? {
        anyhow::bail!("Unbekanntes Konto '{name}'");
    }
    tracing::info!(user = %name, publish = %masken.publish, subscribe = %masken.subscribe, "Kontomasken gesetzt");
    Ok(format!("{name} publish={} subscribe={}", masken.publish, masken.subscribe))
}

pub async fn benutzer_liste(backend: &DatabaseBackend) -> anyhow::Result<Vec<String>> {
    let konten = backend.db().list_users().await?;
    Ok(konten
        .iter()
        .map(|k| {
            format!(
                "{} {} publish={} subscribe={}",
                k.id, k.username, k.masken.publish, k.masken.subscribe
            )
        })
        .collect())
}

/// Uebernimmt ein Projekt mit bekannter globaler ID von einem anderen Server
pub async fn projekt_migrieren(
    backend: &DatabaseBackend,
    owner: &str,
    gpid: &str,
    hash: &str,
    beschreibung: &str,
    masken: PermissionPair,
) -> anyhow::Result<String> {
    let gpid = GlobalProjectId(gpid.to_string());
    let lpid = backend
        .migrate_project(owner, &gpid, hash, beschreibung, masken)
        .await?;
    Ok(format!("{lpid} {gpid}"))
}

pub async fn projekt_liste(backend: &DatabaseBackend, hash: &str) -> anyhow::Result<Vec<String>> {
    let projekte = backend.project_list(hash).await?;
    Ok(projekte
        .iter()
        .map(|p| {
            let eltern = p
                .parent
                .map(|e| format!(" parent={e}@{}", p.forked_at.unwrap_or_default()))
                .unwrap_or_default();
            format!(
                "{} {} owner={} desc={:?}{eltern}",
                p.lpid, p.gpid, p.owner, p.beschreibung
            )
        })
        .collect())
}

/// Globale ID zu einer lokalen Projekt-ID
pub async fn projekt_gpid(backend: &DatabaseBackend, lpid: u32) -> anyhow::Result<String> {
    let gpid = backend.lpid2gpid(LocalProjectId(lpid)).await?;
    Ok(gpid.to_string())
}
