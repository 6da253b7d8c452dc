//! Background reclamation of abandoned uploads.
//!
//! Sessions idle for longer than the ttl are dropped together with their
//! staging directory. Staging directories with no live session (left behind by
//! a failed completion) are removed once their mtime is older than the ttl.
//! A directory that cannot be removed is logged and left for the next pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::task::JoinHandle;

use crate::error::UploadResult;
use crate::state::AppState;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_sessions: usize,
    pub orphaned_dirs: usize,
}

pub async fn sweep_once(state: &AppState, ttl: Duration, now: DateTime<Utc>) -> UploadResult<SweepReport> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500));
    let cutoff = now.checked_sub_signed(ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut report = SweepReport::default();

    for upload_id in state.sessions.idle_since(cutoff) {
        // re-checked under the map lock: a chunk may have landed meanwhile
        if let Some(session) = state.sessions.take_if_idle(&upload_id, cutoff) {
            tracing::info!(
                "🧹 Expiring idle upload {} ({}, last activity {})",
                upload_id,
                session.filename,
                session.last_activity
            );
            if let Err(e) = state.layout.remove_staging(&upload_id).await {
                tracing::warn!("Failed to remove staging directory for {}: {}", upload_id, e);
            }
            report.expired_sessions += 1;
        }
    }

    let mut entries = match fs::read_dir(state.layout.staging_root()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if state.sessions.contains(&name) {
            continue;
        }
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Skipping unreadable staging entry {}: {}", name, e);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }
        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(t) => t.into(),
            Err(_) => continue,
        };
        if modified < cutoff {
            tracing::info!("🧹 Removing orphaned staging directory {}", name);
            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => report.orphaned_dirs += 1,
                Err(e) => tracing::warn!("Failed to remove orphaned staging directory {}: {}", name, e),
            }
        }
    }

    Ok(report)
}

/// run `sweep_once` every `interval` until the runtime shuts down
pub fn spawn(state: Arc<AppState>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick fires immediately; nothing to sweep at start-up
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sweep_once(&state, ttl, Utc::now()).await {
                Ok(report) if report == SweepReport::default() => {
                    tracing::trace!("Sweep found nothing to reclaim");
                }
                Ok(report) => tracing::info!(
                    "Sweep reclaimed {} sessions and {} orphaned directories",
                    report.expired_sessions,
                    report.orphaned_dirs
                ),
                Err(e) => tracing::error!("Sweep failed: {}", e),
            }
        }
    })
}
