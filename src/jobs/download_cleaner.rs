//! Download cleaner: retarget unlinked downloads and remove seeded ones.

use crate::clients::service::DownloadService;
use crate::core::state::AppState;
use crate::models::torrent::TorrentItem;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DownloadCleanerSummary {
    pub category_changed: usize,
    pub cleaned: usize,
    pub failed_clients: usize,
}

type ClientDownloads = (Arc<dyn DownloadService>, Vec<Box<dyn TorrentItem>>);

pub async fn execute(state: &AppState) -> DownloadCleanerSummary {
    let mut summary = DownloadCleanerSummary::default();
    let config = &state.config.download_cleaner;

    let Some(mut excluded) = queued_download_ids(state).await else {
        warn!("Could not read every arr queue, skipping download cleaner run");
        return summary;
    };

    let downloads = seeding_downloads(state, &mut summary).await;

    if config.unlinked.enabled && !config.unlinked.categories.is_empty() {
        populate_ignored_root(state).await;
        let retargeted = change_unlinked_categories(state, &downloads, &excluded, &mut summary).await;
        // The snapshot still shows their old category
        excluded.extend(retargeted);
    }

    if !config.categories.is_empty() {
        clean_seeded(state, &downloads, &excluded, &mut summary).await;
    }

    info!(
        category_changed = summary.category_changed,
        cleaned = summary.cleaned,
        failed_clients = summary.failed_clients,
        "Download cleaner run finished"
    );
    summary
}

/// Lowercase download ids in any arr queue, `None` when a queue could not be read
async fn queued_download_ids(state: &AppState) -> Option<HashSet<String>> {
    let mut ids = HashSet::new();

    for arr in &state.arrs {
        match arr.list_queue().await {
            Ok(records) => {
                ids.extend(
                    records
                        .iter()
                        .filter_map(|record| record.download_id())
                        .map(str::to_ascii_lowercase),
                );
            }
            Err(e) => {
                warn!(instance = %arr.name(), error = %e, "Failed to read arr queue");
                return None;
            }
        }
    }

    debug!(count = ids.len(), "Downloads in use by arr instances");
    Some(ids)
}

async fn seeding_downloads(state: &AppState, summary: &mut DownloadCleanerSummary) -> Vec<ClientDownloads> {
    let mut downloads = Vec::new();

    for client in &state.clients {
        match client.get_seeding_downloads().await {
            Ok(items) => {
                debug!(client = %client.name(), count = items.len(), "Seeding downloads");
                downloads.push((client.clone(), items));
            }
            Err(e) => {
                warn!(client = %client.name(), error = %e, "Failed to list seeding downloads");
                summary.failed_clients += 1;
            }
        }
    }

    downloads
}

async fn populate_ignored_root(state: &AppState) {
    let Some(root) = state.config.download_cleaner.unlinked.ignored_root_dir.clone() else {
        return;
    };

    let inspector = state.hardlinks.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || inspector.populate_root_dir(&root)).await {
        warn!(error = %e, "Scanning ignored root dir failed");
    }
}

async fn change_unlinked_categories(
    state: &AppState,
    downloads: &[ClientDownloads],
    excluded: &HashSet<String>,
    summary: &mut DownloadCleanerSummary,
) -> Vec<String> {
    let unlinked = &state.config.download_cleaner.unlinked;
    let mut retargeted = Vec::new();

    for (client, items) in downloads {
        let candidates = client.filter_downloads_to_change_category(items, unlinked);
        if candidates.is_empty() {
            continue;
        }

        match client
            .change_category_for_no_hardlinks(&candidates, unlinked, excluded, state.ignored_downloads())
            .await
        {
            Ok(changed) => {
                summary.category_changed += changed.len();
                retargeted.extend(changed);
            }
            Err(e) => {
                warn!(client = %client.name(), error = %e, "Failed to change categories");
                summary.failed_clients += 1;
            }
        }
    }

    retargeted
}

async fn clean_seeded(
    state: &AppState,
    downloads: &[ClientDownloads],
    excluded: &HashSet<String>,
    summary: &mut DownloadCleanerSummary,
) {
    let categories = &state.config.download_cleaner.categories;

    for (client, items) in downloads {
        let candidates = client.filter_downloads_to_clean(items, categories);
        if candidates.is_empty() {
            continue;
        }

        match client
            .clean_downloads(&candidates, categories, excluded, state.ignored_downloads())
            .await
        {
            Ok(cleaned) => summary.cleaned += cleaned,
            Err(e) => {
                warn!(client = %client.name(), error = %e, "Failed to clean downloads");
                summary.failed_clients += 1;
            }
        }
    }
}
