//! Malware blocker: skip unwanted files in queued torrents and remove the
//! ones that carry malware or have nothing left to download.

use crate::arr::client::{group_by_download_id, ArrClient};
use crate::clients::service::BlockFilesResult;
use crate::core::state::AppState;
use crate::jobs::queue_cleaner::remove_group;
use crate::utils::hex::is_info_hash;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MalwareBlockerSummary {
    pub checked: usize,
    pub removed: usize,
    pub failed_instances: usize,
}

pub async fn execute(state: &AppState) -> MalwareBlockerSummary {
    let mut summary = MalwareBlockerSummary::default();

    for arr in &state.arrs {
        if let Err(e) = process_instance(state, arr, &mut summary).await {
            warn!(instance = %arr.name(), error = %e, "Malware blocker failed for arr instance");
            summary.failed_instances += 1;
        }
    }

    info!(
        checked = summary.checked,
        removed = summary.removed,
        failed_instances = summary.failed_instances,
        "Malware blocker run finished"
    );
    summary
}

async fn process_instance(
    state: &AppState,
    arr: &ArrClient,
    summary: &mut MalwareBlockerSummary,
) -> anyhow::Result<()> {
    let groups = group_by_download_id(arr.list_queue().await?);

    for group in groups
        .iter()
        .filter(|group| group.is_torrent() && is_info_hash(&group.download_id))
    {
        if state.is_marked_for_removal(&group.download_id) {
            continue;
        }
        summary.checked += 1;

        let result = block_in_clients(state, &group.download_id).await;
        if !result.found {
            debug!(instance = %arr.name(), download_id = %group.download_id, "Download not found in any client");
            continue;
        }

        if result.verdict.should_remove && remove_group(state, arr, group, result.verdict).await {
            summary.removed += 1;
        }
    }

    Ok(())
}

async fn block_in_clients(state: &AppState, hash: &str) -> BlockFilesResult {
    let settings = &state.config.malware_blocker;

    for client in &state.clients {
        match client
            .block_unwanted_files(hash, &state.blocklist, settings, state.ignored_downloads())
            .await
        {
            Ok(result) if result.found => return result,
            Ok(_) => continue,
            Err(e) => {
                warn!(client = %client.name(), hash = %hash, error = %e, "Failed to block files");
            }
        }
    }

    BlockFilesResult::default()
}
