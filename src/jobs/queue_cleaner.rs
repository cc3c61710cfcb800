//! Queue cleaner: strike and remove stuck arr queue items.

use crate::arr::client::{ArrClient, DeleteOptions, QueueGroup};
use crate::arr::failed_import::evaluate_failed_import;
use crate::clients::service::QueueCheckResult;
use crate::core::state::AppState;
use crate::events::publisher::Event;
use crate::models::strike::Verdict;
use crate::utils::hex::is_info_hash;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueCleanerSummary {
    pub checked: usize,
    pub removed: usize,
    pub failed_instances: usize,
}

pub async fn execute(state: &AppState) -> QueueCleanerSummary {
    let mut summary = QueueCleanerSummary::default();

    for arr in &state.arrs {
        if let Err(e) = process_instance(state, arr, &mut summary).await {
            warn!(instance = %arr.name(), error = %e, "Queue cleaner failed for arr instance");
            summary.failed_instances += 1;
        }
    }

    info!(
        checked = summary.checked,
        removed = summary.removed,
        failed_instances = summary.failed_instances,
        "Queue cleaner run finished"
    );
    summary
}

async fn process_instance(
    state: &AppState,
    arr: &Arc<ArrClient>,
    summary: &mut QueueCleanerSummary,
) -> anyhow::Result<()> {
    let groups = crate::arr::client::group_by_download_id(arr.list_queue().await?);
    debug!(instance = %arr.name(), groups = groups.len(), "Processing queue");

    for group in &groups {
        summary.checked += 1;

        if let Some(verdict) = check_group(state, arr, group).await {
            if remove_group(state, arr, group, verdict).await {
                summary.removed += 1;
            }
        }
    }

    Ok(())
}

/// Removal verdict for one queue group, `None` to leave it alone
async fn check_group(state: &AppState, arr: &ArrClient, group: &QueueGroup) -> Option<Verdict> {
    let config = &state.config.queue_cleaner;
    let ignored = state.ignored_downloads();

    if state.is_marked_for_removal(&group.download_id) {
        debug!(instance = %arr.name(), download_id = %group.download_id, "Already marked for removal");
        return None;
    }

    if ignored.iter().any(|pattern| pattern.trim().eq_ignore_ascii_case(&group.download_id)) {
        debug!(instance = %arr.name(), download_id = %group.download_id, "Download is ignored");
        return None;
    }

    let mut check = QueueCheckResult::default();

    if group.is_torrent() && is_info_hash(&group.download_id) {
        check = check_clients(state, &group.download_id).await;

        if check.ignored {
            return None;
        }

        if !check.found && config.skip_if_not_found_in_client {
            debug!(
                instance = %arr.name(),
                download_id = %group.download_id,
                "Download not found in any client, skipping"
            );
            return None;
        }
    }

    if check.verdict.should_remove {
        return Some(check.verdict);
    }

    let verdict = evaluate_failed_import(group, &config.failed_import, check.is_private, state.striker.as_ref());
    verdict.should_remove.then_some(verdict)
}

/// Ask each client in turn until one knows the hash
async fn check_clients(state: &AppState, hash: &str) -> QueueCheckResult {
    for client in &state.clients {
        match client.should_remove_from_queue(hash, state.ignored_downloads()).await {
            Ok(result) if result.found => return result,
            Ok(_) => continue,
            Err(e) => {
                warn!(client = %client.name(), hash = %hash, error = %e, "Queue check failed");
            }
        }
    }

    QueueCheckResult::default()
}

/// Delete the group's queue item on the arr; true when it went through
pub(crate) async fn remove_group(state: &AppState, arr: &ArrClient, group: &QueueGroup, verdict: Verdict) -> bool {
    let Some(reason) = verdict.reason else {
        return false;
    };

    let config = &state.config.queue_cleaner;
    let record_id = group.first().id;
    let options = DeleteOptions {
        remove_from_client: verdict.delete_from_client,
        blocklist: config.blocklist_on_removal,
        skip_redownload: config.skip_redownload,
    };

    info!(
        instance = %arr.name(),
        download_id = %group.download_id,
        title = %group.title(),
        reason = reason.as_str(),
        delete_from_client = verdict.delete_from_client,
        "Removing queue item"
    );

    let outcome = state
        .executor
        .execute(
            "delete_queue_item",
            Box::pin(async move {
                arr.delete_queue_item(record_id, options)
                    .await
                    .map_err(anyhow::Error::from)
            }),
        )
        .await;

    if let Err(e) = outcome {
        warn!(instance = %arr.name(), download_id = %group.download_id, error = %e, "Failed to remove queue item");
        return false;
    }

    state.mark_for_removal(&group.download_id);
    state.events.publish(Event::QueueItemDeleted {
        instance: arr.name().to_string(),
        download_id: group.download_id.clone(),
        title: group.title().to_string(),
        reason,
        delete_from_client: verdict.delete_from_client,
        dry_run: state.executor.is_dry_run(),
    });

    true
}
