use crate::arr::client::ArrClient;
use crate::clients::service::{create_service, DownloadService, ServiceContext};
use crate::core::config::{ArrInstanceConfig, Config, DownloadClientConfig};
use crate::utils::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Services for every enabled client. A client that cannot be built is
/// logged and left out so the others still run.
pub fn build_download_services(
    configs: &[DownloadClientConfig],
    ctx: Arc<ServiceContext>,
) -> Vec<Arc<dyn DownloadService>> {
    let mut services = Vec::new();

    for config in configs.iter().filter(|config| config.enabled) {
        match create_service(config, ctx.clone()) {
            Ok(service) => {
                info!(client = %config.name, kind = config.kind.as_str(), host = %config.host, "Download client ready");
                services.push(service);
            }
            Err(e) => {
                warn!(client = %config.name, error = %e, "Failed to set up download client, skipping");
            }
        }
    }

    services
}

pub fn build_arr_clients(
    configs: &[ArrInstanceConfig],
    timeout: Duration,
    retry: RetryPolicy,
) -> Vec<Arc<ArrClient>> {
    let mut clients = Vec::new();

    for config in configs.iter().filter(|config| config.enabled) {
        match ArrClient::new(config, timeout, retry.clone()) {
            Ok(client) => {
                info!(instance = %config.name, kind = config.kind.as_str(), url = %config.url, "Arr instance ready");
                clients.push(Arc::new(client));
            }
            Err(e) => {
                warn!(instance = %config.name, error = %e, "Failed to set up arr instance, skipping");
            }
        }
    }

    clients
}

/// One line per job so the effective setup is visible at boot
pub fn log_job_summary(config: &Config) {
    info!(
        enabled = config.queue_cleaner.enabled,
        interval_seconds = config.queue_cleaner.interval_seconds,
        stall_rules = config.queue_cleaner.stall_rules.len(),
        slow_rules = config.queue_cleaner.slow_rules.len(),
        "Queue cleaner"
    );
    info!(
        enabled = config.malware_blocker.enabled,
        interval_seconds = config.malware_blocker.interval_seconds,
        patterns = config.malware_blocker.patterns.len(),
        "Malware blocker"
    );
    info!(
        enabled = config.download_cleaner.enabled,
        interval_seconds = config.download_cleaner.interval_seconds,
        categories = config.download_cleaner.categories.len(),
        unlinked = config.download_cleaner.unlinked.enabled,
        "Download cleaner"
    );

    if config.general.dry_run {
        warn!(dry_run = true, "Dry run enabled, no changes will be made");
    }
}
