// Application state (AppState)

use crate::arr::client::ArrClient;
use crate::clients::blocklist::FileBlocklist;
use crate::clients::service::{DownloadService, ServiceContext};
use crate::core::config::Config;
use crate::core::executor::{executor_for, Executor};
use crate::core::startup::{build_arr_clients, build_download_services};
use crate::events::publisher::EventPublisher;
use crate::rules::evaluator::RuleEvaluator;
use crate::rules::manager::RuleManager;
use crate::rules::striker::Striker;
use crate::stores::recurring::RecurringOffenders;
use crate::stores::ttl_cache::TtlCache;
use crate::utils::hardlinks::HardLinkInspector;
use crate::utils::hex::normalize_hash;
use crate::utils::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

const EVENT_CAPACITY: usize = 1024;

/// Shared state for every job run.
///
/// Built once at startup; strike counters, progress baselines and removal
/// marks live here so they survive between scheduled runs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Enabled download clients, in configuration order
    pub clients: Vec<Arc<dyn DownloadService>>,

    /// Enabled arr instances, in configuration order
    pub arrs: Vec<Arc<ArrClient>>,

    pub striker: Arc<Striker>,
    pub evaluator: Arc<RuleEvaluator>,
    pub events: Arc<EventPublisher>,
    pub executor: Arc<dyn Executor>,
    pub hardlinks: Arc<HardLinkInspector>,
    pub recurring: Arc<RecurringOffenders>,
    pub blocklist: Arc<FileBlocklist>,

    /// Download ids already handed to an arr for removal
    pub removal_marks: Arc<TtlCache<String, ()>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let retry = RetryPolicy::new(config.general.http_max_retries);
        Self::with_retry(config, retry)
    }

    pub fn with_retry(config: Arc<Config>, retry: RetryPolicy) -> Result<Self> {
        let events = Arc::new(EventPublisher::new(EVENT_CAPACITY));
        let recurring = Arc::new(RecurringOffenders::new());
        let executor = executor_for(config.general.dry_run);
        let hardlinks = Arc::new(HardLinkInspector::new());

        let striker = Arc::new(Striker::new(
            config.strike_interval(),
            recurring.clone(),
            events.clone(),
        ));

        let rules = Arc::new(RuleManager::new(
            config.queue_cleaner.stall_rules.clone(),
            config.queue_cleaner.slow_rules.clone(),
        ));
        let evaluator = Arc::new(RuleEvaluator::new(rules, striker.clone(), striker.ttl()));

        let blocklist = Arc::new(
            FileBlocklist::from_config(&config.malware_blocker).context("Invalid malware blocker pattern")?,
        );

        let ctx = Arc::new(ServiceContext {
            evaluator: evaluator.clone(),
            striker: striker.clone(),
            events: events.clone(),
            executor: executor.clone(),
            hardlinks: hardlinks.clone(),
            retry: retry.clone(),
            http_timeout: config.http_timeout(),
            metadata_max_strikes: config.queue_cleaner.downloading_metadata_max_strikes,
        });

        let clients = build_download_services(&config.download_clients, ctx);
        let arrs = build_arr_clients(&config.arr_instances, config.http_timeout(), retry);

        Ok(Self {
            config,
            clients,
            arrs,
            striker,
            evaluator,
            events,
            executor,
            hardlinks,
            recurring,
            blocklist,
            removal_marks: Arc::new(TtlCache::new()),
        })
    }

    pub fn ignored_downloads(&self) -> &[String] {
        &self.config.general.ignored_downloads
    }

    pub fn removal_ttl(&self) -> Duration {
        self.striker.ttl()
    }

    pub fn is_marked_for_removal(&self, download_id: &str) -> bool {
        self.removal_marks.contains(&normalize_hash(download_id))
    }

    pub fn mark_for_removal(&self, download_id: &str) {
        self.removal_marks
            .set(normalize_hash(download_id), (), self.removal_ttl());
    }

    /// Drop expired strikes, progress baselines and removal marks
    pub fn purge_expired(&self) -> usize {
        self.striker.purge_expired() + self.evaluator.purge_expired() + self.removal_marks.purge_expired()
    }
}
