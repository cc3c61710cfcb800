//! Backend-neutral download client service.
//!
//! Each backend implements the wire primitives; the remediation pipeline
//! (queue checks, file blocking, seeding cleanup, unlinked retargeting) is
//! shared through the provided methods so every backend decides the same way.

use crate::clients::blocklist::FileBlocklist;
use crate::core::config::{CleanCategory, ClientKind, DownloadClientConfig, MalwareBlockerConfig, UnlinkedConfig};
use crate::core::error::ClientError;
use crate::core::executor::Executor;
use crate::events::publisher::{CleanReason, Event, EventPublisher};
use crate::models::strike::{DeleteReason, StrikeKind, Verdict};
use crate::models::torrent::{TorrentFile, TorrentItem};
use crate::rules::evaluator::Evaluator;
use crate::rules::striker::StrikeTracker;
use crate::utils::hardlinks::HardLinkInspector;
use crate::utils::retry::RetryPolicy;
use crate::utils::time::hours_to_seconds;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Collaborators shared by every backend service
pub struct ServiceContext {
    pub evaluator: Arc<dyn Evaluator>,
    pub striker: Arc<dyn StrikeTracker>,
    pub events: Arc<EventPublisher>,
    pub executor: Arc<dyn Executor>,
    pub hardlinks: Arc<HardLinkInspector>,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
    /// 0 disables metadata striking
    pub metadata_max_strikes: u32,
}

/// Outcome of checking one queue item against a client
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueCheckResult {
    pub found: bool,
    pub is_private: bool,
    pub ignored: bool,
    pub verdict: Verdict,
}

/// Outcome of blocking unwanted files of one torrent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockFilesResult {
    pub found: bool,
    pub is_private: bool,
    pub ignored: bool,
    pub verdict: Verdict,
}

#[async_trait]
pub trait DownloadService: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ClientKind;
    fn context(&self) -> &ServiceContext;

    /// Whether `change_category` can tag instead of moving
    fn supports_tags(&self) -> bool {
        false
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<Box<dyn TorrentItem>>, ClientError>;
    async fn get_files(&self, hash: &str) -> Result<Vec<TorrentFile>, ClientError>;
    async fn get_all_torrents(&self) -> Result<Vec<Box<dyn TorrentItem>>, ClientError>;
    async fn set_files_unwanted(&self, hash: &str, indexes: &[usize]) -> Result<(), ClientError>;
    async fn delete_download(&self, hash: &str, delete_files: bool) -> Result<(), ClientError>;
    async fn change_category(&self, item: &dyn TorrentItem, category: &str, use_tag: bool) -> Result<(), ClientError>;

    /// Decide whether the queue item backed by `hash` should be removed.
    /// `found == false` means this client does not know the hash.
    async fn should_remove_from_queue(&self, hash: &str, ignored: &[String]) -> Result<QueueCheckResult> {
        let Some(item) = self.get_torrent(hash).await? else {
            debug!(client = %self.name(), hash = %hash, "Download not found in client");
            return Ok(QueueCheckResult::default());
        };

        let mut result = QueueCheckResult {
            found: true,
            is_private: item.is_private(),
            ..Default::default()
        };

        if item.is_ignored(ignored) {
            info!(client = %self.name(), hash = %hash, name = %item.name(), "Download is ignored");
            result.ignored = true;
            return Ok(result);
        }

        let files = self.get_files(hash).await?;
        if !files.is_empty() && files.iter().all(|file| !file.wanted) {
            info!(client = %self.name(), hash = %hash, name = %item.name(), "All files are skipped");
            result.verdict = Verdict::remove(DeleteReason::AllFilesSkipped, true);
            return Ok(result);
        }

        result.verdict = evaluate_state(self.context(), item.as_ref());
        Ok(result)
    }

    /// Mark blocked files as unwanted; flags the torrent for removal when
    /// malware is found or nothing wanted is left
    async fn block_unwanted_files(
        &self,
        hash: &str,
        blocklist: &FileBlocklist,
        settings: &MalwareBlockerConfig,
        ignored: &[String],
    ) -> Result<BlockFilesResult> {
        let Some(item) = self.get_torrent(hash).await? else {
            return Ok(BlockFilesResult::default());
        };

        let mut result = BlockFilesResult {
            found: true,
            is_private: item.is_private(),
            ..Default::default()
        };

        if item.is_ignored(ignored) {
            info!(client = %self.name(), hash = %hash, name = %item.name(), "Download is ignored");
            result.ignored = true;
            return Ok(result);
        }

        if item.is_private() && settings.ignore_private {
            debug!(client = %self.name(), hash = %hash, "Skipping private torrent");
            return Ok(result);
        }

        let delete_from_client = !item.is_private() || settings.delete_private;
        let plan = blocklist.plan(&self.get_files(hash).await?);

        if plan.malware_found && settings.delete_known_malware {
            warn!(client = %self.name(), hash = %hash, name = %item.name(), "Known malware found");
            result.verdict = Verdict::remove(DeleteReason::MalwareFileFound, delete_from_client);
            return Ok(result);
        }

        if !plan.to_block.is_empty() {
            let ctx = self.context();
            let indexes = plan.to_block.clone();
            let owned_hash = hash.to_string();

            ctx.executor
                .execute(
                    "block_files",
                    Box::pin(async move {
                        self.set_files_unwanted(&owned_hash, &indexes)
                            .await
                            .map_err(anyhow::Error::from)
                    }),
                )
                .await?;

            ctx.events.publish(Event::FilesBlocked {
                client: self.name().to_string(),
                hash: hash.to_string(),
                name: item.name().to_string(),
                files: plan.to_block.len(),
                dry_run: ctx.executor.is_dry_run(),
            });
        }

        if plan.all_blocked {
            result.verdict = Verdict::remove(DeleteReason::AllFilesBlocked, delete_from_client);
        }

        Ok(result)
    }

    /// Completed torrents, whether seeding or stopped
    async fn get_seeding_downloads(&self) -> Result<Vec<Box<dyn TorrentItem>>> {
        let torrents = self.get_all_torrents().await?;
        Ok(torrents
            .into_iter()
            .filter(|item| item.is_complete() && !item.is_checking() && !item.is_allocating())
            .collect())
    }

    /// Downloads in one of the configured clean categories
    fn filter_downloads_to_clean<'a>(
        &self,
        downloads: &'a [Box<dyn TorrentItem>],
        categories: &[CleanCategory],
    ) -> Vec<&'a dyn TorrentItem> {
        downloads
            .iter()
            .map(|item| item.as_ref())
            .filter(|item| find_category(*item, categories).is_some())
            .collect()
    }

    /// Remove downloads whose category limits are reached; returns how many
    async fn clean_downloads(
        &self,
        downloads: &[&dyn TorrentItem],
        categories: &[CleanCategory],
        excluded: &HashSet<String>,
        ignored: &[String],
    ) -> Result<usize> {
        let ctx = self.context();
        let mut cleaned = 0;

        for &item in downloads {
            if is_excluded(item, excluded, ignored) {
                continue;
            }

            let Some(category) = find_category(item, categories) else {
                continue;
            };

            let Some(reason) = clean_reason(item, category) else {
                continue;
            };

            let hash = item.hash().to_string();
            let delete_files = category.delete_source_files;
            let outcome = ctx
                .executor
                .execute(
                    "clean_download",
                    Box::pin(async move {
                        self.delete_download(&hash, delete_files)
                            .await
                            .map_err(anyhow::Error::from)
                    }),
                )
                .await;

            if let Err(e) = outcome {
                warn!(client = %self.name(), hash = %item.hash(), error = %e, "Failed to clean download");
                continue;
            }

            ctx.events.publish(Event::DownloadCleaned {
                client: self.name().to_string(),
                hash: item.hash().to_string(),
                name: item.name().to_string(),
                category: category.name.clone(),
                reason,
                dry_run: ctx.executor.is_dry_run(),
            });
            cleaned += 1;
        }

        Ok(cleaned)
    }

    /// Downloads in one of the watched unlinked categories
    fn filter_downloads_to_change_category<'a>(
        &self,
        downloads: &'a [Box<dyn TorrentItem>],
        unlinked: &UnlinkedConfig,
    ) -> Vec<&'a dyn TorrentItem> {
        downloads
            .iter()
            .map(|item| item.as_ref())
            .filter(|item| {
                item.category().is_some_and(|category| {
                    unlinked
                        .categories
                        .iter()
                        .any(|watched| watched.eq_ignore_ascii_case(category))
                })
            })
            .collect()
    }

    /// Move downloads none of whose files are hardlinked elsewhere to the
    /// target category (or tag); returns the lowercase hashes that changed
    async fn change_category_for_no_hardlinks(
        &self,
        downloads: &[&dyn TorrentItem],
        unlinked: &UnlinkedConfig,
        excluded: &HashSet<String>,
        ignored: &[String],
    ) -> Result<Vec<String>> {
        let ctx = self.context();
        let ignore_root_dir = unlinked.ignored_root_dir.is_some();
        let use_tag = unlinked.use_tag && self.supports_tags();
        let mut changed = Vec::new();

        for &item in downloads {
            if is_excluded(item, excluded, ignored) {
                continue;
            }

            let Some(save_path) = item.save_path() else {
                warn!(client = %self.name(), hash = %item.hash(), "Download has no save path");
                continue;
            };

            let files = match self.get_files(item.hash()).await {
                Ok(files) => files,
                Err(e) => {
                    warn!(client = %self.name(), hash = %item.hash(), error = %e, "Failed to list files");
                    continue;
                }
            };

            match has_no_hardlinks(&ctx.hardlinks, Path::new(save_path), &files, ignore_root_dir) {
                Some(true) => {}
                Some(false) => {
                    debug!(client = %self.name(), hash = %item.hash(), "Download still has hardlinks");
                    continue;
                }
                None => {
                    debug!(client = %self.name(), hash = %item.hash(), "Hardlink count unknown, skipping");
                    continue;
                }
            }

            let target = unlinked.target_category.clone();
            let outcome = ctx
                .executor
                .execute(
                    "change_category",
                    Box::pin(async move {
                        self.change_category(item, &target, use_tag)
                            .await
                            .map_err(anyhow::Error::from)
                    }),
                )
                .await;

            if let Err(e) = outcome {
                warn!(client = %self.name(), hash = %item.hash(), error = %e, "Failed to change category");
                continue;
            }

            ctx.events.publish(Event::CategoryChanged {
                client: self.name().to_string(),
                hash: item.hash().to_string(),
                name: item.name().to_string(),
                from: item.category().unwrap_or_default().to_string(),
                to: unlinked.target_category.clone(),
                is_tag: use_tag,
                dry_run: ctx.executor.is_dry_run(),
            });
            changed.push(item.hash().to_ascii_lowercase());
        }

        Ok(changed)
    }
}

/// Metadata strikes first, then the stall or slow rules depending on state
pub fn evaluate_state(ctx: &ServiceContext, item: &dyn TorrentItem) -> Verdict {
    if item.is_metadata_downloading() {
        let remove = ctx.striker.strike_and_check_limit(
            item.hash(),
            item.name(),
            ctx.metadata_max_strikes,
            StrikeKind::DownloadingMetadata,
        );
        return if remove {
            Verdict::remove(DeleteReason::DownloadingMetadata, true)
        } else {
            Verdict::keep()
        };
    }

    if item.is_stalled() {
        ctx.evaluator.evaluate_stall(item)
    } else if item.is_downloading() {
        ctx.evaluator.evaluate_slow(item)
    } else {
        Verdict::keep()
    }
}

pub fn find_category<'a>(item: &dyn TorrentItem, categories: &'a [CleanCategory]) -> Option<&'a CleanCategory> {
    let category = item.category()?;
    categories
        .iter()
        .find(|candidate| candidate.name.eq_ignore_ascii_case(category))
}

/// Which seeding limit, if any, a download has reached
pub fn clean_reason(item: &dyn TorrentItem, category: &CleanCategory) -> Option<CleanReason> {
    let seeding_seconds = item.seeding_time_seconds().max(0) as f64;

    if category.max_ratio >= 0.0
        && item.ratio() >= category.max_ratio
        && seeding_seconds >= hours_to_seconds(category.min_seed_time)
    {
        return Some(CleanReason::MaxRatioReached);
    }

    if category.max_seed_time >= 0.0 && seeding_seconds >= hours_to_seconds(category.max_seed_time) {
        return Some(CleanReason::MaxSeedTimeReached);
    }

    None
}

/// `Some(true)` when no wanted file has a hardlink; `None` when any count is unknown
pub fn has_no_hardlinks(
    inspector: &HardLinkInspector,
    save_path: &Path,
    files: &[TorrentFile],
    ignore_root_dir: bool,
) -> Option<bool> {
    let mut checked = 0;

    for file in files.iter().filter(|file| file.wanted) {
        let links = inspector.hardlink_count(&save_path.join(&file.name), ignore_root_dir)?;
        if links > 0 {
            return Some(false);
        }
        checked += 1;
    }

    (checked > 0).then_some(true)
}

fn is_excluded(item: &dyn TorrentItem, excluded: &HashSet<String>, ignored: &[String]) -> bool {
    if excluded.contains(&item.hash().to_ascii_lowercase()) {
        debug!(hash = %item.hash(), "Download is in use by an arr instance");
        return true;
    }
    if item.is_ignored(ignored) {
        debug!(hash = %item.hash(), "Download is ignored");
        return true;
    }
    false
}

/// Build the service for one configured client
pub fn create_service(
    config: &DownloadClientConfig,
    ctx: Arc<ServiceContext>,
) -> Result<Arc<dyn DownloadService>> {
    use crate::clients::{deluge, qbittorrent, transmission, utorrent};

    let service: Arc<dyn DownloadService> = match config.kind {
        ClientKind::QBittorrent => Arc::new(qbittorrent::service::QBitService::new(config, ctx)?),
        ClientKind::Transmission => Arc::new(transmission::service::TransmissionService::new(config, ctx)?),
        ClientKind::Deluge => Arc::new(deluge::service::DelugeService::new(config, ctx)?),
        ClientKind::UTorrent => Arc::new(utorrent::service::UTorrentService::new(config, ctx)?),
    };

    Ok(service)
}

#[cfg(test)]
pub mod fixture {
    use super::*;
    use crate::core::executor::executor_for;
    use crate::events::publisher::EventPublisher;
    use crate::rules::evaluator::RuleEvaluator;
    use crate::rules::manager::RuleManager;
    use crate::rules::striker::Striker;
    use crate::stores::recurring::RecurringOffenders;
    use crate::models::rule::{SlowRule, StallRule};

    pub fn context(stall: Vec<StallRule>, slow: Vec<SlowRule>, dry_run: bool) -> Arc<ServiceContext> {
        let events = Arc::new(EventPublisher::new(64));
        let striker = Arc::new(Striker::new(
            Duration::from_secs(300),
            Arc::new(RecurringOffenders::new()),
            Arc::clone(&events),
        ));
        let evaluator = Arc::new(RuleEvaluator::new(
            Arc::new(RuleManager::new(stall, slow)),
            striker.clone(),
            striker.ttl(),
        ));

        Arc::new(ServiceContext {
            evaluator,
            striker,
            events,
            executor: executor_for(dry_run),
            hardlinks: Arc::new(HardLinkInspector::new()),
            retry: RetryPolicy::immediate(0),
            http_timeout: Duration::from_secs(5),
            metadata_max_strikes: 3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::context;
    use super::*;
    use crate::models::rule::fixture::stall;
    use crate::models::rule::PrivacyType;
    use crate::models::torrent::fixture::FakeTorrent;
    use std::sync::Mutex;

    /// In-memory backend recording every mutation
    struct FakeService {
        ctx: Arc<ServiceContext>,
        torrents: Vec<FakeTorrent>,
        files: Vec<TorrentFile>,
        deleted: Mutex<Vec<(String, bool)>>,
        unwanted: Mutex<Vec<usize>>,
        recategorized: Mutex<Vec<(String, String)>>,
    }

    impl FakeService {
        fn new(ctx: Arc<ServiceContext>, torrents: Vec<FakeTorrent>, files: Vec<TorrentFile>) -> Self {
            Self {
                ctx,
                torrents,
                files,
                deleted: Mutex::new(vec![]),
                unwanted: Mutex::new(vec![]),
                recategorized: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl DownloadService for FakeService {
        fn name(&self) -> &str {
            "fake"
        }
        fn kind(&self) -> ClientKind {
            ClientKind::QBittorrent
        }
        fn context(&self) -> &ServiceContext {
            &self.ctx
        }
        async fn get_torrent(&self, hash: &str) -> Result<Option<Box<dyn TorrentItem>>, ClientError> {
            Ok(self
                .torrents
                .iter()
                .find(|t| t.hash == hash)
                .map(|t| Box::new(t.clone()) as Box<dyn TorrentItem>))
        }
        async fn get_files(&self, _hash: &str) -> Result<Vec<TorrentFile>, ClientError> {
            Ok(self.files.clone())
        }
        async fn get_all_torrents(&self) -> Result<Vec<Box<dyn TorrentItem>>, ClientError> {
            Ok(self
                .torrents
                .iter()
                .map(|t| Box::new(t.clone()) as Box<dyn TorrentItem>)
                .collect())
        }
        async fn set_files_unwanted(&self, _hash: &str, indexes: &[usize]) -> Result<(), ClientError> {
            self.unwanted.lock().unwrap().extend_from_slice(indexes);
            Ok(())
        }
        async fn delete_download(&self, hash: &str, delete_files: bool) -> Result<(), ClientError> {
            self.deleted.lock().unwrap().push((hash.to_string(), delete_files));
            Ok(())
        }
        async fn change_category(&self, item: &dyn TorrentItem, category: &str, _use_tag: bool) -> Result<(), ClientError> {
            self.recategorized
                .lock()
                .unwrap()
                .push((item.hash().to_string(), category.to_string()));
            Ok(())
        }
    }

    fn file(index: usize, name: &str, wanted: bool) -> TorrentFile {
        TorrentFile {
            index,
            name: name.to_string(),
            size: 100,
            wanted,
        }
    }

    fn seeding(hash: &str, category: &str, ratio: f64, seeding_hours: i64) -> FakeTorrent {
        let mut torrent = FakeTorrent::new(hash);
        torrent.completion = 100.0;
        torrent.stalled = false;
        torrent.seeding = true;
        torrent.category = Some(category.to_string());
        torrent.ratio = ratio;
        torrent.seeding_time = seeding_hours * 3600;
        torrent
    }

    fn category(name: &str, max_ratio: f64, min_seed_time: f64, max_seed_time: f64) -> CleanCategory {
        CleanCategory {
            name: name.to_string(),
            max_ratio,
            min_seed_time,
            max_seed_time,
            delete_source_files: true,
        }
    }

    #[tokio::test]
    async fn test_unknown_hash_is_not_found() {
        let service = FakeService::new(context(vec![], vec![], false), vec![], vec![]);
        let result = service.should_remove_from_queue("missing", &[]).await.unwrap();
        assert!(!result.found);
        assert!(!result.verdict.should_remove);
    }

    #[tokio::test]
    async fn test_all_files_skipped_removes_without_strikes() {
        let ctx = context(vec![stall("s", 0.0, 100.0, PrivacyType::Both)], vec![], false);
        let service = FakeService::new(
            ctx.clone(),
            vec![FakeTorrent::new("aa")],
            vec![file(0, "a.mkv", false), file(1, "b.nfo", false)],
        );

        let result = service.should_remove_from_queue("aa", &[]).await.unwrap();

        assert!(result.found);
        assert_eq!(result.verdict, Verdict::remove(DeleteReason::AllFilesSkipped, true));
        assert_eq!(ctx.striker.strike_count("aa", StrikeKind::Stalled), 0);
    }

    #[tokio::test]
    async fn test_stalled_torrent_removed_after_three_checks() {
        let ctx = context(vec![stall("s", 20.0, 100.0, PrivacyType::Both)], vec![], false);
        let service = FakeService::new(ctx, vec![FakeTorrent::new("aa")], vec![file(0, "a.mkv", true)]);

        assert!(!service.should_remove_from_queue("aa", &[]).await.unwrap().verdict.should_remove);
        assert!(!service.should_remove_from_queue("aa", &[]).await.unwrap().verdict.should_remove);
        let result = service.should_remove_from_queue("aa", &[]).await.unwrap();
        assert_eq!(result.verdict.reason, Some(DeleteReason::Stalled));
    }

    #[tokio::test]
    async fn test_ignored_download_is_kept() {
        let ctx = context(vec![stall("s", 0.0, 100.0, PrivacyType::Both)], vec![], false);
        let service = FakeService::new(ctx, vec![FakeTorrent::new("aa")], vec![file(0, "a.mkv", true)]);

        for _ in 0..4 {
            let result = service.should_remove_from_queue("aa", &["AA".to_string()]).await.unwrap();
            assert!(result.ignored);
            assert!(!result.verdict.should_remove);
        }
    }

    #[tokio::test]
    async fn test_metadata_strikes_before_rules() {
        let ctx = context(vec![], vec![], false);
        let mut torrent = FakeTorrent::new("aa");
        torrent.metadata = true;
        let service = FakeService::new(ctx.clone(), vec![torrent], vec![]);

        service.should_remove_from_queue("aa", &[]).await.unwrap();
        service.should_remove_from_queue("aa", &[]).await.unwrap();
        let result = service.should_remove_from_queue("aa", &[]).await.unwrap();

        assert_eq!(result.verdict.reason, Some(DeleteReason::DownloadingMetadata));
    }

    #[tokio::test]
    async fn test_block_unwanted_files() {
        let ctx = context(vec![], vec![], false);
        let service = FakeService::new(
            ctx,
            vec![FakeTorrent::new("aa")],
            vec![file(0, "movie.mkv", true), file(1, "sample.mkv", true)],
        );
        let blocklist = FileBlocklist::new(
            crate::core::config::BlocklistType::Blacklist,
            &["sample*".to_string()],
            &[],
        )
        .unwrap();

        let result = service
            .block_unwanted_files("aa", &blocklist, &MalwareBlockerConfig::default(), &[])
            .await
            .unwrap();

        assert!(result.found);
        assert!(!result.verdict.should_remove);
        assert_eq!(*service.unwanted.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_malware_flags_removal() {
        let ctx = context(vec![], vec![], false);
        let service = FakeService::new(
            ctx,
            vec![FakeTorrent::new("aa")],
            vec![file(0, "movie.mkv", true), file(1, "movie.lnk", true)],
        );
        let settings = MalwareBlockerConfig {
            delete_known_malware: true,
            ..Default::default()
        };
        let blocklist = FileBlocklist::new(settings.blocklist_type, &[], &["*.lnk".to_string()]).unwrap();

        let result = service.block_unwanted_files("aa", &blocklist, &settings, &[]).await.unwrap();

        assert_eq!(result.verdict.reason, Some(DeleteReason::MalwareFileFound));
        assert!(service.unwanted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_block_files() {
        let ctx = context(vec![], vec![], true);
        let service = FakeService::new(
            ctx,
            vec![FakeTorrent::new("aa")],
            vec![file(0, "movie.mkv", true), file(1, "readme.txt", true)],
        );
        let blocklist = FileBlocklist::new(
            crate::core::config::BlocklistType::Blacklist,
            &["*.txt".to_string()],
            &[],
        )
        .unwrap();

        service
            .block_unwanted_files("aa", &blocklist, &MalwareBlockerConfig::default(), &[])
            .await
            .unwrap();

        assert!(service.unwanted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clean_reason_thresholds() {
        let torrent = seeding("aa", "movies", 2.0, 10);

        // Ratio reached but minimum seed time not yet
        assert_eq!(clean_reason(&torrent, &category("movies", 1.0, 24.0, -1.0)), None);
        assert_eq!(
            clean_reason(&torrent, &category("movies", 1.0, 5.0, -1.0)),
            Some(CleanReason::MaxRatioReached)
        );
        assert_eq!(
            clean_reason(&torrent, &category("movies", -1.0, 0.0, 10.0)),
            Some(CleanReason::MaxSeedTimeReached)
        );
        // Zero means reached immediately
        assert_eq!(
            clean_reason(&seeding("bb", "movies", 0.0, 0), &category("movies", 0.0, 0.0, -1.0)),
            Some(CleanReason::MaxRatioReached)
        );
        assert_eq!(clean_reason(&torrent, &category("movies", -1.0, 0.0, -1.0)), None);
    }

    #[tokio::test]
    async fn test_clean_downloads_skips_excluded() {
        let ctx = context(vec![], vec![], false);
        let service = FakeService::new(
            ctx,
            vec![
                seeding("aa", "movies", 5.0, 1),
                seeding("bb", "Movies", 5.0, 1),
                seeding("cc", "tv", 5.0, 1),
            ],
            vec![],
        );
        let categories = vec![category("movies", 1.0, 0.0, -1.0)];
        let downloads = service.get_seeding_downloads().await.unwrap();
        let to_clean = service.filter_downloads_to_clean(&downloads, &categories);
        assert_eq!(to_clean.len(), 2);

        let excluded: HashSet<String> = ["aa".to_string()].into_iter().collect();
        let cleaned = service
            .clean_downloads(&to_clean, &categories, &excluded, &[])
            .await
            .unwrap();

        assert_eq!(cleaned, 1);
        assert_eq!(*service.deleted.lock().unwrap(), vec![("bb".to_string(), true)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_change_category_for_unlinked_download() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("linked.mkv"), b"data").unwrap();
        std::fs::hard_link(dir.path().join("linked.mkv"), dir.path().join("library.mkv")).unwrap();
        std::fs::write(dir.path().join("alone.mkv"), b"data").unwrap();

        let mut linked = seeding("aa", "movies", 0.0, 0);
        linked.save_path = Some(dir.path().display().to_string());
        let unlinked_torrent = FakeTorrent {
            hash: "bb".to_string(),
            ..linked.clone()
        };

        let ctx = context(vec![], vec![], false);
        let mut service = FakeService::new(ctx, vec![linked], vec![file(0, "linked.mkv", true)]);

        let config = UnlinkedConfig {
            enabled: true,
            target_category: "unlinked".to_string(),
            use_tag: false,
            ignored_root_dir: None,
            categories: vec!["movies".to_string()],
        };

        let downloads = service.get_seeding_downloads().await.unwrap();
        let candidates = service.filter_downloads_to_change_category(&downloads, &config);
        let changed = service
            .change_category_for_no_hardlinks(&candidates, &config, &HashSet::new(), &[])
            .await
            .unwrap();
        assert!(changed.is_empty());

        service.torrents = vec![unlinked_torrent];
        service.files = vec![file(0, "alone.mkv", true)];
        let downloads = service.get_seeding_downloads().await.unwrap();
        let candidates = service.filter_downloads_to_change_category(&downloads, &config);
        let changed = service
            .change_category_for_no_hardlinks(&candidates, &config, &HashSet::new(), &[])
            .await
            .unwrap();

        assert_eq!(changed, vec!["bb".to_string()]);
        assert_eq!(
            *service.recategorized.lock().unwrap(),
            vec![("bb".to_string(), "unlinked".to_string())]
        );
    }

    #[test]
    fn test_missing_file_means_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = HardLinkInspector::new();
        assert_eq!(
            has_no_hardlinks(&inspector, dir.path(), &[file(0, "gone.mkv", true)], false),
            None
        );
        assert_eq!(has_no_hardlinks(&inspector, dir.path(), &[], false), None);
    }
}
