use crate::models::rule::{QueueRule, RuleBase, SlowRule, StallRule, MIN_RULE_STRIKES};
use crate::rules::interval::RuleIntervalValidator;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub arr_instances: Vec<ArrInstanceConfig>,
    #[serde(default)]
    pub download_clients: Vec<DownloadClientConfig>,
    #[serde(default)]
    pub queue_cleaner: QueueCleanerConfig,
    #[serde(default)]
    pub download_cleaner: DownloadCleanerConfig,
    #[serde(default)]
    pub malware_blocker: MalwareBlockerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    #[serde(default = "default_http_max_retries")]
    pub http_max_retries: u32,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Hashes, categories, tags or tracker domains that are never touched
    #[serde(default)]
    pub ignored_downloads: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrKind {
    Sonarr,
    Radarr,
    Lidarr,
    Readarr,
    Whisparr,
}

impl ArrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrKind::Sonarr => "sonarr",
            ArrKind::Radarr => "radarr",
            ArrKind::Lidarr => "lidarr",
            ArrKind::Readarr => "readarr",
            ArrKind::Whisparr => "whisparr",
        }
    }

    /// REST API version segment
    pub fn api_version(&self) -> &'static str {
        match self {
            ArrKind::Sonarr | ArrKind::Radarr | ArrKind::Whisparr => "v3",
            ArrKind::Lidarr | ArrKind::Readarr => "v1",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrInstanceConfig {
    pub name: String,
    pub kind: ArrKind,
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    QBittorrent,
    Transmission,
    Deluge,
    UTorrent,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::QBittorrent => "qbittorrent",
            ClientKind::Transmission => "transmission",
            ClientKind::Deluge => "deluge",
            ClientKind::UTorrent => "utorrent",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadClientConfig {
    pub name: String,
    pub kind: ClientKind,
    /// Scheme, host and port, e.g. `http://localhost:8080`
    pub host: String,
    /// Path prefix when the client sits behind a reverse proxy
    #[serde(default)]
    pub url_base: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl DownloadClientConfig {
    /// Host joined with the optional url base, always ending in `/`
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(self.host.trim())
            .with_context(|| format!("Invalid host '{}' for download client '{}'", self.host, self.name))?;

        let base = self
            .url_base
            .as_deref()
            .map(|base| base.trim_matches('/'))
            .unwrap_or("");

        let mut path = url.path().trim_end_matches('/').to_string();
        if !base.is_empty() {
            path.push('/');
            path.push_str(base);
        }
        path.push('/');
        url.set_path(&path);

        Ok(url)
    }
}

/// How failed-import patterns are applied to status messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Strike only when a message matches a pattern
    Include,
    /// Strike unless a message matches a pattern
    Exclude,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailedImportConfig {
    /// 0 disables the check
    #[serde(default)]
    pub max_strikes: u32,
    #[serde(default)]
    pub ignore_private: bool,
    #[serde(default)]
    pub delete_private: bool,
    #[serde(default = "default_pattern_mode")]
    pub pattern_mode: PatternMode,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueCleanerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_queue_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_enabled")]
    pub skip_if_not_found_in_client: bool,
    /// 0 disables metadata striking
    #[serde(default)]
    pub downloading_metadata_max_strikes: u32,
    #[serde(default = "default_enabled")]
    pub blocklist_on_removal: bool,
    #[serde(default)]
    pub skip_redownload: bool,
    #[serde(default)]
    pub failed_import: FailedImportConfig,
    #[serde(default)]
    pub stall_rules: Vec<StallRule>,
    #[serde(default)]
    pub slow_rules: Vec<SlowRule>,
}

/// Seeding limits for one category
#[derive(Debug, Clone, Deserialize)]
pub struct CleanCategory {
    pub name: String,
    /// Negative disables the ratio check
    #[serde(default = "default_disabled_limit")]
    pub max_ratio: f64,
    /// Hours a torrent must seed before the ratio limit applies
    #[serde(default)]
    pub min_seed_time: f64,
    /// Hours; negative disables the seed time check
    #[serde(default = "default_disabled_limit")]
    pub max_seed_time: f64,
    #[serde(default = "default_enabled")]
    pub delete_source_files: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnlinkedConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_unlinked_category")]
    pub target_category: String,
    /// Tag instead of recategorizing (labels on Transmission)
    #[serde(default)]
    pub use_tag: bool,
    /// Links inside this directory do not count as "in use"
    #[serde(default)]
    pub ignored_root_dir: Option<PathBuf>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadCleanerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_download_interval")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub categories: Vec<CleanCategory>,
    #[serde(default)]
    pub unlinked: UnlinkedConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlocklistType {
    /// Block files matching a pattern
    Blacklist,
    /// Block files matching no pattern
    Whitelist,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MalwareBlockerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_queue_interval")]
    pub interval_seconds: u64,
    #[serde(default)]
    pub ignore_private: bool,
    #[serde(default)]
    pub delete_private: bool,
    #[serde(default)]
    pub delete_known_malware: bool,
    #[serde(default = "default_blocklist_type")]
    pub blocklist_type: BlocklistType,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub malware_patterns: Vec<String>,
}

// Default value functions
fn default_enabled() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    30
}

fn default_http_max_retries() -> u32 {
    2
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

fn default_pattern_mode() -> PatternMode {
    PatternMode::Exclude
}

fn default_queue_interval() -> u64 {
    300 // 5 minutes
}

fn default_download_interval() -> u64 {
    3600 // 1 hour
}

fn default_disabled_limit() -> f64 {
    -1.0
}

fn default_unlinked_category() -> String {
    "unlinked".to_string()
}

fn default_blocklist_type() -> BlocklistType {
    BlocklistType::Blacklist
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            http_timeout_seconds: default_http_timeout(),
            http_max_retries: default_http_max_retries(),
            worker_threads: default_worker_threads(),
            ignored_downloads: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl Default for FailedImportConfig {
    fn default() -> Self {
        Self {
            max_strikes: 0,
            ignore_private: false,
            delete_private: false,
            pattern_mode: default_pattern_mode(),
            patterns: Vec::new(),
        }
    }
}

impl Default for QueueCleanerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_queue_interval(),
            skip_if_not_found_in_client: true,
            downloading_metadata_max_strikes: 0,
            blocklist_on_removal: true,
            skip_redownload: false,
            failed_import: FailedImportConfig::default(),
            stall_rules: Vec::new(),
            slow_rules: Vec::new(),
        }
    }
}

impl Default for UnlinkedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_category: default_unlinked_category(),
            use_tag: false,
            ignored_root_dir: None,
            categories: Vec::new(),
        }
    }
}

impl Default for DownloadCleanerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_download_interval(),
            categories: Vec::new(),
            unlinked: UnlinkedConfig::default(),
        }
    }
}

impl Default for MalwareBlockerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: default_queue_interval(),
            ignore_private: false,
            delete_private: false,
            delete_known_malware: false,
            blocklist_type: default_blocklist_type(),
            patterns: Vec::new(),
            malware_patterns: Vec::new(),
        }
    }
}

impl QueueCleanerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .context("Failed to parse config file")?;

        config.assign_rule_ids();
        config.validate()?;

        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.general.http_timeout_seconds)
    }

    /// Longest interval among jobs that issue strikes
    pub fn strike_interval(&self) -> Duration {
        let seconds = [
            (self.queue_cleaner.enabled, self.queue_cleaner.interval_seconds),
            (self.malware_blocker.enabled, self.malware_blocker.interval_seconds),
        ]
        .iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, seconds)| *seconds)
        .max()
        .unwrap_or(self.queue_cleaner.interval_seconds);

        Duration::from_secs(seconds)
    }

    /// Rules without an explicit id get one derived from their position
    fn assign_rule_ids(&mut self) {
        for (index, rule) in self.queue_cleaner.stall_rules.iter_mut().enumerate() {
            if rule.base.id.trim().is_empty() {
                rule.base.id = format!("stall-{}", index + 1);
            }
        }
        for (index, rule) in self.queue_cleaner.slow_rules.iter_mut().enumerate() {
            if rule.base.id.trim().is_empty() {
                rule.base.id = format!("slow-{}", index + 1);
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate general config
        if self.general.http_timeout_seconds == 0 {
            bail!("http_timeout_seconds must be greater than 0");
        }

        if self.general.worker_threads == 0 {
            bail!("worker_threads must be greater than 0");
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        self.validate_arr_instances()?;
        self.validate_download_clients()?;
        self.validate_queue_cleaner()?;
        self.validate_download_cleaner()?;
        self.validate_malware_blocker()?;

        Ok(())
    }

    fn validate_arr_instances(&self) -> Result<()> {
        let mut names = HashSet::new();

        for instance in &self.arr_instances {
            if instance.name.trim().is_empty() {
                bail!("arr instance name must not be empty");
            }
            if !names.insert(instance.name.to_lowercase()) {
                bail!("Duplicate arr instance name '{}'", instance.name);
            }
            Url::parse(instance.url.trim())
                .with_context(|| format!("Invalid url '{}' for arr instance '{}'", instance.url, instance.name))?;
            if instance.api_key.is_empty() {
                bail!("api_key must not be empty for arr instance '{}'", instance.name);
            }
        }

        Ok(())
    }

    fn validate_download_clients(&self) -> Result<()> {
        let mut names = HashSet::new();

        for client in &self.download_clients {
            if client.name.trim().is_empty() {
                bail!("download client name must not be empty");
            }
            if !names.insert(client.name.to_lowercase()) {
                bail!("Duplicate download client name '{}'", client.name);
            }
            client.base_url()?;
        }

        Ok(())
    }

    fn validate_queue_cleaner(&self) -> Result<()> {
        let queue = &self.queue_cleaner;

        if queue.interval_seconds == 0 {
            bail!("queue_cleaner.interval_seconds must be greater than 0");
        }

        for (field, value) in [
            ("downloading_metadata_max_strikes", queue.downloading_metadata_max_strikes),
            ("failed_import.max_strikes", queue.failed_import.max_strikes),
        ] {
            if value != 0 && value < MIN_RULE_STRIKES {
                bail!(
                    "queue_cleaner.{} must be 0 (disabled) or at least {}, got {}",
                    field,
                    MIN_RULE_STRIKES,
                    value
                );
            }
        }

        let stall: Vec<QueueRule> = queue.stall_rules.iter().cloned().map(QueueRule::from).collect();
        let slow: Vec<QueueRule> = queue.slow_rules.iter().cloned().map(QueueRule::from).collect();

        for rules in [&stall, &slow] {
            let mut ids = HashSet::new();
            for rule in rules.iter() {
                rule.validate()?;
                if !ids.insert(rule.base().id.as_str()) {
                    bail!("Duplicate rule id '{}'", rule.base().id);
                }
            }
        }

        let validator = RuleIntervalValidator::new();
        for (kind, rules) in [("stall", &stall), ("slow", &slow)] {
            let bases: Vec<&RuleBase> = rules.iter().map(QueueRule::base).collect();
            validator.validate_rule_set(&bases)?;
            validator.warn_on_gaps(kind, &bases);
        }

        Ok(())
    }

    fn validate_download_cleaner(&self) -> Result<()> {
        let cleaner = &self.download_cleaner;

        if cleaner.interval_seconds == 0 {
            bail!("download_cleaner.interval_seconds must be greater than 0");
        }

        let mut names = HashSet::new();
        for category in &cleaner.categories {
            if category.name.trim().is_empty() {
                bail!("download_cleaner category name must not be empty");
            }
            if !names.insert(category.name.to_lowercase()) {
                bail!("Duplicate download_cleaner category '{}'", category.name);
            }
            if category.min_seed_time < 0.0 {
                bail!("min_seed_time must be non-negative for category '{}'", category.name);
            }
        }

        let unlinked = &cleaner.unlinked;
        if unlinked.enabled {
            if unlinked.target_category.trim().is_empty() {
                bail!("download_cleaner.unlinked.target_category must not be empty");
            }
            if unlinked.categories.is_empty() {
                bail!("download_cleaner.unlinked.categories must not be empty when enabled");
            }
            if unlinked
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&unlinked.target_category))
            {
                bail!(
                    "download_cleaner.unlinked.target_category '{}' must not be one of the watched categories",
                    unlinked.target_category
                );
            }
            if let Some(root) = &unlinked.ignored_root_dir {
                if !root.is_dir() {
                    bail!("ignored_root_dir '{}' is not a directory", root.display());
                }
            }
        }

        Ok(())
    }

    fn validate_malware_blocker(&self) -> Result<()> {
        let blocker = &self.malware_blocker;

        if blocker.interval_seconds == 0 {
            bail!("malware_blocker.interval_seconds must be greater than 0");
        }

        crate::clients::blocklist::FileBlocklist::from_config(blocker)
            .context("Invalid malware_blocker patterns")?;

        Ok(())
    }
}
