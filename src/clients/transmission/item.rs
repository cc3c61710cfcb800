use crate::clients::transmission::api::TorrentInfo;
use crate::models::torrent::{tracker_hosts, TorrentItem};
use std::path::Path;

const STATUS_STOPPED: u8 = 0;
const STATUS_CHECK_WAIT: u8 = 1;
const STATUS_CHECKING: u8 = 2;
const STATUS_DOWNLOAD_WAIT: u8 = 3;
const STATUS_DOWNLOADING: u8 = 4;
const STATUS_SEED_WAIT: u8 = 5;
const STATUS_SEEDING: u8 = 6;

/// Transmission has no categories; the last directory of the download dir
/// plays that role
#[derive(Debug, Clone)]
pub struct TransmissionItem {
    info: TorrentInfo,
    hash: String,
    trackers: Vec<String>,
    category: Option<String>,
}

impl TransmissionItem {
    pub fn new(info: TorrentInfo) -> Self {
        let trackers = tracker_hosts(info.trackers.iter().map(|tracker| tracker.announce.as_str()));
        let category = Path::new(&info.download_dir)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);

        Self {
            hash: info.hash_string.to_ascii_lowercase(),
            info,
            trackers,
            category,
        }
    }

    fn active(&self) -> bool {
        self.info.status == STATUS_DOWNLOADING && self.info.metadata_percent_complete >= 1.0
    }
}

impl TorrentItem for TransmissionItem {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn is_private(&self) -> bool {
        self.info.is_private
    }

    fn trackers(&self) -> Vec<String> {
        self.trackers.clone()
    }

    fn size(&self) -> u64 {
        if self.info.size_when_done > 0 {
            self.info.size_when_done
        } else {
            self.info.total_size
        }
    }

    fn completion_percentage(&self) -> f64 {
        (self.info.percent_done * 100.0).clamp(0.0, 100.0)
    }

    fn downloaded_bytes(&self) -> u64 {
        self.info.downloaded_ever
    }

    fn uploaded_bytes(&self) -> u64 {
        self.info.uploaded_ever
    }

    fn download_speed(&self) -> u64 {
        self.info.rate_download
    }

    fn upload_speed(&self) -> u64 {
        self.info.rate_upload
    }

    fn ratio(&self) -> f64 {
        self.info.upload_ratio.max(0.0)
    }

    fn eta(&self) -> Option<i64> {
        (self.info.eta >= 0).then_some(self.info.eta)
    }

    fn seeding_time_seconds(&self) -> i64 {
        self.info.seconds_seeding
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    fn tags(&self) -> &[String] {
        &self.info.labels
    }

    fn save_path(&self) -> Option<&str> {
        Some(self.info.download_dir.as_str()).filter(|dir| !dir.is_empty())
    }

    fn is_downloading(&self) -> bool {
        self.active() && !self.is_stalled()
    }

    fn is_stalled(&self) -> bool {
        self.active() && self.info.rate_download == 0 && self.info.eta <= 0
    }

    fn is_seeding(&self) -> bool {
        self.info.status == STATUS_SEEDING
    }

    fn is_paused(&self) -> bool {
        self.info.status == STATUS_STOPPED
    }

    fn is_queued(&self) -> bool {
        matches!(self.info.status, STATUS_DOWNLOAD_WAIT | STATUS_SEED_WAIT)
    }

    fn is_checking(&self) -> bool {
        matches!(self.info.status, STATUS_CHECK_WAIT | STATUS_CHECKING)
    }

    fn is_allocating(&self) -> bool {
        false
    }

    fn is_metadata_downloading(&self) -> bool {
        self.info.status == STATUS_DOWNLOADING && self.info.metadata_percent_complete < 1.0
    }
}
