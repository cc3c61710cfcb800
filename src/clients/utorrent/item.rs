use crate::clients::utorrent::api::TorrentRow;
use crate::models::torrent::TorrentItem;
use crate::utils::time::seconds_since;

const STARTED: u32 = 1;
const CHECKING: u32 = 2;
const PAUSED: u32 = 32;
const QUEUED: u32 = 64;

const PROGRESS_DONE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct UTorrentItem {
    row: TorrentRow,
    hash: String,
    private: bool,
    trackers: Vec<String>,
    /// µTorrent only reports when the download completed
    seeding_time: i64,
}

impl UTorrentItem {
    pub fn new(row: TorrentRow, private: bool, trackers: Vec<String>, now: i64) -> Self {
        let seeding_time = seconds_since(row.completed_on, now);
        Self {
            hash: row.hash.to_ascii_lowercase(),
            row,
            private,
            trackers,
            seeding_time,
        }
    }

    fn has(&self, flag: u32) -> bool {
        self.row.status & flag != 0
    }

    fn running(&self) -> bool {
        self.has(STARTED) && !self.has(PAUSED)
    }

    fn active_download(&self) -> bool {
        self.running() && !self.has(CHECKING) && self.row.size > 0 && self.row.progress < PROGRESS_DONE
    }
}

impl TorrentItem for UTorrentItem {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn name(&self) -> &str {
        &self.row.name
    }

    fn is_private(&self) -> bool {
        self.private
    }

    fn trackers(&self) -> Vec<String> {
        self.trackers.clone()
    }

    fn size(&self) -> u64 {
        self.row.size
    }

    fn completion_percentage(&self) -> f64 {
        (self.row.progress as f64 / 10.0).clamp(0.0, 100.0)
    }

    fn downloaded_bytes(&self) -> u64 {
        self.row.downloaded
    }

    fn uploaded_bytes(&self) -> u64 {
        self.row.uploaded
    }

    fn download_speed(&self) -> u64 {
        self.row.download_speed
    }

    fn upload_speed(&self) -> u64 {
        self.row.upload_speed
    }

    fn ratio(&self) -> f64 {
        self.row.ratio as f64 / 1000.0
    }

    fn eta(&self) -> Option<i64> {
        (self.row.eta > 0).then_some(self.row.eta)
    }

    fn seeding_time_seconds(&self) -> i64 {
        self.seeding_time
    }

    fn category(&self) -> Option<&str> {
        Some(self.row.label.as_str()).filter(|label| !label.is_empty())
    }

    fn tags(&self) -> &[String] {
        &[]
    }

    fn save_path(&self) -> Option<&str> {
        Some(self.row.save_path.as_str()).filter(|path| !path.is_empty())
    }

    fn is_downloading(&self) -> bool {
        self.active_download() && !self.is_stalled()
    }

    fn is_stalled(&self) -> bool {
        self.active_download() && self.row.download_speed == 0 && self.row.eta <= 0
    }

    fn is_seeding(&self) -> bool {
        self.running() && self.row.progress >= PROGRESS_DONE
    }

    fn is_paused(&self) -> bool {
        self.has(PAUSED) || (!self.has(STARTED) && !self.has(QUEUED))
    }

    fn is_queued(&self) -> bool {
        self.has(QUEUED) && !self.has(STARTED)
    }

    fn is_checking(&self) -> bool {
        self.has(CHECKING)
    }

    fn is_allocating(&self) -> bool {
        false
    }

    fn is_metadata_downloading(&self) -> bool {
        self.running() && self.row.size == 0
    }
}
