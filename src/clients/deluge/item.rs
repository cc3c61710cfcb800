use crate::clients::deluge::api::TorrentStatus;
use crate::models::torrent::{tracker_hosts, TorrentItem};

#[derive(Debug, Clone)]
pub struct DelugeItem {
    status: TorrentStatus,
    hash: String,
    trackers: Vec<String>,
}

impl DelugeItem {
    pub fn new(status: TorrentStatus) -> Self {
        let trackers = tracker_hosts(status.trackers.iter().map(|tracker| tracker.url.as_str()));
        Self {
            hash: status.hash.to_ascii_lowercase(),
            status,
            trackers,
        }
    }

    fn state_is(&self, state: &str) -> bool {
        self.status.state.eq_ignore_ascii_case(state)
    }

    /// Magnets report no size until the metadata arrives
    fn has_metadata(&self) -> bool {
        self.status.total_size > 0
    }
}

impl TorrentItem for DelugeItem {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn name(&self) -> &str {
        &self.status.name
    }

    fn is_private(&self) -> bool {
        self.status.private
    }

    fn trackers(&self) -> Vec<String> {
        self.trackers.clone()
    }

    fn size(&self) -> u64 {
        if self.status.total_wanted > 0 {
            self.status.total_wanted
        } else {
            self.status.total_size
        }
    }

    fn completion_percentage(&self) -> f64 {
        self.status.progress.clamp(0.0, 100.0)
    }

    fn downloaded_bytes(&self) -> u64 {
        self.status.total_done
    }

    fn uploaded_bytes(&self) -> u64 {
        self.status.total_uploaded
    }

    fn download_speed(&self) -> u64 {
        self.status.download_payload_rate
    }

    fn upload_speed(&self) -> u64 {
        self.status.upload_payload_rate
    }

    fn ratio(&self) -> f64 {
        self.status.ratio.max(0.0)
    }

    /// Deluge reports 0 when the ETA is unknown
    fn eta(&self) -> Option<i64> {
        (self.status.eta > 0).then_some(self.status.eta)
    }

    fn seeding_time_seconds(&self) -> i64 {
        self.status.seeding_time
    }

    fn category(&self) -> Option<&str> {
        Some(self.status.label.as_str()).filter(|label| !label.is_empty())
    }

    fn tags(&self) -> &[String] {
        &[]
    }

    fn save_path(&self) -> Option<&str> {
        Some(self.status.download_location.as_str()).filter(|path| !path.is_empty())
    }

    fn is_downloading(&self) -> bool {
        self.state_is("Downloading") && self.has_metadata() && !self.is_stalled()
    }

    fn is_stalled(&self) -> bool {
        self.state_is("Downloading")
            && self.has_metadata()
            && self.status.download_payload_rate == 0
            && self.status.eta <= 0
    }

    fn is_seeding(&self) -> bool {
        self.state_is("Seeding")
    }

    fn is_paused(&self) -> bool {
        self.state_is("Paused")
    }

    fn is_queued(&self) -> bool {
        self.state_is("Queued")
    }

    fn is_checking(&self) -> bool {
        self.state_is("Checking")
    }

    fn is_allocating(&self) -> bool {
        self.state_is("Allocating")
    }

    fn is_metadata_downloading(&self) -> bool {
        self.state_is("Downloading") && !self.has_metadata()
    }
}
