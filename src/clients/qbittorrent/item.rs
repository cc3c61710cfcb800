use crate::clients::qbittorrent::api::TorrentInfo;
use crate::models::torrent::TorrentItem;

/// qBittorrent reports this when the ETA is unknown
const ETA_INFINITE: i64 = 8_640_000;

#[derive(Debug, Clone)]
pub struct QBitItem {
    info: TorrentInfo,
    hash: String,
    private: bool,
    trackers: Vec<String>,
    tags: Vec<String>,
}

impl QBitItem {
    pub fn new(info: TorrentInfo, private: bool, trackers: Vec<String>) -> Self {
        let tags = info
            .tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            hash: info.hash.to_ascii_lowercase(),
            info,
            private,
            trackers,
            tags,
        }
    }

    fn state_is(&self, states: &[&str]) -> bool {
        states.contains(&self.info.state.as_str())
    }
}

impl TorrentItem for QBitItem {
    fn hash(&self) -> &str {
        &self.hash
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn is_private(&self) -> bool {
        self.private
    }

    fn trackers(&self) -> Vec<String> {
        self.trackers.clone()
    }

    fn size(&self) -> u64 {
        if self.info.size > 0 {
            self.info.size
        } else {
            self.info.total_size
        }
    }

    fn completion_percentage(&self) -> f64 {
        (self.info.progress * 100.0).clamp(0.0, 100.0)
    }

    fn downloaded_bytes(&self) -> u64 {
        self.info.downloaded
    }

    fn uploaded_bytes(&self) -> u64 {
        self.info.uploaded
    }

    fn download_speed(&self) -> u64 {
        self.info.dlspeed
    }

    fn upload_speed(&self) -> u64 {
        self.info.upspeed
    }

    fn ratio(&self) -> f64 {
        self.info.ratio
    }

    fn eta(&self) -> Option<i64> {
        match self.info.eta {
            eta if eta < 0 || eta >= ETA_INFINITE => None,
            eta => Some(eta),
        }
    }

    fn seeding_time_seconds(&self) -> i64 {
        self.info.seeding_time
    }

    fn category(&self) -> Option<&str> {
        Some(self.info.category.as_str()).filter(|category| !category.is_empty())
    }

    fn tags(&self) -> &[String] {
        &self.tags
    }

    fn save_path(&self) -> Option<&str> {
        Some(self.info.save_path.as_str()).filter(|path| !path.is_empty())
    }

    fn is_downloading(&self) -> bool {
        self.state_is(&["downloading", "forcedDL"])
    }

    fn is_stalled(&self) -> bool {
        self.state_is(&["stalledDL"])
    }

    fn is_seeding(&self) -> bool {
        self.state_is(&["uploading", "stalledUP", "forcedUP"])
    }

    fn is_paused(&self) -> bool {
        let state = self.info.state.as_str();
        state.starts_with("paused") || state.starts_with("stopped")
    }

    fn is_queued(&self) -> bool {
        self.info.state.starts_with("queued")
    }

    fn is_checking(&self) -> bool {
        self.info.state.starts_with("checking")
    }

    fn is_allocating(&self) -> bool {
        self.state_is(&["allocating"])
    }

    fn is_metadata_downloading(&self) -> bool {
        self.state_is(&["metaDL", "forcedMetaDL"])
    }
}
