use std::fmt::Debug;
use url::Url;

/// Uniform view over a torrent as reported by any download client backend.
///
/// Adapters map their native status/priority encoding onto these accessors.
/// Values a backend cannot supply come back as `false`, `0` or `None`.
pub trait TorrentItem: Debug + Send + Sync {
    /// Info hash, lowercase
    fn hash(&self) -> &str;
    fn name(&self) -> &str;
    fn is_private(&self) -> bool;

    /// Tracker announce URLs reduced to bare hostnames
    fn trackers(&self) -> Vec<String>;

    /// Total wanted size in bytes
    fn size(&self) -> u64;
    /// Completion in percent, 0..=100
    fn completion_percentage(&self) -> f64;
    fn downloaded_bytes(&self) -> u64;
    fn uploaded_bytes(&self) -> u64;
    /// Bytes per second
    fn download_speed(&self) -> u64;
    /// Bytes per second
    fn upload_speed(&self) -> u64;
    fn ratio(&self) -> f64;
    /// Seconds until completion; `None` when the backend reports it as unknown
    fn eta(&self) -> Option<i64>;
    fn seeding_time_seconds(&self) -> i64;
    fn category(&self) -> Option<&str>;
    fn tags(&self) -> &[String];
    /// Directory the torrent content is saved under
    fn save_path(&self) -> Option<&str>;

    fn is_downloading(&self) -> bool;
    fn is_stalled(&self) -> bool;
    fn is_seeding(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn is_queued(&self) -> bool;
    fn is_checking(&self) -> bool;
    fn is_allocating(&self) -> bool;
    fn is_metadata_downloading(&self) -> bool;

    /// Finished downloading, whether actively seeding or stopped
    fn is_complete(&self) -> bool {
        self.completion_percentage() >= 100.0
    }

    /// Match against user ignore patterns: hash, category or tag (exact,
    /// case-insensitive), or a tracker domain suffix
    fn is_ignored(&self, patterns: &[String]) -> bool {
        if patterns.is_empty() {
            return false;
        }

        let trackers = self.trackers();

        patterns.iter().any(|pattern| {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return false;
            }

            if self.hash().eq_ignore_ascii_case(pattern) {
                return true;
            }

            if self
                .category()
                .is_some_and(|category| category.eq_ignore_ascii_case(pattern))
            {
                return true;
            }

            if self.tags().iter().any(|tag| tag.eq_ignore_ascii_case(pattern)) {
                return true;
            }

            let pattern = pattern.to_ascii_lowercase();
            trackers
                .iter()
                .any(|host| host.to_ascii_lowercase().ends_with(&pattern))
        })
    }
}

/// Reduce a tracker announce URL to its host name
pub fn tracker_host(announce: &str) -> Option<String> {
    let url = Url::parse(announce.trim()).ok()?;
    url.host_str().map(|host| host.to_ascii_lowercase())
}

/// Hostnames of all parseable tracker URLs, deduplicated in order
pub fn tracker_hosts<'a, I>(announces: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hosts: Vec<String> = Vec::new();
    for host in announces.into_iter().filter_map(tracker_host) {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

/// One file inside a torrent, backend-neutral
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentFile {
    /// Backend file index used for priority calls
    pub index: usize,
    /// Path relative to the torrent save path
    pub name: String,
    pub size: u64,
    /// False when the file is marked as skipped / do-not-download
    pub wanted: bool,
}

/// Plain-data torrent for tests and fixtures
#[cfg(test)]
pub mod fixture {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct FakeTorrent {
        pub hash: String,
        pub name: String,
        pub private: bool,
        pub trackers: Vec<String>,
        pub size: u64,
        pub completion: f64,
        pub downloaded: u64,
        pub uploaded: u64,
        pub download_speed: u64,
        pub ratio: f64,
        pub eta: Option<i64>,
        pub seeding_time: i64,
        pub category: Option<String>,
        pub tags: Vec<String>,
        pub save_path: Option<String>,
        pub downloading: bool,
        pub stalled: bool,
        pub seeding: bool,
        pub metadata: bool,
    }

    impl FakeTorrent {
        pub fn new(hash: &str) -> Self {
            Self {
                hash: hash.to_string(),
                name: format!("Torrent {}", hash),
                private: false,
                trackers: vec![],
                size: 1_000_000_000,
                completion: 25.0,
                downloaded: 250_000_000,
                uploaded: 0,
                download_speed: 0,
                ratio: 0.0,
                eta: None,
                seeding_time: 0,
                category: None,
                tags: vec![],
                save_path: None,
                downloading: false,
                stalled: true,
                seeding: false,
                metadata: false,
            }
        }
    }

    impl TorrentItem for FakeTorrent {
        fn hash(&self) -> &str {
            &self.hash
        }
        fn name(&self) -> &str {
            &self.name
        }
        fn is_private(&self) -> bool {
            self.private
        }
        fn trackers(&self) -> Vec<String> {
            self.trackers.clone()
        }
        fn size(&self) -> u64 {
            self.size
        }
        fn completion_percentage(&self) -> f64 {
            self.completion
        }
        fn downloaded_bytes(&self) -> u64 {
            self.downloaded
        }
        fn uploaded_bytes(&self) -> u64 {
            self.uploaded
        }
        fn download_speed(&self) -> u64 {
            self.download_speed
        }
        fn upload_speed(&self) -> u64 {
            0
        }
        fn ratio(&self) -> f64 {
            self.ratio
        }
        fn eta(&self) -> Option<i64> {
            self.eta
        }
        fn seeding_time_seconds(&self) -> i64 {
            self.seeding_time
        }
        fn category(&self) -> Option<&str> {
            self.category.as_deref()
        }
        fn tags(&self) -> &[String] {
            &self.tags
        }
        fn save_path(&self) -> Option<&str> {
            self.save_path.as_deref()
        }
        fn is_downloading(&self) -> bool {
            self.downloading
        }
        fn is_stalled(&self) -> bool {
            self.stalled
        }
        fn is_seeding(&self) -> bool {
            self.seeding
        }
        fn is_paused(&self) -> bool {
            false
        }
        fn is_queued(&self) -> bool {
            false
        }
        fn is_checking(&self) -> bool {
            false
        }
        fn is_allocating(&self) -> bool {
            false
        }
        fn is_metadata_downloading(&self) -> bool {
            self.metadata
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixture::FakeTorrent;
    use super::*;

    #[test]
    fn test_tracker_host() {
        assert_eq!(
            tracker_host("https://Tracker.Example.org:443/announce?passkey=x"),
            Some("tracker.example.org".to_string())
        );
        assert_eq!(
            tracker_host("udp://open.tracker.cc:1337/announce"),
            Some("open.tracker.cc".to_string())
        );
        assert_eq!(tracker_host("** [DHT] **"), None);
    }

    #[test]
    fn test_tracker_hosts_dedup() {
        let hosts = tracker_hosts([
            "https://a.example.org/announce",
            "udp://a.example.org:80/announce",
            "https://b.example.org/announce",
        ]);
        assert_eq!(hosts, vec!["a.example.org", "b.example.org"]);
    }

    #[test]
    fn test_is_ignored_by_hash_category_tag() {
        let mut torrent = FakeTorrent::new("abcdef");
        torrent.category = Some("Movies".to_string());
        torrent.tags = vec!["keep".to_string()];

        assert!(torrent.is_ignored(&["ABCDEF".to_string()]));
        assert!(torrent.is_ignored(&["movies".to_string()]));
        assert!(torrent.is_ignored(&["KEEP".to_string()]));
        assert!(!torrent.is_ignored(&["tv".to_string()]));
        assert!(!torrent.is_ignored(&[]));
    }

    #[test]
    fn test_is_ignored_by_tracker_suffix() {
        let mut torrent = FakeTorrent::new("abcdef");
        torrent.trackers = vec!["tracker.private-site.org".to_string()];

        assert!(torrent.is_ignored(&["private-site.org".to_string()]));
        assert!(torrent.is_ignored(&["PRIVATE-SITE.ORG".to_string()]));
        assert!(!torrent.is_ignored(&["other-site.org".to_string()]));
        assert!(!torrent.is_ignored(&["   ".to_string()]));
    }
}
