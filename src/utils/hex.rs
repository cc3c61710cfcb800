/// Normalize a torrent hash for use as a cache key or comparison value
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_lowercase()
}

/// Check whether a download ID looks like a v1 torrent info hash (40 hex chars)
///
/// Usenet download IDs (e.g. `SABnzbd_nzo_...`) never match.
pub fn is_info_hash(download_id: &str) -> bool {
    let trimmed = download_id.trim();
    trimmed.len() == 40 && hex::decode(trimmed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_hash() {
        assert_eq!(normalize_hash(" ABCDEF0123 "), "abcdef0123");
        assert_eq!(normalize_hash("abc"), "abc");
    }

    #[test]
    fn test_is_info_hash() {
        assert!(is_info_hash("0123456789ABCDEF0123456789abcdef01234567"));
        assert!(!is_info_hash("SABnzbd_nzo_abcdef"));
        assert!(!is_info_hash("0123456789abcdef"));
        assert!(!is_info_hash("zz23456789abcdef0123456789abcdef01234567"));
    }
}
