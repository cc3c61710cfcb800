use crate::models::rule::{SlowRule, StallRule};
use crate::models::torrent::TorrentItem;
use tracing::{debug, warn};

/// Resolves the single rule that governs an item
pub trait RuleMatcher: Send + Sync {
    fn match_stall(&self, item: &dyn TorrentItem) -> Option<&StallRule>;
    fn match_slow(&self, item: &dyn TorrentItem) -> Option<&SlowRule>;
}

/// Snapshot of the enabled queue rules
#[derive(Debug, Default, Clone)]
pub struct RuleManager {
    stall_rules: Vec<StallRule>,
    slow_rules: Vec<SlowRule>,
}

impl RuleManager {
    /// Disabled rules are dropped here and never considered for matching
    pub fn new(stall_rules: Vec<StallRule>, slow_rules: Vec<SlowRule>) -> Self {
        Self {
            stall_rules: stall_rules.into_iter().filter(|r| r.base.enabled).collect(),
            slow_rules: slow_rules.into_iter().filter(|r| r.base.enabled).collect(),
        }
    }

    pub fn stall_rules(&self) -> &[StallRule] {
        &self.stall_rules
    }

    pub fn slow_rules(&self) -> &[SlowRule] {
        &self.slow_rules
    }
}

/// Exactly one match, or none. Several matches are a configuration problem
/// and must not pick a rule arbitrarily.
fn single_match<'a, R>(
    kind: &str,
    item: &dyn TorrentItem,
    rules: &'a [R],
    matches: impl Fn(&R) -> bool,
    name: impl Fn(&R) -> &str,
) -> Option<&'a R> {
    let matched: Vec<&R> = rules.iter().filter(|rule| matches(*rule)).collect();

    match matched.as_slice() {
        [] => {
            debug!(
                hash = %item.hash(),
                rule_kind = kind,
                completion = item.completion_percentage(),
                "No rule matched"
            );
            None
        }
        [rule] => Some(*rule),
        many => {
            let names: Vec<&str> = many.iter().map(|rule| name(*rule)).collect();
            warn!(
                hash = %item.hash(),
                name = %item.name(),
                rule_kind = kind,
                rules = ?names,
                "Multiple rules match, skipping item"
            );
            None
        }
    }
}

impl RuleMatcher for RuleManager {
    fn match_stall(&self, item: &dyn TorrentItem) -> Option<&StallRule> {
        single_match(
            "stall",
            item,
            &self.stall_rules,
            |rule| rule.matches(item),
            |rule| rule.base.name.as_str(),
        )
    }

    fn match_slow(&self, item: &dyn TorrentItem) -> Option<&SlowRule> {
        single_match(
            "slow",
            item,
            &self.slow_rules,
            |rule| rule.matches(item),
            |rule| rule.base.name.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::fixture::{slow, stall};
    use crate::models::rule::PrivacyType;
    use crate::models::torrent::fixture::FakeTorrent;

    #[test]
    fn test_match_single_stall_rule() {
        let manager = RuleManager::new(
            vec![
                stall("low", 0.0, 50.0, PrivacyType::Both),
                stall("high", 50.0, 100.0, PrivacyType::Both),
            ],
            vec![],
        );

        let mut torrent = FakeTorrent::new("aa");
        torrent.completion = 50.0;
        assert_eq!(manager.match_stall(&torrent).unwrap().base.name, "low");

        torrent.completion = 75.0;
        assert_eq!(manager.match_stall(&torrent).unwrap().base.name, "high");
    }

    #[test]
    fn test_multiple_matches_yield_none() {
        let manager = RuleManager::new(
            vec![
                stall("a", 0.0, 60.0, PrivacyType::Both),
                stall("b", 40.0, 100.0, PrivacyType::Both),
            ],
            vec![],
        );

        let mut torrent = FakeTorrent::new("aa");
        torrent.completion = 50.0;
        assert!(manager.match_stall(&torrent).is_none());

        torrent.completion = 20.0;
        assert_eq!(manager.match_stall(&torrent).unwrap().base.name, "a");
    }

    #[test]
    fn test_disabled_rules_are_dropped() {
        let mut disabled = slow("off", 0.0, 100.0, PrivacyType::Both);
        disabled.base.enabled = false;
        let manager = RuleManager::new(vec![], vec![disabled]);

        assert!(manager.slow_rules().is_empty());
        assert!(manager.match_slow(&FakeTorrent::new("aa")).is_none());
    }

    #[test]
    fn test_match_slow_respects_privacy() {
        let manager = RuleManager::new(
            vec![],
            vec![
                slow("public", 0.0, 100.0, PrivacyType::Public),
                slow("private", 0.0, 100.0, PrivacyType::Private),
            ],
        );

        let mut torrent = FakeTorrent::new("aa");
        assert_eq!(manager.match_slow(&torrent).unwrap().base.name, "public");

        torrent.private = true;
        assert_eq!(manager.match_slow(&torrent).unwrap().base.name, "private");
    }
}
