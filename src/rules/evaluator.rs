use crate::models::rule::{RuleBase, SlowRule, StallRule};
use crate::models::strike::{StrikeKind, Verdict};
use crate::models::torrent::TorrentItem;
use crate::rules::manager::RuleMatcher;
use crate::rules::striker::StrikeTracker;
use crate::stores::ttl_cache::TtlCache;
use crate::utils::time::hours_to_seconds;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Decides strike, reset or removal for one torrent
pub trait Evaluator: Send + Sync {
    fn evaluate_stall(&self, item: &dyn TorrentItem) -> Verdict;
    fn evaluate_slow(&self, item: &dyn TorrentItem) -> Verdict;
}

pub struct RuleEvaluator {
    rules: Arc<dyn RuleMatcher>,
    striker: Arc<dyn StrikeTracker>,
    /// Downloaded bytes seen on the previous poll, by hash
    progress: TtlCache<String, u64>,
    ttl: Duration,
}

impl RuleEvaluator {
    pub fn new(rules: Arc<dyn RuleMatcher>, striker: Arc<dyn StrikeTracker>, ttl: Duration) -> Self {
        Self {
            rules,
            striker,
            progress: TtlCache::new(),
            ttl,
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.progress.purge_expired()
    }

    /// Swap in the new baseline and report whether the torrent moved by
    /// at least `minimum` bytes since the last poll
    fn made_progress(&self, item: &dyn TorrentItem, minimum: u64) -> bool {
        let current = item.downloaded_bytes();
        let key = item.hash().to_ascii_lowercase();

        let mut previous = None;
        self.progress.update(key, self.ttl, |last| {
            previous = last.copied();
            current
        });

        match previous {
            Some(previous) if current > previous => current - previous >= minimum.max(1),
            _ => false,
        }
    }

    fn strike(&self, item: &dyn TorrentItem, rule: &RuleBase, kind: StrikeKind) -> Verdict {
        let remove = self
            .striker
            .strike_and_check_limit(item.hash(), item.name(), rule.max_strikes, kind);

        if remove {
            info!(
                hash = %item.hash(),
                name = %item.name(),
                rule = %rule.name,
                strike_kind = %kind,
                "Strike limit reached"
            );
            Verdict::remove(kind.into(), delete_from_client(item, rule))
        } else {
            Verdict::keep()
        }
    }

    fn evaluate_stall_rule(&self, item: &dyn TorrentItem, rule: &StallRule) -> Verdict {
        let minimum = rule.minimum_progress.map(|size| size.bytes()).unwrap_or(0);
        let progressed = self.made_progress(item, minimum);

        if rule.base.reset_strikes_on_progress && progressed {
            debug!(hash = %item.hash(), rule = %rule.base.name, "Download progressed");
            self.striker
                .reset_strike(item.hash(), item.name(), StrikeKind::Stalled);
            return Verdict::keep();
        }

        self.strike(item, &rule.base, StrikeKind::Stalled)
    }

    fn evaluate_slow_rule(&self, item: &dyn TorrentItem, rule: &SlowRule) -> Verdict {
        let mut verdict = Verdict::keep();

        if let Some(min_speed) = rule.min_speed_bytes() {
            if item.download_speed() < min_speed {
                verdict = self.strike(item, &rule.base, StrikeKind::SlowSpeed);
            } else if rule.base.reset_strikes_on_progress {
                self.striker
                    .reset_strike(item.hash(), item.name(), StrikeKind::SlowSpeed);
            }
        }

        if rule.max_time_hours > 0.0 {
            let max_seconds = hours_to_seconds(rule.max_time_hours) as i64;
            let too_slow = item.eta().is_some_and(|eta| eta > max_seconds);

            if too_slow {
                let time_verdict = self.strike(item, &rule.base, StrikeKind::SlowTime);
                if !verdict.should_remove {
                    verdict = time_verdict;
                }
            } else if rule.base.reset_strikes_on_progress {
                self.striker
                    .reset_strike(item.hash(), item.name(), StrikeKind::SlowTime);
            }
        }

        verdict
    }
}

/// Public torrents are always removed from the client; private ones only
/// when the rule opts in
pub fn delete_from_client(item: &dyn TorrentItem, rule: &RuleBase) -> bool {
    !item.is_private() || rule.delete_private_torrents_from_client
}

impl Evaluator for RuleEvaluator {
    fn evaluate_stall(&self, item: &dyn TorrentItem) -> Verdict {
        match self.rules.match_stall(item) {
            Some(rule) => self.evaluate_stall_rule(item, rule),
            None => Verdict::keep(),
        }
    }

    fn evaluate_slow(&self, item: &dyn TorrentItem) -> Verdict {
        match self.rules.match_slow(item) {
            Some(rule) => self.evaluate_slow_rule(item, rule),
            None => Verdict::keep(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::publisher::EventPublisher;
    use crate::models::strike::DeleteReason;
    use crate::models::rule::fixture::{slow, stall};
    use crate::models::rule::PrivacyType;
    use crate::models::torrent::fixture::FakeTorrent;
    use crate::rules::manager::RuleManager;
    use crate::rules::striker::Striker;
    use crate::stores::recurring::RecurringOffenders;

    const TTL: Duration = Duration::from_secs(3600);

    fn evaluator(stall_rules: Vec<StallRule>, slow_rules: Vec<SlowRule>) -> (RuleEvaluator, Arc<Striker>) {
        let striker = Arc::new(Striker::new(
            Duration::from_secs(300),
            Arc::new(RecurringOffenders::new()),
            Arc::new(EventPublisher::new(64)),
        ));
        let rules = Arc::new(RuleManager::new(stall_rules, slow_rules));
        let evaluator = RuleEvaluator::new(rules, striker.clone(), TTL);
        (evaluator, striker)
    }

    fn stalled_public_torrent() -> FakeTorrent {
        let mut torrent = FakeTorrent::new("aabb");
        torrent.completion = 25.0;
        torrent
    }

    #[test]
    fn test_stalled_torrent_removed_on_third_poll() {
        let (evaluator, _) = evaluator(vec![stall("stall", 20.0, 100.0, PrivacyType::Both)], vec![]);
        let torrent = stalled_public_torrent();

        assert!(!evaluator.evaluate_stall(&torrent).should_remove);
        assert!(!evaluator.evaluate_stall(&torrent).should_remove);

        let verdict = evaluator.evaluate_stall(&torrent);
        assert!(verdict.should_remove);
        assert_eq!(verdict.reason, Some(DeleteReason::Stalled));
        assert!(verdict.delete_from_client);
    }

    #[test]
    fn test_progress_resets_stall_strikes() {
        let mut rule = stall("stall", 20.0, 100.0, PrivacyType::Both);
        rule.base.reset_strikes_on_progress = true;
        rule.minimum_progress = Some("10 MB".parse().unwrap());
        let (evaluator, striker) = evaluator(vec![rule], vec![]);

        let mut torrent = stalled_public_torrent();
        evaluator.evaluate_stall(&torrent);
        evaluator.evaluate_stall(&torrent);
        assert_eq!(striker.strike_count("aabb", StrikeKind::Stalled), 2);

        // Below the minimum: still a strike
        torrent.downloaded += 5_000_000;
        evaluator.evaluate_stall(&torrent);
        assert_eq!(striker.strike_count("aabb", StrikeKind::Stalled), 3);

        torrent.downloaded += 10_000_000;
        assert!(!evaluator.evaluate_stall(&torrent).should_remove);
        assert_eq!(striker.strike_count("aabb", StrikeKind::Stalled), 0);

        // Counting starts over
        assert!(!evaluator.evaluate_stall(&torrent).should_remove);
        assert!(!evaluator.evaluate_stall(&torrent).should_remove);
        assert!(evaluator.evaluate_stall(&torrent).should_remove);
    }

    #[test]
    fn test_progress_ignored_without_reset_flag() {
        let (evaluator, striker) = evaluator(vec![stall("stall", 0.0, 100.0, PrivacyType::Both)], vec![]);

        let mut torrent = stalled_public_torrent();
        evaluator.evaluate_stall(&torrent);
        torrent.downloaded += 100_000_000;
        evaluator.evaluate_stall(&torrent);

        assert_eq!(striker.strike_count("aabb", StrikeKind::Stalled), 2);
    }

    #[test]
    fn test_private_torrent_kept_in_client() {
        let (evaluator, _) = evaluator(vec![stall("stall", 0.0, 100.0, PrivacyType::Private)], vec![]);
        let mut torrent = stalled_public_torrent();
        torrent.private = true;

        evaluator.evaluate_stall(&torrent);
        evaluator.evaluate_stall(&torrent);
        let verdict = evaluator.evaluate_stall(&torrent);

        assert!(verdict.should_remove);
        assert!(!verdict.delete_from_client);
    }

    #[test]
    fn test_no_matching_rule_keeps() {
        let (evaluator, striker) = evaluator(vec![stall("stall", 50.0, 100.0, PrivacyType::Both)], vec![]);
        let torrent = stalled_public_torrent();

        for _ in 0..5 {
            assert!(!evaluator.evaluate_stall(&torrent).should_remove);
        }
        assert_eq!(striker.strike_count("aabb", StrikeKind::Stalled), 0);
    }

    #[test]
    fn test_slow_speed_strikes_and_resets() {
        let mut rule = slow("slow", 0.0, 100.0, PrivacyType::Both);
        rule.base.reset_strikes_on_progress = true;
        let (evaluator, striker) = evaluator(vec![], vec![rule]);

        let mut torrent = FakeTorrent::new("ccdd");
        torrent.downloading = true;
        torrent.download_speed = 10_000;

        evaluator.evaluate_slow(&torrent);
        evaluator.evaluate_slow(&torrent);
        assert_eq!(striker.strike_count("ccdd", StrikeKind::SlowSpeed), 2);

        torrent.download_speed = 1_000_000;
        evaluator.evaluate_slow(&torrent);
        assert_eq!(striker.strike_count("ccdd", StrikeKind::SlowSpeed), 0);
    }

    #[test]
    fn test_slow_time_is_independent_of_speed() {
        let mut rule = slow("slow", 0.0, 100.0, PrivacyType::Both);
        rule.max_time_hours = 2.0;
        let (evaluator, striker) = evaluator(vec![], vec![rule]);

        let mut torrent = FakeTorrent::new("ccdd");
        torrent.downloading = true;
        torrent.download_speed = 1_000_000;
        torrent.eta = Some(3 * 3600);

        evaluator.evaluate_slow(&torrent);
        evaluator.evaluate_slow(&torrent);
        let verdict = evaluator.evaluate_slow(&torrent);

        assert!(verdict.should_remove);
        assert_eq!(verdict.reason, Some(DeleteReason::SlowTime));
        assert_eq!(striker.strike_count("ccdd", StrikeKind::SlowSpeed), 0);
    }

    #[test]
    fn test_slow_speed_wins_when_both_trip() {
        let mut rule = slow("slow", 0.0, 100.0, PrivacyType::Both);
        rule.max_time_hours = 1.0;
        let (evaluator, _) = evaluator(vec![], vec![rule]);

        let mut torrent = FakeTorrent::new("ccdd");
        torrent.download_speed = 10;
        torrent.eta = Some(100 * 3600);

        evaluator.evaluate_slow(&torrent);
        evaluator.evaluate_slow(&torrent);
        let verdict = evaluator.evaluate_slow(&torrent);
        assert_eq!(verdict.reason, Some(DeleteReason::SlowSpeed));
    }

    #[test]
    fn test_slow_rule_skips_large_torrents() {
        let mut rule = slow("slow", 0.0, 100.0, PrivacyType::Both);
        rule.ignore_above_size = Some("50 GB".parse().unwrap());
        let (evaluator, striker) = evaluator(vec![], vec![rule]);

        let mut torrent = FakeTorrent::new("ccdd");
        torrent.size = 50_000_000_000;
        torrent.download_speed = 0;

        for _ in 0..5 {
            assert!(!evaluator.evaluate_slow(&torrent).should_remove);
        }
        assert_eq!(striker.strike_count("ccdd", StrikeKind::SlowSpeed), 0);
    }
}
