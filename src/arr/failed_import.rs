//! Strikes for queue items the arr instance could not import.

use crate::arr::client::{QueueGroup, QueueRecord};
use crate::core::config::{FailedImportConfig, PatternMode};
use crate::models::strike::{DeleteReason, StrikeKind, Verdict};
use crate::rules::striker::StrikeTracker;
use tracing::debug;

const STUCK_STATES: &[&str] = &["importPending", "importFailed", "importBlocked"];

/// Warning status while waiting on, or having failed, an import
pub fn is_import_stuck(record: &QueueRecord) -> bool {
    record.tracked_download_status.eq_ignore_ascii_case("warning")
        && STUCK_STATES
            .iter()
            .any(|state| record.tracked_download_state.eq_ignore_ascii_case(state))
}

/// Status message titles and lines, lowercased
fn messages(record: &QueueRecord) -> Vec<String> {
    record
        .status_messages
        .iter()
        .flat_map(|message| std::iter::once(&message.title).chain(message.messages.iter()))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.to_lowercase())
        .collect()
}

/// Whether the record's messages qualify it for a strike under the pattern mode
pub fn matches_patterns(record: &QueueRecord, config: &FailedImportConfig) -> bool {
    let lines = messages(record);
    let matched = config
        .patterns
        .iter()
        .map(|pattern| pattern.trim().to_lowercase())
        .filter(|pattern| !pattern.is_empty())
        .any(|pattern| lines.iter().any(|line| line.contains(&pattern)));

    match config.pattern_mode {
        PatternMode::Include => matched,
        PatternMode::Exclude => !matched,
    }
}

/// Strike the group when its import is stuck; removal once the limit is hit
pub fn evaluate_failed_import(
    group: &QueueGroup,
    config: &FailedImportConfig,
    is_private: bool,
    striker: &dyn StrikeTracker,
) -> Verdict {
    if config.max_strikes == 0 {
        return Verdict::keep();
    }

    if is_private && config.ignore_private {
        debug!(download_id = %group.download_id, "Skipping failed import check for private download");
        return Verdict::keep();
    }

    let Some(record) = group.records.iter().find(|record| is_import_stuck(record)) else {
        return Verdict::keep();
    };

    if !matches_patterns(record, config) {
        debug!(download_id = %group.download_id, "Failed import messages excluded by patterns");
        return Verdict::keep();
    }

    let remove = striker.strike_and_check_limit(
        &group.download_id,
        group.title(),
        config.max_strikes,
        StrikeKind::FailedImport,
    );

    if remove {
        Verdict::remove(DeleteReason::FailedImport, !is_private || config.delete_private)
    } else {
        Verdict::keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::client::StatusMessage;
    use crate::events::publisher::EventPublisher;
    use crate::rules::striker::Striker;
    use crate::stores::recurring::RecurringOffenders;
    use std::sync::Arc;
    use std::time::Duration;

    fn config(mode: PatternMode, patterns: &[&str]) -> FailedImportConfig {
        FailedImportConfig {
            max_strikes: 3,
            ignore_private: false,
            delete_private: false,
            pattern_mode: mode,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn stuck_group(message: &str) -> QueueGroup {
        QueueGroup {
            download_id: "aabb".to_string(),
            records: vec![QueueRecord {
                id: 1,
                title: "Show.S01E01".to_string(),
                download_id: Some("AABB".to_string()),
                protocol: "torrent".to_string(),
                tracked_download_status: "warning".to_string(),
                tracked_download_state: "importPending".to_string(),
                status_messages: vec![StatusMessage {
                    title: "Show.S01E01.mkv".to_string(),
                    messages: vec![message.to_string()],
                }],
                ..QueueRecord::default()
            }],
        }
    }

    fn striker() -> Striker {
        Striker::new(
            Duration::from_secs(300),
            Arc::new(RecurringOffenders::new()),
            Arc::new(EventPublisher::new(16)),
        )
    }

    #[test]
    fn test_only_warning_import_states_are_stuck() {
        let mut record = stuck_group("x").records.remove(0);
        assert!(is_import_stuck(&record));

        record.tracked_download_state = "downloading".to_string();
        assert!(!is_import_stuck(&record));

        record.tracked_download_state = "importBlocked".to_string();
        record.tracked_download_status = "ok".to_string();
        assert!(!is_import_stuck(&record));
    }

    #[test]
    fn test_pattern_modes() {
        let record = stuck_group("Not an upgrade for existing episode file").records.remove(0);

        assert!(matches_patterns(&record, &config(PatternMode::Include, &["not an upgrade"])));
        assert!(!matches_patterns(&record, &config(PatternMode::Include, &["sample"])));
        assert!(!matches_patterns(&record, &config(PatternMode::Exclude, &["NOT AN UPGRADE"])));
        assert!(matches_patterns(&record, &config(PatternMode::Exclude, &[])));
    }

    #[test]
    fn test_removed_on_third_strike() {
        let striker = striker();
        let group = stuck_group("No files found are eligible for import");
        let config = config(PatternMode::Exclude, &[]);

        assert!(!evaluate_failed_import(&group, &config, false, &striker).should_remove);
        assert!(!evaluate_failed_import(&group, &config, false, &striker).should_remove);

        let verdict = evaluate_failed_import(&group, &config, false, &striker);
        assert!(verdict.should_remove);
        assert_eq!(verdict.reason, Some(DeleteReason::FailedImport));
        assert!(verdict.delete_from_client);
    }

    #[test]
    fn test_private_handling() {
        let striker = striker();
        let group = stuck_group("failed");
        let mut config = config(PatternMode::Exclude, &[]);

        config.ignore_private = true;
        for _ in 0..5 {
            assert!(!evaluate_failed_import(&group, &config, true, &striker).should_remove);
        }
        assert_eq!(striker.strike_count("aabb", StrikeKind::FailedImport), 0);

        config.ignore_private = false;
        evaluate_failed_import(&group, &config, true, &striker);
        evaluate_failed_import(&group, &config, true, &striker);
        let verdict = evaluate_failed_import(&group, &config, true, &striker);
        assert!(verdict.should_remove);
        assert!(!verdict.delete_from_client);
    }

    #[test]
    fn test_disabled_when_max_strikes_zero() {
        let striker = striker();
        let mut config = config(PatternMode::Exclude, &[]);
        config.max_strikes = 0;

        assert_eq!(
            evaluate_failed_import(&stuck_group("failed"), &config, false, &striker),
            Verdict::keep()
        );
    }
}
