use crate::core::error::RuleError;
use crate::models::rule::{PrivacyType, RuleBase};
use tracing::warn;

/// Completion range a rule claims for one concrete privacy class
#[derive(Debug, Clone, PartialEq)]
pub struct RuleInterval {
    pub rule_id: String,
    pub rule_name: String,
    pub privacy: PrivacyType,
    pub start: f64,
    pub end: f64,
}

impl RuleInterval {
    /// Ranges are `(start, end]`, except that a start of 0 is inclusive,
    /// so any two ranges starting at 0 share the 0% point
    fn overlaps(&self, other: &RuleInterval) -> bool {
        (self.start < other.end && other.start < self.end) || (self.start == 0.0 && other.start == 0.0)
    }
}

/// Part of 0..=100 that no enabled rule covers for a privacy class
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageGap {
    pub privacy: PrivacyType,
    pub start: f64,
    pub end: f64,
}

pub trait IntervalValidator: Send + Sync {
    /// Reject `candidate` if its enabled intervals overlap any other enabled rule
    fn validate(&self, candidate: &RuleBase, existing: &[&RuleBase]) -> Result<(), RuleError>;

    /// Uncovered completion ranges, for warnings only
    fn find_gaps(&self, rules: &[&RuleBase]) -> Vec<CoverageGap>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleIntervalValidator;

impl RuleIntervalValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate every rule of one kind against all the others
    pub fn validate_rule_set(&self, rules: &[&RuleBase]) -> Result<(), RuleError> {
        for rule in rules {
            self.validate(rule, rules)?;
        }
        Ok(())
    }

    /// Log coverage gaps for a rule set; returns them for callers that want more
    pub fn warn_on_gaps(&self, kind: &str, rules: &[&RuleBase]) -> Vec<CoverageGap> {
        if rules.iter().all(|rule| !rule.enabled) {
            return Vec::new();
        }

        let gaps = self.find_gaps(rules);
        for gap in &gaps {
            warn!(
                rule_kind = kind,
                privacy = ?gap.privacy,
                from = gap.start,
                to = gap.end,
                "Completion range is not covered by any enabled rule"
            );
        }
        gaps
    }
}

/// Expand enabled rules into per-privacy intervals, sorted by (start, end)
fn expand_intervals<'a, I>(rules: I, privacy: PrivacyType) -> Vec<RuleInterval>
where
    I: IntoIterator<Item = &'a RuleBase>,
{
    let mut intervals: Vec<RuleInterval> = rules
        .into_iter()
        .filter(|rule| rule.enabled && rule.privacy_type.expand().contains(&privacy))
        .map(|rule| RuleInterval {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            privacy,
            start: rule.min_completion_percentage,
            end: rule.max_completion_percentage,
        })
        .collect();

    intervals.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.end.total_cmp(&b.end)));
    intervals
}

const PRIVACY_CLASSES: [PrivacyType; 2] = [PrivacyType::Public, PrivacyType::Private];

impl IntervalValidator for RuleIntervalValidator {
    fn validate(&self, candidate: &RuleBase, existing: &[&RuleBase]) -> Result<(), RuleError> {
        if !candidate.enabled {
            return Ok(());
        }

        let mut conflicts: Vec<String> = Vec::new();

        for &privacy in candidate.privacy_type.expand() {
            let own = RuleInterval {
                rule_id: candidate.id.clone(),
                rule_name: candidate.name.clone(),
                privacy,
                start: candidate.min_completion_percentage,
                end: candidate.max_completion_percentage,
            };

            let others = expand_intervals(
                existing.iter().copied().filter(|rule| rule.id != candidate.id),
                privacy,
            );

            for other in &others {
                // Sorted by start: nothing after this can overlap
                if other.start > 0.0 && other.start >= own.end {
                    break;
                }
                if own.overlaps(other) && !conflicts.contains(&other.rule_name) {
                    conflicts.push(other.rule_name.clone());
                }
            }
        }

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(RuleError::Overlap {
                name: candidate.name.clone(),
                conflicts,
            })
        }
    }

    fn find_gaps(&self, rules: &[&RuleBase]) -> Vec<CoverageGap> {
        let mut gaps = Vec::new();

        for privacy in PRIVACY_CLASSES {
            let mut covered_until = 0.0_f64;

            for interval in expand_intervals(rules.iter().copied(), privacy) {
                if interval.start > covered_until {
                    gaps.push(CoverageGap {
                        privacy,
                        start: covered_until,
                        end: interval.start,
                    });
                }
                covered_until = covered_until.max(interval.end);
            }

            if covered_until < 100.0 {
                gaps.push(CoverageGap {
                    privacy,
                    start: covered_until,
                    end: 100.0,
                });
            }
        }

        gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::fixture::base;

    #[test]
    fn test_adjacent_intervals_do_not_overlap() {
        let a = base("a", 0.0, 50.0, PrivacyType::Both);
        let b = base("b", 50.0, 100.0, PrivacyType::Both);
        let validator = RuleIntervalValidator::new();

        assert!(validator.validate(&b, &[&a]).is_ok());
        assert!(validator.validate_rule_set(&[&a, &b]).is_ok());
    }

    #[test]
    fn test_overlap_reports_all_conflicts() {
        let a = base("a", 0.0, 30.0, PrivacyType::Public);
        let b = base("b", 20.0, 60.0, PrivacyType::Private);
        let c = base("c", 70.0, 100.0, PrivacyType::Both);
        let candidate = base("new", 10.0, 80.0, PrivacyType::Both);

        let err = RuleIntervalValidator::new()
            .validate(&candidate, &[&a, &b, &c])
            .unwrap_err();

        match err {
            RuleError::Overlap { name, conflicts } => {
                assert_eq!(name, "new");
                assert_eq!(conflicts.len(), 3);
                assert!(conflicts.contains(&"a".to_string()));
                assert!(conflicts.contains(&"b".to_string()));
                assert!(conflicts.contains(&"c".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_different_privacy_classes_do_not_conflict() {
        let public = base("public", 0.0, 100.0, PrivacyType::Public);
        let private = base("private", 0.0, 100.0, PrivacyType::Private);

        assert!(RuleIntervalValidator::new()
            .validate_rule_set(&[&public, &private])
            .is_ok());
    }

    #[test]
    fn test_both_conflicts_with_either_class() {
        let private = base("private", 40.0, 60.0, PrivacyType::Private);
        let both = base("both", 0.0, 50.0, PrivacyType::Both);

        assert!(RuleIntervalValidator::new().validate(&both, &[&private]).is_err());
    }

    #[test]
    fn test_disabled_rules_are_ignored() {
        let mut a = base("a", 0.0, 100.0, PrivacyType::Both);
        let b = base("b", 0.0, 100.0, PrivacyType::Both);
        a.enabled = false;

        let validator = RuleIntervalValidator::new();
        assert!(validator.validate(&b, &[&a]).is_ok());
        assert!(validator.validate(&a, &[&b]).is_ok());
    }

    #[test]
    fn test_zero_width_range_at_zero_conflicts() {
        let empty = base("not started", 0.0, 0.0, PrivacyType::Both);
        let early = base("early", 0.0, 50.0, PrivacyType::Public);
        let later = base("later", 50.0, 100.0, PrivacyType::Both);
        let validator = RuleIntervalValidator::new();

        match validator.validate(&empty, &[&early, &later]).unwrap_err() {
            RuleError::Overlap { conflicts, .. } => assert_eq!(conflicts, vec!["early".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(validator.validate(&early, &[&empty]).is_err());
        assert!(validator.validate_rule_set(&[&empty, &later]).is_ok());
    }

    #[test]
    fn test_rule_does_not_conflict_with_itself() {
        let a = base("a", 0.0, 100.0, PrivacyType::Both);
        assert!(RuleIntervalValidator::new().validate(&a, &[&a]).is_ok());
    }

    #[test]
    fn test_find_gaps() {
        let a = base("a", 0.0, 30.0, PrivacyType::Both);
        let b = base("b", 50.0, 100.0, PrivacyType::Public);

        let gaps = RuleIntervalValidator::new().find_gaps(&[&a, &b]);

        assert_eq!(
            gaps,
            vec![
                CoverageGap {
                    privacy: PrivacyType::Public,
                    start: 30.0,
                    end: 50.0
                },
                CoverageGap {
                    privacy: PrivacyType::Private,
                    start: 30.0,
                    end: 100.0
                },
            ]
        );
    }

    #[test]
    fn test_full_coverage_has_no_gaps() {
        let a = base("a", 0.0, 100.0, PrivacyType::Both);
        assert!(RuleIntervalValidator::new().find_gaps(&[&a]).is_empty());
    }
}
