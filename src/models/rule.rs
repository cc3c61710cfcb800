use crate::core::error::RuleError;
use crate::models::torrent::TorrentItem;
use crate::utils::size::ByteSize;
use serde::Deserialize;

/// Lowest strike threshold a rule may configure
pub const MIN_RULE_STRIKES: u32 = 3;

/// Which torrents a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyType {
    Public,
    Private,
    Both,
}

impl PrivacyType {
    pub fn matches(self, is_private: bool) -> bool {
        match self {
            PrivacyType::Public => !is_private,
            PrivacyType::Private => is_private,
            PrivacyType::Both => true,
        }
    }

    /// Concrete classes this privacy type covers
    pub fn expand(self) -> &'static [PrivacyType] {
        match self {
            PrivacyType::Public => &[PrivacyType::Public],
            PrivacyType::Private => &[PrivacyType::Private],
            PrivacyType::Both => &[PrivacyType::Public, PrivacyType::Private],
        }
    }
}

/// Fields shared by every queue rule
#[derive(Debug, Clone, Deserialize)]
pub struct RuleBase {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub max_strikes: u32,
    #[serde(default = "default_privacy_type")]
    pub privacy_type: PrivacyType,
    #[serde(default)]
    pub min_completion_percentage: f64,
    #[serde(default = "default_max_completion")]
    pub max_completion_percentage: f64,
    #[serde(default)]
    pub reset_strikes_on_progress: bool,
    #[serde(default)]
    pub delete_private_torrents_from_client: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_privacy_type() -> PrivacyType {
    PrivacyType::Both
}

fn default_max_completion() -> f64 {
    100.0
}

impl RuleBase {
    /// Privacy and completion-window match.
    ///
    /// The lower bound is inclusive only when it is 0; the upper bound is always inclusive.
    pub fn matches(&self, item: &dyn TorrentItem) -> bool {
        if !self.privacy_type.matches(item.is_private()) {
            return false;
        }

        let completion = item.completion_percentage();
        let min = self.min_completion_percentage;

        let above_min = completion > min || (min == 0.0 && completion >= 0.0);
        above_min && completion <= self.max_completion_percentage
    }

    fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::EmptyName);
        }

        if self.max_strikes < MIN_RULE_STRIKES {
            return Err(RuleError::MaxStrikesTooLow {
                name: self.name.clone(),
                min: MIN_RULE_STRIKES,
                actual: self.max_strikes,
            });
        }

        for value in [self.min_completion_percentage, self.max_completion_percentage] {
            if !(0.0..=100.0).contains(&value) {
                return Err(RuleError::CompletionOutOfRange {
                    name: self.name.clone(),
                    value,
                });
            }
        }

        if self.min_completion_percentage > self.max_completion_percentage {
            return Err(RuleError::InvertedCompletionRange {
                name: self.name.clone(),
                min: self.min_completion_percentage,
                max: self.max_completion_percentage,
            });
        }

        Ok(())
    }
}

/// Strikes torrents that are stuck without download progress
#[derive(Debug, Clone, Deserialize)]
pub struct StallRule {
    #[serde(flatten)]
    pub base: RuleBase,
    /// Progress needed between polls to count as "made progress"; any progress when unset
    #[serde(default)]
    pub minimum_progress: Option<ByteSize>,
}

/// Strikes torrents that download too slowly or would take too long
#[derive(Debug, Clone, Deserialize)]
pub struct SlowRule {
    #[serde(flatten)]
    pub base: RuleBase,
    /// Bytes per second below which the torrent is slow
    #[serde(default)]
    pub min_speed: Option<ByteSize>,
    /// Maximum acceptable ETA in hours; 0 disables the time criterion
    #[serde(default)]
    pub max_time_hours: f64,
    /// Torrents at or above this size are never matched
    #[serde(default)]
    pub ignore_above_size: Option<ByteSize>,
}

impl StallRule {
    pub fn matches(&self, item: &dyn TorrentItem) -> bool {
        self.base.matches(item)
    }
}

impl SlowRule {
    pub fn min_speed_bytes(&self) -> Option<u64> {
        self.min_speed.map(ByteSize::bytes).filter(|speed| *speed > 0)
    }

    /// Base match, and only for torrents below `ignore_above_size`
    pub fn matches(&self, item: &dyn TorrentItem) -> bool {
        if !self.base.matches(item) {
            return false;
        }
        match self.ignore_above_size {
            Some(limit) => item.size() < limit.bytes(),
            None => true,
        }
    }
}

/// A queue rule of either kind
#[derive(Debug, Clone)]
pub enum QueueRule {
    Stall(StallRule),
    Slow(SlowRule),
}

impl QueueRule {
    pub fn base(&self) -> &RuleBase {
        match self {
            QueueRule::Stall(rule) => &rule.base,
            QueueRule::Slow(rule) => &rule.base,
        }
    }

    pub fn matches(&self, item: &dyn TorrentItem) -> bool {
        match self {
            QueueRule::Stall(rule) => rule.matches(item),
            QueueRule::Slow(rule) => rule.matches(item),
        }
    }

    /// Reject rules that break their own invariants
    pub fn validate(&self) -> Result<(), RuleError> {
        self.base().validate()?;

        if let QueueRule::Slow(rule) = self {
            if rule.max_time_hours < 0.0 || !rule.max_time_hours.is_finite() {
                return Err(RuleError::NegativeMaxTime {
                    name: rule.base.name.clone(),
                    value: rule.max_time_hours,
                });
            }

            if rule.min_speed_bytes().is_none() && rule.max_time_hours == 0.0 {
                return Err(RuleError::NoSlowCriteria {
                    name: rule.base.name.clone(),
                });
            }
        }

        Ok(())
    }
}

impl From<StallRule> for QueueRule {
    fn from(rule: StallRule) -> Self {
        QueueRule::Stall(rule)
    }
}

impl From<SlowRule> for QueueRule {
    fn from(rule: SlowRule) -> Self {
        QueueRule::Slow(rule)
    }
}
