use serde::Serialize;
use std::fmt;

/// Kind of violation a strike is recorded for; each kind has its own counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeKind {
    Stalled,
    DownloadingMetadata,
    FailedImport,
    SlowSpeed,
    SlowTime,
}

impl StrikeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrikeKind::Stalled => "stalled",
            StrikeKind::DownloadingMetadata => "downloading_metadata",
            StrikeKind::FailedImport => "failed_import",
            StrikeKind::SlowSpeed => "slow_speed",
            StrikeKind::SlowTime => "slow_time",
        }
    }
}

impl fmt::Display for StrikeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an item was (or would be) removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    Stalled,
    DownloadingMetadata,
    FailedImport,
    SlowSpeed,
    SlowTime,
    AllFilesSkipped,
    AllFilesBlocked,
    MalwareFileFound,
}

impl DeleteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteReason::Stalled => "stalled",
            DeleteReason::DownloadingMetadata => "downloading metadata",
            DeleteReason::FailedImport => "failed import",
            DeleteReason::SlowSpeed => "slow speed",
            DeleteReason::SlowTime => "slow time",
            DeleteReason::AllFilesSkipped => "all files skipped",
            DeleteReason::AllFilesBlocked => "all files blocked",
            DeleteReason::MalwareFileFound => "malware found",
        }
    }
}

impl fmt::Display for DeleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StrikeKind> for DeleteReason {
    fn from(kind: StrikeKind) -> Self {
        match kind {
            StrikeKind::Stalled => DeleteReason::Stalled,
            StrikeKind::DownloadingMetadata => DeleteReason::DownloadingMetadata,
            StrikeKind::FailedImport => DeleteReason::FailedImport,
            StrikeKind::SlowSpeed => DeleteReason::SlowSpeed,
            StrikeKind::SlowTime => DeleteReason::SlowTime,
        }
    }
}

/// Outcome of a rule evaluation against one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    pub should_remove: bool,
    pub reason: Option<DeleteReason>,
    pub delete_from_client: bool,
}

impl Verdict {
    pub fn keep() -> Self {
        Self::default()
    }

    pub fn remove(reason: DeleteReason, delete_from_client: bool) -> Self {
        Self {
            should_remove: true,
            reason: Some(reason),
            delete_from_client,
        }
    }
}
