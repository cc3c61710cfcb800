//! File name patterns for blocking unwanted torrent content.
//!
//! Pattern syntax: `*x*` contains, `*x` suffix, `x*` prefix, anything else
//! exact. A `regex:` prefix compiles the rest as a regular expression
//! instead. Matching is case-insensitive either way.

use crate::core::config::{BlocklistType, MalwareBlockerConfig};
use crate::models::torrent::TorrentFile;
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub enum FilePattern {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(Regex),
}

impl FilePattern {
    pub fn parse(raw: &str) -> Result<Self, regex::Error> {
        let raw = raw.trim();

        if let Some(expr) = raw.strip_prefix("regex:") {
            return RegexBuilder::new(expr)
                .case_insensitive(true)
                .build()
                .map(FilePattern::Regex);
        }

        let lower = raw.to_lowercase();
        let starts = lower.starts_with('*');
        let ends = lower.ends_with('*') && lower.len() > 1;
        let inner = lower.trim_matches('*').to_string();

        Ok(match (starts, ends) {
            (true, true) => FilePattern::Contains(inner),
            (true, false) => FilePattern::Suffix(inner),
            (false, true) => FilePattern::Prefix(inner),
            (false, false) => FilePattern::Exact(inner),
        })
    }

    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            FilePattern::Regex(regex) => regex.is_match(file_name),
            FilePattern::Exact(value) => file_name.to_lowercase() == *value,
            FilePattern::Prefix(value) => file_name.to_lowercase().starts_with(value.as_str()),
            FilePattern::Suffix(value) => file_name.to_lowercase().ends_with(value.as_str()),
            FilePattern::Contains(value) => file_name.to_lowercase().contains(value.as_str()),
        }
    }
}

/// What blocking would do to one torrent's files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileBlockPlan {
    /// Wanted files that should become unwanted
    pub to_block: Vec<usize>,
    pub malware_found: bool,
    /// Every file is unwanted once `to_block` is applied
    pub all_blocked: bool,
}

#[derive(Debug, Clone)]
pub struct FileBlocklist {
    mode: BlocklistType,
    patterns: Vec<FilePattern>,
    malware: Vec<FilePattern>,
}

impl FileBlocklist {
    pub fn new(mode: BlocklistType, patterns: &[String], malware: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            mode,
            patterns: parse_all(patterns)?,
            malware: parse_all(malware)?,
        })
    }

    pub fn from_config(config: &MalwareBlockerConfig) -> Result<Self, regex::Error> {
        Self::new(config.blocklist_type, &config.patterns, &config.malware_patterns)
    }

    /// Whether a file should be skipped. An empty list blocks nothing in either mode.
    pub fn is_blocked(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let name = file_name(path);
        let matched = self.patterns.iter().any(|pattern| pattern.matches(name));

        match self.mode {
            BlocklistType::Blacklist => matched,
            BlocklistType::Whitelist => !matched,
        }
    }

    pub fn is_malware(&self, path: &str) -> bool {
        let name = file_name(path);
        self.malware.iter().any(|pattern| pattern.matches(name))
    }

    pub fn plan(&self, files: &[TorrentFile]) -> FileBlockPlan {
        let mut plan = FileBlockPlan::default();
        let mut unwanted = 0usize;

        for file in files {
            let malware = self.is_malware(&file.name);
            plan.malware_found |= malware;

            if !file.wanted {
                unwanted += 1;
            } else if malware || self.is_blocked(&file.name) {
                plan.to_block.push(file.index);
                unwanted += 1;
            }
        }

        plan.all_blocked = !files.is_empty() && unwanted == files.len();
        plan
    }
}

fn parse_all(raw: &[String]) -> Result<Vec<FilePattern>, regex::Error> {
    raw.iter()
        .filter(|pattern| !pattern.trim().is_empty())
        .map(|pattern| FilePattern::parse(pattern))
        .collect()
}

/// Last path component, for either separator
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
