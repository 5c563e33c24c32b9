//! Path-based narrowing of duplicate results.
//!
//! Filters operate on the textual form of member paths, after the
//! inventory is built, so they never change what gets scanned or hashed.
//! Applying several filters in sequence narrows with AND semantics: a
//! group must survive every filter to remain.

use std::path::Path;

use regex::Regex;

use crate::duplicates::DuplicateGroup;

/// How a group-level filter treats partial matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Keep a group if at least one member matches. The inclusive
    /// default: "show me groups that involve this directory".
    #[default]
    AnyMember,
    /// Keep a group only if every member matches. Useful for "entirely
    /// inside this directory" questions.
    AllMembers,
}

/// A filter rejected at construction time.
#[derive(thiserror::Error, Debug)]
#[error("invalid filter pattern '{pattern}': {source}")]
pub struct PatternError {
    /// The offending pattern text
    pub pattern: String,
    #[source]
    source: regex::Error,
}

/// A predicate over file paths.
///
/// Construction validates the pattern, so a held `PathFilter` can always
/// be applied. Matching is done against the path's lossy UTF-8 form;
/// non-UTF-8 path bytes are replaced before matching.
#[derive(Debug, Clone)]
pub enum PathFilter {
    /// Literal substring match
    Substring {
        /// Text to look for in the path
        needle: String,
        /// Ignore ASCII/Unicode case when comparing
        case_insensitive: bool,
    },
    /// Full regular expression match (unanchored)
    Regex(Regex),
}

impl PathFilter {
    /// Build a case-sensitive literal substring filter. Never fails.
    #[must_use]
    pub fn substring(needle: impl Into<String>) -> Self {
        Self::Substring {
            needle: needle.into(),
            case_insensitive: false,
        }
    }

    /// Build a case-insensitive literal substring filter. Never fails.
    #[must_use]
    pub fn substring_ignore_case(needle: impl Into<String>) -> Self {
        Self::Substring {
            needle: needle.into(),
            case_insensitive: true,
        }
    }

    /// Build a regular expression filter.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not compile, so a
    /// bad pattern is reported before any matching happens rather than
    /// silently matching nothing.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        let compiled = Regex::new(pattern).map_err(|source| PatternError {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::Regex(compiled))
    }

    /// Whether a single path matches this filter.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        match self {
            Self::Substring {
                needle,
                case_insensitive: false,
            } => text.contains(needle.as_str()),
            Self::Substring {
                needle,
                case_insensitive: true,
            } => text.to_lowercase().contains(&needle.to_lowercase()),
            Self::Regex(re) => re.is_match(&text),
        }
    }
}

/// Keep the groups that survive the filter under the given mode.
///
/// Surviving groups are kept whole: membership is never trimmed, so a
/// filtered report still shows every copy of a kept duplicate. Relative
/// group order is preserved.
#[must_use]
pub fn filter_groups(
    groups: Vec<DuplicateGroup>,
    filter: &PathFilter,
    mode: FilterMode,
) -> Vec<DuplicateGroup> {
    let before = groups.len();
    let kept: Vec<DuplicateGroup> = groups
        .into_iter()
        .filter(|group| match mode {
            FilterMode::AnyMember => group.members.iter().any(|m| filter.matches(&m.record.path)),
            FilterMode::AllMembers => group.members.iter().all(|m| filter.matches(&m.record.path)),
        })
        .collect();
    log::debug!("Filter kept {} of {} group(s)", kept.len(), before);
    kept
}

/// Keep the paths that match the filter, preserving order.
#[must_use]
pub fn filter_paths<'a>(paths: &[&'a Path], filter: &PathFilter) -> Vec<&'a Path> {
    paths.iter().copied().filter(|p| filter.matches(p)).collect()
}
