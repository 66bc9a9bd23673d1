//! Previously recorded issues that should stay out of the report until fixed.
//!
//! A baseline is a JSON snapshot of issues. Every live report is matched
//! against it with [`BaselineStore::find_and_mark`]; a match consumes the
//! entry (and every location linked to it) so the same report is never
//! filtered twice. What is left unmatched at the end of a run has been fixed.

use crate::models::{Category, Issue, Location, Severity};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub const BASELINE_FORMAT: u32 = 1;

/// Message prefixes older tools put in front of some messages.
const LEGACY_PREFIXES: [&str; 2] = ["[I18N] ", "[Accessibility] "];

/// How deep message rewrites may chain before matching gives up.
pub const MAX_RULE_DEPTH: usize = 4;

/// Current version of the built-in message rules.
pub const RULES_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("failed to access baseline {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid baseline {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported baseline format {found} in {}", path.display())]
    UnsupportedFormat { path: PathBuf, found: u32 },
}

/// Compares `path` against a path suffix recorded in a baseline or config
/// file. Separators are normalized; leading `./` and `/` on the suffix are
/// ignored. Only whole path segments match.
pub fn is_same_path_suffix(path: &str, suffix: &str) -> bool {
    let path = path.replace('\\', "/");
    let path = path.trim_start_matches("./");
    let suffix = suffix.replace('\\', "/");
    let suffix = suffix.trim_start_matches("./").trim_start_matches('/');
    if suffix.is_empty() {
        return false;
    }
    path == suffix || path.ends_with(&format!("/{}", suffix))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    /// The two messages describe the same finding.
    Same,
    /// Compare these rewritten messages instead.
    Rewrite(String, String),
    NoOpinion,
}

/// One message equivalence rule. Messages change wording between releases;
/// rules keep old baselines matching.
pub trait MessageRule {
    fn name(&self) -> &'static str;

    /// First rules version the rule belongs to.
    fn since_version(&self) -> u32 {
        1
    }

    fn compare(&self, issue_id: &str, old: &str, new: &str) -> RuleVerdict;
}

struct ExactMatch;

impl MessageRule for ExactMatch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn compare(&self, _issue_id: &str, old: &str, new: &str) -> RuleVerdict {
        if old == new {
            RuleVerdict::Same
        } else {
            RuleVerdict::NoOpinion
        }
    }
}

/// Ignores backticks and accepts a message that is a whole-word tail of the other.
struct BacktickSuffix;

impl MessageRule for BacktickSuffix {
    fn name(&self) -> &'static str {
        "backtick-suffix"
    }

    fn compare(&self, _issue_id: &str, old: &str, new: &str) -> RuleVerdict {
        let old = old.replace('`', "");
        let new = new.replace('`', "");
        if old == new || is_word_suffix(&old, &new) || is_word_suffix(&new, &old) {
            RuleVerdict::Same
        } else {
            RuleVerdict::NoOpinion
        }
    }
}

fn is_word_suffix(text: &str, suffix: &str) -> bool {
    let suffix = suffix.trim();
    if suffix.is_empty() || !text.ends_with(suffix) {
        return false;
    }
    text[..text.len() - suffix.len()]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric())
}

/// Drops trailing sentence punctuation and compares again.
struct TrailingPunctuation;

impl MessageRule for TrailingPunctuation {
    fn name(&self) -> &'static str {
        "trailing-punctuation"
    }

    fn since_version(&self) -> u32 {
        2
    }

    fn compare(&self, _issue_id: &str, old: &str, new: &str) -> RuleVerdict {
        let trim = |s: &str| s.trim_end_matches(['.', '!', ' ']).to_string();
        let (old_trimmed, new_trimmed) = (trim(old), trim(new));
        if old_trimmed == old && new_trimmed == new {
            RuleVerdict::NoOpinion
        } else {
            RuleVerdict::Rewrite(old_trimmed, new_trimmed)
        }
    }
}

/// Ordered, versioned table of [`MessageRule`]s.
pub struct MessageRules {
    version: u32,
    rules: Vec<Box<dyn MessageRule>>,
}

impl MessageRules {
    pub fn builtin() -> Self {
        Self {
            version: RULES_VERSION,
            rules: vec![
                Box::new(ExactMatch),
                Box::new(BacktickSuffix),
                Box::new(TrailingPunctuation),
            ],
        }
    }

    /// Pins the table to an older rules version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_rule(mut self, rule: Box<dyn MessageRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn same_message(&self, issue_id: &str, old: &str, new: &str) -> bool {
        self.evaluate(issue_id, old, new, 0)
    }

    fn evaluate(&self, issue_id: &str, old: &str, new: &str, depth: usize) -> bool {
        if old == new {
            return true;
        }
        if depth >= MAX_RULE_DEPTH {
            return false;
        }
        for rule in self.rules.iter().filter(|r| r.since_version() <= self.version) {
            match rule.compare(issue_id, old, new) {
                RuleVerdict::Same => {
                    debug!(rule = rule.name(), issue = issue_id, "Baseline message rule matched");
                    return true;
                }
                RuleVerdict::Rewrite(old, new) => {
                    if self.evaluate(issue_id, &old, &new, depth + 1) {
                        return true;
                    }
                }
                RuleVerdict::NoOpinion => {}
            }
        }
        false
    }
}

impl Default for MessageRules {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<String>,
    #[serde(default)]
    issues: Vec<SnapshotIssue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotIssue {
    id: String,
    message: String,
    #[serde(default)]
    locations: Vec<SnapshotLocation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotLocation {
    file: String,
    #[serde(default)]
    line: usize,
}

/// One recorded location of a baseline issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineEntry {
    pub issue_id: String,
    pub message: String,
    pub path: String,
    pub line: usize,
    chain: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaselineSummary {
    pub found_errors: usize,
    pub found_warnings: usize,
    pub fixed: usize,
    pub total: usize,
}

impl BaselineSummary {
    pub fn found(&self) -> usize {
        self.found_errors + self.found_warnings
    }
}

/// A report remembered for writing the next baseline.
#[derive(Debug, Clone)]
struct ReportedEntry {
    category: Arc<Category>,
    priority: u8,
    issue_id: String,
    location: Location,
    message: String,
}

impl ReportedEntry {
    fn secondary_file(&self) -> Option<&str> {
        self.location.secondary.as_deref().map(|l| l.file.as_str())
    }
}

impl Ord for ReportedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.issue_id.cmp(&other.issue_id))
            .then_with(|| self.location.file_name().cmp(other.location.file_name()))
            .then_with(|| self.location.line.cmp(&other.location.line))
            .then_with(|| self.message.cmp(&other.message))
            .then_with(|| self.location.file.cmp(&other.location.file))
            .then_with(|| self.secondary_file().cmp(&other.secondary_file()))
            .then_with(|| self.location.column.cmp(&other.location.column))
    }
}

impl PartialOrd for ReportedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ReportedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReportedEntry {}

pub struct BaselineStore {
    path: PathBuf,
    entries: Vec<BaselineEntry>,
    /// Entry indices by message.
    by_message: HashMap<String, Vec<usize>>,
    /// Distinct recorded messages per issue id, in file order.
    messages_by_id: HashMap<String, Vec<String>>,
    /// Entry indices per chain; an emptied chain has been matched.
    chains: Vec<Vec<usize>>,
    consumed: Vec<bool>,
    found_errors: usize,
    found_warnings: usize,
    rules: MessageRules,
    write_on_close: bool,
    remove_fixed: bool,
    reported: Vec<ReportedEntry>,
}

impl BaselineStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            by_message: HashMap::new(),
            messages_by_id: HashMap::new(),
            chains: Vec::new(),
            consumed: Vec::new(),
            found_errors: 0,
            found_warnings: 0,
            rules: MessageRules::builtin(),
            write_on_close: false,
            remove_fixed: false,
            reported: Vec::new(),
        }
    }

    /// Reads a baseline; a missing or broken file is logged and yields an
    /// empty baseline.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No baseline file yet");
            return Self::empty(path);
        }
        match Self::read(path) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable baseline");
                Self::empty(path)
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self, BaselineError> {
        let content = fs::read_to_string(path).map_err(|source| BaselineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| BaselineError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if snapshot.format != BASELINE_FORMAT {
            return Err(BaselineError::UnsupportedFormat {
                path: path.to_path_buf(),
                found: snapshot.format,
            });
        }

        let mut store = Self::empty(path);
        for issue in snapshot.issues {
            let locations: Vec<(String, usize)> = issue
                .locations
                .into_iter()
                .map(|l| (l.file, l.line))
                .collect();
            store.add_chain(&issue.id, &issue.message, &locations);
        }
        debug!(path = %path.display(), issues = store.chains.len(), "Loaded baseline");
        Ok(store)
    }

    pub fn with_rules(mut self, rules: MessageRules) -> Self {
        self.rules = rules;
        self
    }

    /// Writes a fresh baseline on [`BaselineStore::close`]. With
    /// `remove_fixed` only reports that matched an entry are kept.
    pub fn write_on_close(mut self, remove_fixed: bool) -> Self {
        self.write_on_close = true;
        self.remove_fixed = remove_fixed;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writing(&self) -> bool {
        self.write_on_close
    }

    pub fn removes_fixed(&self) -> bool {
        self.remove_fixed
    }

    pub fn entries(&self) -> &[BaselineEntry] {
        &self.entries
    }

    /// Records one baseline issue; its locations are linked and get matched together.
    pub fn add_chain(&mut self, issue_id: &str, message: &str, locations: &[(String, usize)]) {
        let message = strip_legacy_prefix(message);
        let chain = self.chains.len();
        let mut members = Vec::with_capacity(locations.len());

        for (path, line) in locations {
            let index = self.entries.len();
            self.entries.push(BaselineEntry {
                issue_id: issue_id.to_string(),
                message: message.to_string(),
                path: path.clone(),
                line: *line,
                chain,
            });
            self.consumed.push(false);
            self.by_message
                .entry(message.to_string())
                .or_default()
                .push(index);
            members.push(index);
        }

        let messages = self.messages_by_id.entry(issue_id.to_string()).or_default();
        if !messages.iter().any(|m| m == message) {
            messages.push(message.to_string());
        }
        self.chains.push(members);
    }

    /// Returns `true` when the report is covered by the baseline; the matched
    /// entry and every location linked to it are consumed.
    pub fn find_and_mark(
        &mut self,
        issue: &Issue,
        location: &Location,
        message: &str,
        severity: Severity,
    ) -> bool {
        let found = self.find(&issue.id, location, message);
        if let Some(index) = found {
            self.consume_chain(self.entries[index].chain);
            if severity.is_error() {
                self.found_errors += 1;
            } else {
                self.found_warnings += 1;
            }
        }

        if self.write_on_close && (!self.remove_fixed || found.is_some()) {
            self.reported.push(ReportedEntry {
                category: Arc::clone(&issue.category),
                priority: issue.priority,
                issue_id: issue.id.clone(),
                location: location.clone(),
                message: message.to_string(),
            });
        }

        found.is_some()
    }

    fn find(&self, issue_id: &str, location: &Location, message: &str) -> Option<usize> {
        if let Some(index) = self.find_with_message(issue_id, location, message) {
            return Some(index);
        }
        let recorded = self.messages_by_id.get(issue_id)?;
        recorded
            .iter()
            .filter(|old| old.as_str() != message)
            .filter(|old| self.rules.same_message(issue_id, old, message))
            .find_map(|old| self.find_with_message(issue_id, location, old))
    }

    fn find_with_message(&self, issue_id: &str, location: &Location, message: &str) -> Option<usize> {
        self.by_message.get(message)?.iter().copied().find(|&index| {
            let entry = &self.entries[index];
            !self.consumed[index]
                && entry.issue_id.eq_ignore_ascii_case(issue_id)
                && location
                    .chain()
                    .any(|l| is_same_path_suffix(&l.file, &entry.path))
        })
    }

    fn consume_chain(&mut self, chain: usize) {
        for index in std::mem::take(&mut self.chains[chain]) {
            self.consumed[index] = true;
        }
    }

    fn is_chain_matched(&self, chain: usize) -> bool {
        self.chains[chain].is_empty()
    }

    pub fn summary(&self) -> BaselineSummary {
        let total = self.chains.len();
        let found_errors = self.found_errors;
        let found_warnings = self.found_warnings;
        BaselineSummary {
            found_errors,
            found_warnings,
            fixed: total.saturating_sub(found_errors + found_warnings),
            total,
        }
    }

    /// Issue ids with entries nothing matched, with their counts, sorted by id.
    pub fn unmatched_by_issue(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (chain, members) in self.chains.iter().enumerate() {
            if self.is_chain_matched(chain) {
                continue;
            }
            if let Some(&first) = members.first() {
                *counts.entry(self.entries[first].issue_id.as_str()).or_insert(0) += 1;
            }
        }
        let mut unmatched: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(id, count)| (id.to_string(), count))
            .collect();
        unmatched.sort();
        unmatched
    }

    /// Writes the new baseline when write mode is on.
    pub fn close(&mut self) -> Result<(), BaselineError> {
        if !self.write_on_close {
            return Ok(());
        }
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot).map_err(|source| BaselineError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| BaselineError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, json).map_err(|source| BaselineError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), issues = snapshot.issues.len(), "Wrote baseline");
        Ok(())
    }

    fn snapshot(&mut self) -> Snapshot {
        self.reported.sort();
        Snapshot {
            format: BASELINE_FORMAT,
            tool: Some(format!("ferret {}", env!("CARGO_PKG_VERSION"))),
            issues: self
                .reported
                .iter()
                .map(|entry| SnapshotIssue {
                    id: entry.issue_id.clone(),
                    message: entry.message.clone(),
                    locations: entry
                        .location
                        .chain()
                        .map(|l| SnapshotLocation {
                            file: l.file.clone(),
                            line: l.line,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn strip_legacy_prefix(message: &str) -> &str {
    LEGACY_PREFIXES
        .iter()
        .find_map(|prefix| message.strip_prefix(prefix))
        .unwrap_or(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::Categories;
    use crate::models::scope::RESOURCE_FILE_SCOPE;
    use crate::models::Implementation;
    use tempfile::tempdir;

    fn issue(id: &str) -> Issue {
        Issue::new(
            id,
            id,
            "",
            &Categories::standard().performance,
            3,
            Severity::Warning,
            Implementation::new("resources", RESOURCE_FILE_SCOPE),
        )
    }

    fn entry(file: &str, line: usize) -> (String, usize) {
        (file.to_string(), line)
    }

    #[test]
    fn test_path_suffix_matching() {
        assert!(is_same_path_suffix("app/res/values/strings.xml", "res/values/strings.xml"));
        assert!(is_same_path_suffix("app\\res\\values\\strings.xml", "./res/values/strings.xml"));
        assert!(is_same_path_suffix("res/values/strings.xml", "/res/values/strings.xml"));
        assert!(is_same_path_suffix("src/A.sol", ".\\src\\A.sol"));
        assert!(!is_same_path_suffix("app/myres/values/strings.xml", "res/values/strings.xml"));
        assert!(!is_same_path_suffix("src/A.sol", ""));
    }

    #[test]
    fn test_unused_resource_is_filtered_once() {
        let mut baseline = BaselineStore::empty("baseline.json");
        baseline.add_chain(
            "UnusedResource",
            "R.string.unused is unused",
            &[entry("res/values/strings.xml", 12)],
        );
        let unused = issue("UnusedResource");
        let location = Location::new("app/res/values/strings.xml", 12);

        assert!(baseline.find_and_mark(&unused, &location, "R.string.unused is unused", Severity::Warning));
        let summary = baseline.summary();
        assert_eq!(summary.found_warnings, 1);
        assert_eq!(summary.found_errors, 0);
        assert_eq!(summary.fixed, 0);

        // consumed
        assert!(!baseline.find_and_mark(&unused, &location, "R.string.unused is unused", Severity::Warning));
        assert_eq!(baseline.summary().found_warnings, 1);
    }

    #[test]
    fn test_fixed_count_law() {
        let mut baseline = BaselineStore::empty("baseline.json");
        baseline.add_chain("A", "first", &[entry("a.xml", 1)]);
        baseline.add_chain("A", "second", &[entry("a.xml", 2)]);
        baseline.add_chain("B", "third", &[entry("b.xml", 3)]);

        let untouched = baseline.summary();
        assert_eq!(untouched.fixed, untouched.total);
        assert_eq!(untouched.total, 3);

        baseline.find_and_mark(&issue("A"), &Location::new("a.xml", 9), "second", Severity::Error);
        let summary = baseline.summary();
        assert_eq!(summary.found_errors, 1);
        assert_eq!(summary.fixed, summary.total - summary.found_errors - summary.found_warnings);
        assert_eq!(
            baseline.unmatched_by_issue(),
            vec![("A".to_string(), 1), ("B".to_string(), 1)]
        );
    }

    #[test]
    fn test_chain_is_consumed_as_a_whole() {
        let mut baseline = BaselineStore::empty("baseline.json");
        baseline.add_chain("Dup", "duplicate", &[entry("a.xml", 1), entry("b.xml", 4)]);
        let dup = issue("Dup");

        assert!(baseline.find_and_mark(&dup, &Location::new("x/b.xml", 4), "duplicate", Severity::Warning));
        assert!(!baseline.find_and_mark(&dup, &Location::new("x/a.xml", 1), "duplicate", Severity::Warning));
        assert_eq!(baseline.summary().fixed, 0);
    }

    #[test]
    fn test_message_rules() {
        let rules = MessageRules::builtin();
        assert!(rules.same_message("X", "Use `foo` instead", "Use foo instead"));
        assert!(rules.same_message("X", "contract A: value is unused", "value is unused"));
        assert!(!rules.same_message("X", "value is unused", "value is used"));
        assert!(!rules.same_message("X", "overused", "used"));
        assert!(rules.same_message("X", "Value is `unused`.", "Value is unused"));
        assert!(!rules.same_message("X", "Something else", "Entirely different"));

        let pinned = MessageRules::builtin().with_version(1);
        assert!(!pinned.same_message("X", "Value is unused.", "Value is unused"));
    }

    #[test]
    fn test_reworded_message_matches_through_rules() {
        let mut baseline = BaselineStore::empty("baseline.json");
        baseline.add_chain("A", "Function `foo` is never used", &[entry("A.sol", 3)]);
        assert!(baseline.find_and_mark(
            &issue("A"),
            &Location::new("src/A.sol", 5),
            "Function foo is never used.",
            Severity::Warning,
        ));
    }

    #[test]
    fn test_load_is_fail_open_and_strips_legacy_prefixes() {
        let dir = tempdir().expect("tempdir");
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").expect("write");
        assert!(BaselineStore::load(&broken).entries().is_empty());

        let old_format = dir.path().join("old.json");
        fs::write(&old_format, r#"{"format": 7, "issues": []}"#).expect("write");
        assert!(matches!(
            BaselineStore::read(&old_format),
            Err(BaselineError::UnsupportedFormat { found: 7, .. })
        ));

        let good = dir.path().join("baseline.json");
        fs::write(
            &good,
            r#"{"format": 1, "issues": [
                {"id": "Text", "message": "[I18N] Hardcoded string", "locations": [{"file": "res/a.xml", "line": 2}]}
            ]}"#,
        )
        .expect("write");
        let store = BaselineStore::load(&good);
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].message, "Hardcoded string");

        let missing = BaselineStore::load(&dir.path().join("missing.json"));
        assert_eq!(missing.summary().total, 0);
    }

    #[test]
    fn test_write_mode_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out").join("baseline.json");

        let mut store = BaselineStore::empty(&path).write_on_close(false);
        store.find_and_mark(&issue("B"), &Location::new("b.xml", 2), "second", Severity::Warning);
        store.find_and_mark(&issue("A"), &Location::new("a.xml", 1), "first", Severity::Warning);
        store.close().expect("write baseline");

        let reloaded = BaselineStore::read(&path).expect("read baseline");
        let ids: Vec<&str> = reloaded.entries().iter().map(|e| e.issue_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_remove_fixed_keeps_only_matched_reports() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("baseline.json");

        let mut store = BaselineStore::empty(&path).write_on_close(true);
        store.add_chain("A", "old", &[entry("a.xml", 1)]);
        store.add_chain("Gone", "fixed meanwhile", &[entry("g.xml", 1)]);
        store.find_and_mark(&issue("A"), &Location::new("a.xml", 1), "old", Severity::Warning);
        store.find_and_mark(&issue("New"), &Location::new("n.xml", 1), "new", Severity::Warning);
        store.close().expect("write baseline");

        let reloaded = BaselineStore::read(&path).expect("read baseline");
        assert_eq!(reloaded.entries().len(), 1);
        assert_eq!(reloaded.entries()[0].issue_id, "A");
    }
}
