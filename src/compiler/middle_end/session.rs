//! Per-run compiler state that outlives any one executor.
//!
//! Generated file names, one-time std file and feature setup flags and the
//! parsed-file caches all live here. [`CompilerSession::reset`] must be called
//! before each independent compilation so output stays deterministic.

use crate::compiler::middle_end::statement::Statement;
use crate::core::constants::FSTRING_PATTERN;
use crate::core::util::path_hash;
use crate::error::{CompilerError, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::rc::Rc;

/// `$name` inside string literals.
const SUBSTITUTION_PATTERN: &str = r"\$([A-Za-z_][A-Za-z0-9_]*)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Nulls,
    Gametest,
    Exploders,
    Uninstall,
}

impl Feature {
    pub const ALL: [Feature; 4] = [Feature::Nulls, Feature::Gametest, Feature::Exploders, Feature::Uninstall];

    pub fn parse(text: &str) -> Option<Feature> {
        match text.to_lowercase().as_str() {
            "nulls" => Some(Feature::Nulls),
            "gametest" => Some(Feature::Gametest),
            "exploders" => Some(Feature::Exploders),
            "uninstall" => Some(Feature::Uninstall),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Nulls => "nulls",
            Feature::Gametest => "gametest",
            Feature::Exploders => "exploders",
            Feature::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_uppercase())
    }
}

#[derive(Debug)]
pub struct CompilerSession {
    generated_names: HashMap<String, usize>,
    std_files: HashSet<String>,
    features: HashSet<Feature>,
    statement_cache: HashMap<String, Rc<[Statement]>>,
    json_cache: HashMap<String, Rc<serde_json::Value>>,
    scatter_count: usize,
    pub(crate) fstring_pattern: Regex,
    pub(crate) substitution_pattern: Regex,
}

impl CompilerSession {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CompilerError::InvalidFormat { message: e.to_string() })
        };
        Ok(Self {
            generated_names: HashMap::new(),
            std_files: HashSet::new(),
            features: HashSet::new(),
            statement_cache: HashMap::new(),
            json_cache: HashMap::new(),
            scatter_count: 0,
            fstring_pattern: compile(FSTRING_PATTERN)?,
            substitution_pattern: compile(SUBSTITUTION_PATTERN)?,
        })
    }

    pub fn reset(&mut self) {
        self.generated_names.clear();
        self.std_files.clear();
        self.features.clear();
        self.statement_cache.clear();
        self.json_cache.clear();
        self.scatter_count = 0;
    }

    /// `friendly0`, `friendly1`, ... counted separately per friendly name.
    pub fn next_generated_name(&mut self, friendly: &str) -> String {
        let counter = self.generated_names.entry(friendly.to_string()).or_insert(0);
        let name = format!("{}{}", friendly, counter);
        *counter += 1;
        name
    }

    /// True the first time `name` is seen in this run.
    pub fn claim_std_file(&mut self, name: &str) -> bool {
        self.std_files.insert(name.to_string())
    }

    /// True when the feature was not enabled before.
    pub fn enable_feature(&mut self, feature: Feature) -> bool {
        self.features.insert(feature)
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn cached_statements(&self, path: &Path) -> Option<Rc<[Statement]>> {
        self.statement_cache.get(&path_hash(path)).cloned()
    }

    /// First read wins; later calls for the same path keep the original.
    pub fn cache_statements(&mut self, path: &Path, statements: Rc<[Statement]>) -> Rc<[Statement]> {
        self.statement_cache.entry(path_hash(path)).or_insert(statements).clone()
    }

    pub fn cached_json(&self, path: &Path) -> Option<Rc<serde_json::Value>> {
        self.json_cache.get(&path_hash(path)).cloned()
    }

    pub fn cache_json(&mut self, path: &Path, json: serde_json::Value) -> Rc<serde_json::Value> {
        self.json_cache.entry(path_hash(path)).or_insert_with(|| Rc::new(json)).clone()
    }

    pub fn next_scatter_index(&mut self) -> usize {
        let index = self.scatter_count;
        self.scatter_count += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_count_per_name() {
        let mut session = CompilerSession::new().unwrap();
        assert_eq!(session.next_generated_name("branch"), "branch0");
        assert_eq!(session.next_generated_name("branch"), "branch1");
        assert_eq!(session.next_generated_name("print"), "print0");
    }

    #[test]
    fn test_reset_restarts_counters() {
        let mut session = CompilerSession::new().unwrap();
        session.next_generated_name("branch");
        assert!(session.claim_std_file("halt_execution"));
        assert!(!session.claim_std_file("halt_execution"));
        session.enable_feature(Feature::Nulls);

        session.reset();
        assert_eq!(session.next_generated_name("branch"), "branch0");
        assert!(session.claim_std_file("halt_execution"));
        assert!(!session.has_feature(Feature::Nulls));
    }

    #[test]
    fn test_json_cache_first_read_wins() {
        let mut session = CompilerSession::new().unwrap();
        let path = Path::new("data.json");
        session.cache_json(path, serde_json::json!(1));
        let cached = session.cache_json(path, serde_json::json!(2));
        assert_eq!(*cached, serde_json::json!(1));
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(Feature::parse("NULLS"), Some(Feature::Nulls));
        assert_eq!(Feature::parse("lasers"), None);
        assert_eq!(Feature::Exploders.to_string(), "EXPLODERS");
    }
}
