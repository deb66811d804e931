//! Keyed storage for rule source text.
//!
//! The evaluator never touches storage; it only needs rule text to compile.
//! [`RuleSourceStore`] is the seam, with an in-memory store for tests and
//! embedding, and a directory store keeping one YAML file per rule.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleParseError};
use crate::parser::{is_rule_file, parse_rule_yaml};

/// The stored text of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSource {
    pub id: String,
    pub title: String,
    /// YAML rule document.
    pub source: String,
}

impl RuleSource {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        RuleSource {
            id: id.into(),
            title: title.into(),
            source: source.into(),
        }
    }
}

/// A keyed document store for rule sources.
pub trait RuleSourceStore: Send + Sync {
    /// Insert or replace the rule with `rule.id`.
    fn save(&self, rule: RuleSource) -> Result<RuleSource>;

    /// Load one rule; [`RuleParseError::NotFound`] if the id is unknown.
    fn load(&self, id: &str) -> Result<RuleSource>;

    /// Load every rule, ordered by id. Unreadable entries are logged and
    /// skipped.
    fn load_all(&self) -> Vec<RuleSource>;

    /// Remove a rule. Returns `Ok(false)` if there was nothing to remove.
    fn delete(&self, id: &str) -> Result<bool>;
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(RuleParseError::InvalidRule(format!("invalid rule id '{id}'")));
    }
    Ok(())
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: RwLock<HashMap<String, RuleSource>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleSourceStore for MemoryRuleStore {
    fn save(&self, rule: RuleSource) -> Result<RuleSource> {
        validate_id(&rule.id)?;
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    fn load(&self, id: &str) -> Result<RuleSource> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules
            .get(id)
            .cloned()
            .ok_or_else(|| RuleParseError::NotFound(id.to_string()))
    }

    fn load_all(&self) -> Vec<RuleSource> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<RuleSource> = rules.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if rules.remove(id).is_none() {
            log::error!("Unable to delete rule {id}");
            return Ok(false);
        }
        Ok(true)
    }
}

// =============================================================================
// Directory store
// =============================================================================

/// Stores each rule as `<root>/<id>.yml`. The title is read back from the
/// document's `title:` key.
#[derive(Debug, Clone)]
pub struct DirectoryRuleStore {
    root: PathBuf,
}

impl DirectoryRuleStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(DirectoryRuleStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.yml"))
    }

    fn read(&self, id: &str, path: &Path) -> Result<RuleSource> {
        let source = std::fs::read_to_string(path)?;
        let title = parse_rule_yaml(&source)
            .ok()
            .and_then(|c| c.rules.into_iter().next())
            .map(|r| r.title)
            .unwrap_or_else(|| id.to_string());
        Ok(RuleSource {
            id: id.to_string(),
            title,
            source,
        })
    }
}

impl RuleSourceStore for DirectoryRuleStore {
    fn save(&self, rule: RuleSource) -> Result<RuleSource> {
        validate_id(&rule.id)?;
        std::fs::write(self.path_for(&rule.id), &rule.source)?;
        Ok(rule)
    }

    fn load(&self, id: &str) -> Result<RuleSource> {
        validate_id(id)?;
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(RuleParseError::NotFound(id.to_string()));
        }
        self.read(id, &path)
    }

    fn load_all(&self) -> Vec<RuleSource> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Unable to load processing rules from {}: {e}", self.root.display());
                return Vec::new();
            }
        };

        let mut all = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_rule_file(&path) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read(id, &path) {
                Ok(rule) => all.push(rule),
                Err(e) => log::error!("Unable to load rule {}: {e}", path.display()),
            }
        }
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn delete(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::error!("Unable to delete rule {id}");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULE: &str = "title: Tag Year\nthen:\n  - call: drop_message\n";

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryRuleStore::new();
        store
            .save(RuleSource::new("b", "Second", RULE))
            .unwrap();
        store.save(RuleSource::new("a", "First", RULE)).unwrap();

        assert_eq!(store.load("a").unwrap().title, "First");
        let ids: Vec<_> = store.load_all().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_memory_store_not_found() {
        let store = MemoryRuleStore::new();
        assert!(matches!(
            store.load("missing"),
            Err(RuleParseError::NotFound(id)) if id == "missing"
        ));
        assert!(!store.delete("missing").unwrap());
    }

    #[test]
    fn test_memory_store_rejects_bad_id() {
        let store = MemoryRuleStore::new();
        assert!(store.save(RuleSource::new("", "t", RULE)).is_err());
        assert!(store.save(RuleSource::new("../x", "t", RULE)).is_err());
    }

    #[test]
    fn test_directory_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryRuleStore::open(dir.path().join("rules")).unwrap();

        store.save(RuleSource::new("year", "ignored", RULE)).unwrap();
        let loaded = store.load("year").unwrap();
        assert_eq!(loaded.title, "Tag Year");
        assert_eq!(loaded.source, RULE);

        assert_eq!(store.load_all().len(), 1);
        assert!(store.delete("year").unwrap());
        assert!(!store.delete("year").unwrap());
        assert!(matches!(
            store.load("year"),
            Err(RuleParseError::NotFound(_))
        ));
    }
}
