//! Holds a language's mutable source/sink/sanitizer lists and notifies
//! registered observers when a promoted rule is appended.

use crate::error::{Error, Result};
use crate::method::Method;
use crate::rule::{RawRuleDef, Sanitizer, Sink, Source};
use std::path::{Path, PathBuf};

/// Receives notification whenever `Ruleset` appends a new rule, possibly
/// triggering re-analysis of already-processed methods.
pub trait Observer {
    /// Called after a source, sink, or sanitizer is newly appended.
    ///
    /// `changed_sanitizer` is `true` when a sanitizer was added to an
    /// existing sink; `new_source` is `true` when a brand-new source rule
    /// was added. Both are `false` for a newly promoted sink.
    fn update(&mut self, method: &Method, changed_sanitizer: bool, new_source: bool);
}

/// A language's rule collection, loaded once from `modules/<lang>` and
/// grown during analysis by inter-procedural promotion.
pub struct Ruleset {
    module: String,
    /// Loaded and promoted sources.
    pub sources: Vec<Source>,
    /// Loaded and promoted sinks.
    pub sinks: Vec<Sink>,
    observers: Vec<Box<dyn Observer>>,
}

impl Ruleset {
    /// Loads every rule file under `modules_root/<module>/{sources,sinks}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] if a `.yml`/`.yaml` file fails to parse.
    pub fn load(modules_root: &Path, module: &str) -> Result<Self> {
        let sources = load_rule_dir(&modules_root.join(module).join("sources"))?
            .iter()
            .map(Source::from_raw)
            .collect();
        let sink_defs = load_rule_dir(&modules_root.join(module).join("sinks"))?;
        let sinks = sink_defs.iter().map(Sink::from_raw).collect();

        Ok(Self {
            module: module.to_owned(),
            sources,
            sinks,
            observers: Vec::new(),
        })
    }

    /// The language module this ruleset was loaded for.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Adds a newly promoted source, no-op if a rule with the same identity
    /// already exists. Notifies observers with `new_source = true` on insert.
    pub fn add_source(&mut self, method: &Method, candidate: Source) {
        let candidate_key = candidate.key();
        let duplicate = self.sources.iter().any(|s| s.key() == candidate_key);
        if duplicate {
            return;
        }
        tracing::debug!(method = %method.method_name, "added a new source, notifying observers");
        self.sources.push(candidate);
        self.notify_observers(method, false, true);
    }

    /// Adds a newly promoted sink, carrying over no sanitizers (the promoted
    /// sink is empty; sanitizers are discovered afresh against it). No-op if
    /// a rule with the same identity already exists.
    pub fn add_sink(&mut self, method: &Method, candidate: Sink) {
        let candidate_key = candidate.key();
        let duplicate = self.sinks.iter().any(|s| s.key() == candidate_key);
        if duplicate {
            return;
        }
        tracing::debug!(method = %method.method_name, "added a new sink, notifying observers");
        self.sinks.push(candidate);
        self.notify_observers(method, false, false);
    }

    /// Adds a newly promoted sanitizer to `sink.methods[method_idx]`'s
    /// sanitizer list, no-op if an equivalent one is already present.
    /// Notifies observers with `changed_sanitizer = true` on insert.
    pub fn add_sanitizer(
        &mut self,
        method: &Method,
        sink_key: &crate::rule::RuleKey,
        method_idx: usize,
        candidate: Sanitizer,
    ) {
        let Some(sink) = self.sinks.iter_mut().find(|s| &s.key() == sink_key) else {
            return;
        };
        let Some(list) = sink.sanitizers.get_mut(method_idx) else {
            return;
        };
        let candidate_key = candidate.key();
        if list.iter().any(|s| s.key() == candidate_key) {
            return;
        }
        list.push(candidate);
        tracing::debug!(method = %method.method_name, "added a new sanitizer, notifying observers");
        self.notify_observers(method, true, false);
    }

    /// Registers a new observer. Observers are notified in FIFO registration
    /// order.
    pub fn register_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    fn notify_observers(&mut self, method: &Method, changed_sanitizer: bool, new_source: bool) {
        for observer in &mut self.observers {
            observer.update(method, changed_sanitizer, new_source);
        }
    }
}

fn load_rule_dir(dir: &Path) -> Result<Vec<RawRuleDef>> {
    let mut defs = Vec::new();
    if !dir.exists() {
        return Ok(defs);
    }
    let mut files = Vec::new();
    collect_rule_files(dir, &mut files)?;
    files.sort();

    for path in files {
        let content = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        let def: RawRuleDef = serde_yaml::from_str(&content).map_err(|e| Error::InvalidRule {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loaded rule file");
        defs.push(def);
    }
    Ok(defs)
}

fn collect_rule_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_rule_files(&path, out)?;
            continue;
        }
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| crate::constants::RULE_FILE_EXTENSIONS.contains(&ext))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_rule(dir: &Path, name: &str, yaml: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), yaml).unwrap();
    }

    #[test]
    fn load_reads_sources_and_sinks() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_rule(
            &root.join("c/sources"),
            "scanf.yml",
            "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: stdin read.\n",
        );
        write_rule(
            &root.join("c/sinks"),
            "printf.yml",
            "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n",
        );

        let ruleset = Ruleset::load(root, "c").unwrap();
        assert_eq!(ruleset.sources.len(), 1);
        assert_eq!(ruleset.sinks.len(), 1);
    }

    #[test]
    fn load_rejects_malformed_rule_file() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write_rule(&root.join("c/sinks"), "broken.yml", "not: [valid, yaml: }");

        let err = Ruleset::load(root, "c").unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn add_source_is_idempotent() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let mut ruleset = Ruleset::load(root, "c").unwrap();
        let method = Method::new(0, 10, "f");
        let raw: RawRuleDef = serde_yaml::from_str(
            "null:\n  Methods:\n    - Methodname: f\n      Parameters: [\"$TAINT\"]\n      Comment: promoted.\n",
        )
        .unwrap();
        let source = Source::from_raw(&raw);
        ruleset.add_source(&method, source.clone());
        ruleset.add_source(&method, source);
        assert_eq!(ruleset.sources.len(), 1);
    }
}
