//! Layered configuration: a `.taintrace.toml`, discovered by walking up from
//! the scanned root, supplies defaults for any flag the CLI didn't set.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration file shape.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    /// The `[taintrace]` table.
    pub taintrace: TaintraceConfig,
}

/// Engine and report configuration, all fields optional so that CLI flags
/// can take precedence over whatever (if anything) is present on disk.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TaintraceConfig {
    /// Language module to assume when filetype detection is ambiguous.
    pub fallback: Option<String>,
    /// Collapse path enumeration to a single segment per method.
    pub lazy: Option<bool>,
    /// Cyclomatic complexity threshold used to flag methods in the report.
    pub complexity: Option<usize>,
    /// Indirection-level threshold used to flag sanitized taints in the report.
    pub indirection: Option<usize>,
    /// Additional regex exclude patterns merged with the default set.
    pub exclude: Option<Vec<String>>,
    /// Suppress non-error output.
    pub silent: Option<bool>,
    /// Emit debug-level detail.
    pub verbose: Option<bool>,
}

impl Config {
    /// Loads configuration starting from the current directory.
    #[must_use]
    pub fn load() -> Self {
        Self::load_from_path(Path::new("."))
    }

    /// Loads `.taintrace.toml`, walking up from `path` until one is found or
    /// the filesystem root is reached. Falls back to an all-`None` default.
    #[must_use]
    pub fn load_from_path(path: &Path) -> Self {
        let mut current = path.to_path_buf();
        if current.is_file() {
            current.pop();
        }

        loop {
            let candidate = current.join(".taintrace.toml");
            if candidate.exists() {
                if let Ok(content) = fs::read_to_string(&candidate) {
                    if let Ok(config) = toml::from_str::<Config>(&content) {
                        return config;
                    }
                    tracing::warn!(path = %candidate.display(), "malformed .taintrace.toml, ignoring");
                }
            }

            if !current.pop() {
                break;
            }
        }

        Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_falls_back_to_default() {
        let temp = tempdir().unwrap();
        let config = Config::load_from_path(temp.path());
        assert!(config.taintrace.fallback.is_none());
    }

    #[test]
    fn loads_nested_table_from_file() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(".taintrace.toml"),
            "[taintrace]\nlazy = true\ncomplexity = 12\n",
        )
        .unwrap();

        let config = Config::load_from_path(temp.path());
        assert_eq!(config.taintrace.lazy, Some(true));
        assert_eq!(config.taintrace.complexity, Some(12));
    }

    #[test]
    fn walks_up_to_find_config_in_ancestor() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join(".taintrace.toml"),
            "[taintrace]\nfallback = \"python\"\n",
        )
        .unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::load_from_path(&nested);
        assert_eq!(config.taintrace.fallback.as_deref(), Some("python"));
    }
}
