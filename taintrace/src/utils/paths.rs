//! Path utilities: display normalization, exclusion matching, and
//! gitignore-aware multi-language file discovery.

use crate::constants::{C_MODULE, PHP_MODULE, PYTHON_MODULE, default_exclude_folders};

/// Normalizes a path for CLI display.
///
/// - Converts backslashes to forward slashes (for cross-platform consistency)
/// - Strips leading "./" or ".\" prefix (for cleaner output)
///
/// # Examples
/// ```
/// use std::path::Path;
/// use taintrace::utils::normalize_display_path;
///
/// assert_eq!(normalize_display_path(Path::new("./src/main.c")), "src/main.c");
/// ```
#[must_use]
pub fn normalize_display_path(path: &std::path::Path) -> String {
    let s = path.to_string_lossy();
    let clean = s.trim_start_matches(r"\\?\");
    let normalized = clean.replace('\\', "/");
    normalized
        .strip_prefix("./")
        .unwrap_or(&normalized)
        .to_owned()
}

/// Checks if a name matches any exclusion pattern.
///
/// Tries, in order: an exact match, a `*suffix` wildcard, then the pattern as
/// a whole-name regex (so `^test_.*\.py$`-style patterns work). An exclude
/// string that is neither an exact name nor a valid regex never matches.
#[must_use]
pub fn is_excluded(name: &str, excludes: &[String]) -> bool {
    for exclude in excludes {
        if let Some(suffix) = exclude.strip_prefix('*') {
            if name.ends_with(suffix) {
                return true;
            }
            continue;
        }
        if name == exclude {
            return true;
        }
        if let Ok(re) = regex::Regex::new(&format!("^(?:{exclude})$")) {
            if re.is_match(name) {
                return true;
            }
        }
    }
    false
}

/// Maps a file extension to the language module that owns it.
#[must_use]
pub fn module_for_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "c" | "h" => Some(C_MODULE),
        "php" | "php3" | "php4" | "php5" | "phtml" => Some(PHP_MODULE),
        "py" | "pyw" => Some(PYTHON_MODULE),
        _ => None,
    }
}

/// Maps a module name (as given to `--fallback`) to its canonical static
/// form, or `None` if it names no known language.
#[must_use]
fn canonical_module(name: &str) -> Option<&'static str> {
    match name {
        C_MODULE => Some(C_MODULE),
        PHP_MODULE => Some(PHP_MODULE),
        PYTHON_MODULE => Some(PYTHON_MODULE),
        _ => None,
    }
}

/// Walks `root`, respecting `.gitignore`/excludes, and returns every file
/// whose extension maps to a known language module (or, failing that, to
/// `fallback` if one is given), paired with that module.
///
/// Directories matching `exclude` (merged with the crate's defaults, minus
/// any name present in `include`) are skipped entirely during traversal.
/// The walk itself is sequential (its exclude-filtering closure holds
/// shared state); module detection over the resulting candidate paths runs
/// in parallel via `rayon`, since that step is a pure, independent
/// per-path lookup.
#[must_use]
pub fn collect_source_files(
    root: &std::path::Path,
    exclude: &[String],
    include: &[String],
    fallback: Option<&str>,
) -> Vec<(std::path::PathBuf, &'static str)> {
    use ignore::WalkBuilder;
    use rayon::prelude::*;

    let default_excludes: Vec<String> = default_exclude_folders()
        .iter()
        .map(|&s| s.to_owned())
        .collect();
    let mut all_excludes: Vec<String> = exclude.iter().cloned().chain(default_excludes).collect();
    all_excludes.retain(|ex| !include.iter().any(|inc| ex == inc));

    let fallback_module = fallback.and_then(canonical_module);
    let excludes_for_filter = all_excludes.clone();
    let root_for_filter = root.to_path_buf();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(move |entry| {
            if entry.path() == root_for_filter {
                return true;
            }
            if !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_excluded(name, &excludes_for_filter) {
                    return false;
                }
            }
            true
        })
        .build();

    let candidates: Vec<std::path::PathBuf> = walker
        .filter_map(std::result::Result::ok)
        .filter(|entry| !entry.file_type().is_some_and(|ft| ft.is_dir()))
        .map(|entry| entry.path().to_path_buf())
        .collect();

    candidates
        .into_par_iter()
        .filter_map(|path| {
            let detected = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(module_for_extension)
                .or(fallback_module);
            detected.map(|module| (path, module))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn normalizes_display_paths() {
        assert_eq!(
            normalize_display_path(std::path::Path::new("./src/main.c")),
            "src/main.c"
        );
    }

    #[test]
    fn wildcard_exclusion_matches_suffix() {
        let excludes = vec!["*.min.js".to_owned()];
        assert!(is_excluded("bundle.min.js", &excludes));
        assert!(!is_excluded("bundle.js", &excludes));
    }

    #[test]
    fn regex_exclusion_matches_whole_name_only() {
        let excludes = vec![r"test_.*\.py".to_owned()];
        assert!(is_excluded("test_foo.py", &excludes));
        assert!(!is_excluded("not_test_foo.py", &excludes));
    }

    #[test]
    fn plain_exclusion_does_not_overmatch_as_substring() {
        let excludes = vec!["vendor".to_owned()];
        assert!(is_excluded("vendor", &excludes));
        assert!(!is_excluded("vendor_extra", &excludes));
    }

    #[test]
    fn collects_files_by_extension_and_skips_excluded_dirs() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        fs::write(root.join("main.c"), "int main(void) { return 0; }")?;
        fs::write(root.join("app.py"), "print('hi')")?;
        fs::create_dir_all(root.join("vendor"))?;
        fs::write(root.join("vendor/skip.php"), "<?php echo 1; ?>")?;
        fs::write(root.join("notes.txt"), "not source")?;

        let found = collect_source_files(root, &[], &[], None);
        let names: Vec<_> = found
            .iter()
            .filter_map(|(p, _)| p.file_name())
            .filter_map(|n| n.to_str())
            .collect();

        assert!(names.contains(&"main.c"));
        assert!(names.contains(&"app.py"));
        assert!(!names.contains(&"skip.php"));
        assert!(!names.contains(&"notes.txt"));
        Ok(())
    }

    #[test]
    fn fallback_module_claims_unrecognized_extensions() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let root = temp.path();
        fs::write(root.join("script.inc"), "<?php echo 1; ?>")?;

        let without_fallback = collect_source_files(root, &[], &[], None);
        assert!(without_fallback.is_empty());

        let with_fallback = collect_source_files(root, &[], &[], Some("php"));
        assert_eq!(with_fallback.len(), 1);
        assert_eq!(with_fallback[0].1, "php");
        Ok(())
    }
}
