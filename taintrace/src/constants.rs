//! Crate-wide constants: default excludes, module names, rule file layout.

use std::sync::OnceLock;

/// Folder names skipped during file discovery regardless of user config.
pub fn default_exclude_folders() -> &'static [&'static str] {
    static FOLDERS: OnceLock<Vec<&'static str>> = OnceLock::new();
    FOLDERS
        .get_or_init(|| {
            vec![
                ".git",
                ".hg",
                ".svn",
                "node_modules",
                "target",
                "vendor",
                "__pycache__",
                ".venv",
                "venv",
                "dist",
                "build",
            ]
        })
        .as_slice()
}

/// Rule file extensions recognized under `modules/<lang>/{sources,sinks}`.
pub const RULE_FILE_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// C language module name, matching the `modules/c` directory.
pub const C_MODULE: &str = "c";
/// PHP language module name, matching the `modules/php` directory.
pub const PHP_MODULE: &str = "php";
/// Python language module name, matching the `modules/python` directory.
pub const PYTHON_MODULE: &str = "python";

/// Name assigned to the pseudo-method holding module-level globals.
pub const GLOBALS_METHOD_NAME: &str = "__globals";

/// Rule-file sentinel marking a parameter position that must carry tainted data.
pub const TAINT_SENTINEL: &str = "$TAINT";

/// Name of the filetype-detection data file under the rules directory.
pub const DETECTION_FILE_NAME: &str = "detection.txt";

/// Default rules root, relative to the process's working directory, mirroring
/// the original `modules/` layout.
pub const DEFAULT_MODULES_ROOT: &str = "modules";
