//! Plaintext and JSON report generation over completed analyses, grounded
//! in the severity/visibility rules of the original report format: a
//! method is reported when its complexity reaches the threshold or it has
//! taints/sinks; a sink already surfaced as a taint is not printed twice.

use crate::method::{Method, Taint};
use crate::rule::RuleKey;
use crate::ruleset::Ruleset;
use crate::utils::LineIndex;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// One analyzed file paired with the grammar-agnostic state a report reads.
pub struct FileReport<'a> {
    /// Path to the analyzed file, used as the report's per-file heading.
    pub path: &'a Path,
    /// Detected language module (`"c"`, `"php"`, `"python"`).
    pub module: &'a str,
    /// Methods discovered in the file, `__globals` included.
    pub methods: &'a [Method],
    /// The ruleset methods were matched against, consulted for a sanitizer's
    /// indirection level.
    pub ruleset: &'a Ruleset,
    /// Line index over the file's source, for line-number reporting.
    pub lines: &'a LineIndex,
}

fn sanitizer_level(ruleset: &Ruleset, key: &RuleKey) -> Option<u32> {
    ruleset
        .sinks
        .iter()
        .flat_map(|s| s.sanitizers.iter().flatten())
        .find(|s| &s.key() == key)
        .map(|s| s.level)
}

/// Severity percentage for one taint: 100% if unsanitized or the sanitizer
/// lies beyond `indirection` levels away, otherwise scaled down to as low
/// as 50% for a sanitizer right at the sink.
fn severity_percent(taint: &Taint, ruleset: &Ruleset, indirection: usize) -> u32 {
    let Some(key) = &taint.sanitizer else {
        return 100;
    };
    let Some(level) = sanitizer_level(ruleset, key) else {
        return 100;
    };
    if level as usize > indirection {
        return 100;
    }
    let ratio = (f64::from(level) / indirection.max(1) as f64).min(1.0);
    (50.0 + ratio * 50.0).round() as u32
}

fn needs_reporting(method: &Method, complexity: usize) -> bool {
    let complex = method.complexity >= 0 && method.complexity as usize >= complexity;
    complex || !method.taints.is_empty() || !method.sinks.is_empty()
}

/// Writes a human-readable plaintext report across every file in `files`.
///
/// # Errors
///
/// Returns an error if writing to `writer` fails.
pub fn write_plaintext(writer: &mut impl Write, files: &[FileReport], complexity: usize, indirection: usize) -> io::Result<()> {
    writeln!(writer, "taintrace report")?;
    for file in files {
        writeln!(writer)?;
        writeln!(writer, "Start of analysis for {}:", file.path.display())?;
        writeln!(writer, "The filetype was detected as {}.", file.module)?;

        let mut any_reported = false;
        for method in file.methods.iter().filter(|m| m.method_name != crate::constants::GLOBALS_METHOD_NAME) {
            if !needs_reporting(method, complexity) {
                continue;
            }
            any_reported = true;
            writeln!(
                writer,
                "\nAnalysis results for method \"{}\" (lines {} to {}).",
                method.method_name,
                file.lines.column_to_line(method.start),
                file.lines.column_to_line(method.end)
            )?;
            if method.complexity as usize >= complexity {
                writeln!(writer, "Method has a cyclomatic complexity of {}.", method.complexity)?;
            }

            let mut taint_positions: Vec<crate::method::Position> = Vec::new();
            if !method.taints.is_empty() {
                writeln!(writer, "The following taints were detected:")?;
                for taints in method.taints.values() {
                    for taint in taints {
                        taint_positions.push(taint.position.clone());
                        let line = file.lines.column_to_line(taint.position.start);
                        writeln!(writer, "- In line {line} a call with potentially user controlled input is made to {}.", taint.call.callee.ident)?;
                        writeln!(writer, "  The following comment is linked to this sink: {}", taint.comment)?;
                        match &taint.sanitizer {
                            Some(key) => {
                                let level = sanitizer_level(file.ruleset, key).unwrap_or(0);
                                writeln!(writer, "  The taint seems to be sanitized (indirection level: {level}).")?;
                            }
                            None => writeln!(writer, "  No sanitizer detected.")?,
                        }
                        writeln!(writer, "  Severity level: {}%.", severity_percent(taint, file.ruleset, indirection))?;
                    }
                }
            }

            let unreported_sinks: Vec<_> = method
                .sinks
                .values()
                .flatten()
                .filter(|call| !taint_positions.contains(&call.position))
                .collect();
            if !unreported_sinks.is_empty() {
                writeln!(writer, "The following sinks were detected:")?;
                for call in unreported_sinks {
                    let line = file.lines.column_to_line(call.position.start);
                    writeln!(writer, "- In line {line} a call without any detected user controlled input is made to {}.", call.callee.ident)?;
                    writeln!(writer, "  Severity level: 50%.")?;
                }
            }
        }
        if !any_reported {
            writeln!(writer, "Congratulations, nothing to report for this file.")?;
        }
    }
    writeln!(writer, "\nDon't forget that these results are not necessarily complete and could be missing vulnerabilities. Additional security checks are highly recommended!")?;
    Ok(())
}

#[derive(Serialize)]
struct JsonTaint {
    method: String,
    line: usize,
    call: String,
    comment: String,
    sanitizer_level: Option<u32>,
    severity_percent: u32,
}

#[derive(Serialize)]
struct JsonSink {
    method: String,
    line: usize,
    call: String,
}

#[derive(Serialize)]
struct JsonMethod {
    name: String,
    start_line: usize,
    end_line: usize,
    complexity: i64,
    taints: Vec<JsonTaint>,
    sinks: Vec<JsonSink>,
}

#[derive(Serialize)]
struct JsonFile {
    path: String,
    module: String,
    methods: Vec<JsonMethod>,
}

/// Builds the JSON report value for `files`, structurally equivalent to the
/// plaintext report but machine-readable.
#[must_use]
pub fn to_json(files: &[FileReport], complexity: usize, indirection: usize) -> serde_json::Value {
    let mut out = Vec::new();
    for file in files {
        let mut methods = Vec::new();
        for method in file.methods.iter().filter(|m| m.method_name != crate::constants::GLOBALS_METHOD_NAME) {
            if !needs_reporting(method, complexity) {
                continue;
            }
            let mut taint_positions: Vec<crate::method::Position> = Vec::new();
            let mut taints = Vec::new();
            for taint_list in method.taints.values() {
                for taint in taint_list {
                    taint_positions.push(taint.position.clone());
                    taints.push(JsonTaint {
                        method: method.method_name.to_string(),
                        line: file.lines.column_to_line(taint.position.start),
                        call: taint.call.callee.ident.to_string(),
                        comment: taint.comment.clone(),
                        sanitizer_level: taint.sanitizer.as_ref().and_then(|k| sanitizer_level(file.ruleset, k)),
                        severity_percent: severity_percent(taint, file.ruleset, indirection),
                    });
                }
            }
            let sinks = method
                .sinks
                .values()
                .flatten()
                .filter(|call| !taint_positions.contains(&call.position))
                .map(|call| JsonSink {
                    method: method.method_name.to_string(),
                    line: file.lines.column_to_line(call.position.start),
                    call: call.callee.ident.to_string(),
                })
                .collect();
            methods.push(JsonMethod {
                name: method.method_name.to_string(),
                start_line: file.lines.column_to_line(method.start),
                end_line: file.lines.column_to_line(method.end),
                complexity: method.complexity,
                taints,
                sinks,
            });
        }
        out.push(JsonFile {
            path: file.path.display().to_string(),
            module: file.module.to_owned(),
            methods,
        });
    }
    serde_json::json!({ "files": out })
}
