//! Core library for `taintrace`, a static taint-analysis engine for C, PHP,
//! and Python source.
//!
//! [`grammar`] exposes the language-agnostic query surface a tree-sitter
//! grammar answers; [`ruleset`] and [`rule`] hold the loaded source/sink/
//! sanitizer definitions; [`analysis`] is the control-flow and data-flow
//! engine that matches rules against a file's methods and reports taints;
//! [`report`] renders the result.

#![allow(clippy::type_complexity, clippy::too_many_arguments, clippy::similar_names)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Typed error hierarchy for rule loading, file discovery, and grammar construction.
pub mod error;

/// Crate-wide constants: default excludes, module names, rule file layout.
pub mod constants;

/// Shared utilities: line/column mapping and path helpers.
pub mod utils;

/// Layered configuration (`.taintrace.toml` plus CLI overrides).
pub mod config;

/// The rule model: sources, sinks, sanitizers, loaded from YAML rule files.
pub mod rule;

/// Per-function record of discovered artifacts: calls, variables, matched
/// rules, taints, enumerated paths, and complexity.
pub mod method;

/// The language-agnostic query surface tree-sitter-backed grammars answer.
pub mod grammar;

/// A language's mutable source/sink/sanitizer lists, grown by promotion.
pub mod ruleset;

/// The analysis engine: per-method control-flow and data-flow reasoning.
pub mod analysis;

/// Plaintext and JSON report generation over completed analyses.
pub mod report;
