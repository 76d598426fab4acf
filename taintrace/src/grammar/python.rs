//! Python grammar: `tree-sitter-python` walked through the shared
//! traversal in [`super::common`].
//!
//! Attribute separator is `.` only; suites are indentation-delimited rather
//! than brace-delimited (tree-sitter already normalizes that into a `block`
//! node, so no special handling is needed here); mutually-exclusive chains
//! are built from `elif_clause`/`else_clause`; `self_identifier()` is
//! `"self"`, and a leading `self` parameter is skipped.

use super::common::{self, Lang};
use super::{ChainLink, ControlStructureMatch, DeclarationMatch, Grammar, MethodDefMatch, MutexMatch, ReturnMatch};
use crate::method::{Assignment, CallRecord};
use crate::rule::Identifier;
use compact_str::CompactString;
use std::collections::BTreeMap;
use tree_sitter::{Parser, Tree};

fn classify_else(_node: tree_sitter::Node) -> ChainLink {
    ChainLink::AlternativeEnd
}

const LANG: Lang = Lang {
    separators: &["."],
    self_identifier: "self",
    function_def_kinds: &["function_definition"],
    call_kinds: &["call"],
    member_kinds: &["attribute"],
    assignment_kinds: &["assignment"],
    if_kinds: &["if_statement"],
    elif_kinds: &["elif_clause"],
    else_kinds: &["else_clause"],
    branch_only_kinds: &[],
    classify_else,
    loop_kinds: &["while_statement", "for_statement"],
    return_kinds: &["return_statement"],
    declaration_kinds: &[],
    class_kinds: &["class_definition"],
    identifier_kinds: &["identifier"],
    address_of_kinds: &[],
    object_creation_kinds: &[],
};

/// Grammar implementation backed by `tree-sitter-python`.
pub struct PythonGrammar {
    tree: Tree,
    source: String,
}

impl PythonGrammar {
    /// Parses `source` with the Python tree-sitter grammar.
    ///
    /// # Panics
    ///
    /// Panics if the bundled Python grammar fails to load, which indicates a
    /// version mismatch between `tree-sitter` and `tree-sitter-python`.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("tree-sitter-python grammar version mismatch");
        let tree = parser.parse(source, None).unwrap_or_else(|| {
            parser
                .parse("", None)
                .expect("parsing empty source never fails")
        });
        Self {
            tree,
            source: source.to_owned(),
        }
    }
}

impl Grammar for PythonGrammar {
    fn class_definitions(&self) -> BTreeMap<CompactString, usize> {
        common::class_definitions(&LANG, &self.tree, &self.source)
    }

    fn self_identifier(&self) -> &str {
        LANG.self_identifier
    }

    fn statement_count(&self, start: usize, end: usize) -> usize {
        common::statement_count(&LANG, &self.tree, start, end)
    }

    fn edge_count(&self, start: usize, end: usize) -> usize {
        common::edge_count(&LANG, &self.tree, start, end)
    }

    fn mutually_exclusive_positions(&self, start: usize, end: usize) -> Vec<MutexMatch> {
        common::mutually_exclusive_positions(&LANG, &self.tree, start, end)
    }

    fn method_definitions(&self) -> Vec<MethodDefMatch> {
        common::method_definitions(&LANG, &self.tree, &self.source)
    }

    fn method_calls(&self, start: usize, end: usize) -> Vec<CallRecord> {
        common::method_calls(&LANG, &self.tree, &self.source, start, end)
    }

    fn assignments(&self, start: usize, end: usize) -> Vec<(Identifier, Assignment)> {
        common::assignments(&LANG, &self.tree, &self.source, start, end)
    }

    fn control_structures(&self, start: usize, end: usize) -> Vec<ControlStructureMatch> {
        common::control_structures(&LANG, &self.tree, start, end)
    }

    fn returns(&self, start: usize, end: usize) -> Vec<ReturnMatch> {
        common::returns(&LANG, &self.tree, &self.source, start, end)
    }

    fn declarations(&self, _start: usize, _end: usize) -> Vec<DeclarationMatch> {
        Vec::new()
    }

    fn parameters(&self, start: usize, end: usize) -> Vec<(CompactString, Option<CompactString>)> {
        common::parameters(&LANG, &self.tree, &self.source, start, end)
    }

    fn global_variables(&self) -> Vec<DeclarationMatch> {
        common::global_variables(&LANG, &self.tree, &self.source)
    }

    fn source(&self) -> &str {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_method_definitions() {
        let grammar = PythonGrammar::parse("def f(x):\n    return x\n");
        let methods = grammar.method_definitions();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "f");
    }

    #[test]
    fn skips_leading_self_parameter() {
        let grammar = PythonGrammar::parse("class C:\n    def m(self, x):\n        pass\n");
        let methods = grammar.method_definitions();
        let body = methods
            .iter()
            .find(|m| m.name == "m")
            .expect("method m found")
            .body
            .clone();
        let params = grammar.parameters(body.start, body.end);
        assert!(!params.iter().any(|(name, _)| name == "self"));
        assert!(params.iter().any(|(name, _)| name == "x"));
    }

    #[test]
    fn counts_if_elif_else_as_mutually_exclusive_chain() {
        let source = "def f(c):\n    if c:\n        pass\n    elif c:\n        pass\n    else:\n        pass\n";
        let grammar = PythonGrammar::parse(source);
        let methods = grammar.method_definitions();
        let body = &methods[0].body;
        let chain = grammar.mutually_exclusive_positions(body.start, body.end);
        assert_eq!(chain.len(), 3);
    }
}
