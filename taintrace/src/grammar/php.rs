//! PHP grammar: `tree-sitter-php` walked through the shared traversal in
//! [`super::common`].
//!
//! Attribute separators are `->`/`::`; `self_identifier()` is `"this"`;
//! loops additionally include `foreach ... as $v [=> $v2]`. PHP has two
//! spellings of "else if": the single keyword `elseif` (its own grammar
//! node) and the two-word `else if` (an `else_clause` wrapping a nested
//! `if_statement`, like C). Only the two-word form participates in
//! mutually-exclusive chain tagging here — `elseif` still counts toward
//! statement/edge totals as a generic branch keyword, per the original
//! grammar's own asymmetry. `new C()` is its own `object_creation_expression`
//! node rather than an ordinary call, so it is registered via
//! `object_creation_kinds` (its callee sits under a `class` field) to keep
//! constructor calls visible to call extraction and object-name fixup.

use super::common::{self, Lang};
use super::{ChainLink, ControlStructureMatch, DeclarationMatch, Grammar, MethodDefMatch, MutexMatch, ReturnMatch};
use crate::method::{Assignment, CallRecord};
use crate::rule::Identifier;
use compact_str::CompactString;
use std::collections::BTreeMap;
use tree_sitter::{Node, Parser, Tree};

fn classify_else(node: Node) -> ChainLink {
    let mut cursor = node.walk();
    let only_nested_if = node.named_child_count() == 1
        && node
            .named_children(&mut cursor)
            .all(|c| c.kind() == "if_statement");
    if only_nested_if {
        ChainLink::Alternative
    } else {
        ChainLink::AlternativeEnd
    }
}

const LANG: Lang = Lang {
    separators: &["->", "::"],
    self_identifier: "this",
    function_def_kinds: &["function_definition", "method_declaration"],
    call_kinds: &["function_call_expression", "member_call_expression", "scoped_call_expression"],
    member_kinds: &["member_access_expression", "scoped_property_access_expression"],
    assignment_kinds: &["assignment_expression"],
    if_kinds: &["if_statement"],
    elif_kinds: &[],
    else_kinds: &["else_clause"],
    branch_only_kinds: &["else_if_clause"],
    classify_else,
    loop_kinds: &["while_statement", "for_statement", "foreach_statement", "do_statement"],
    return_kinds: &["return_statement"],
    declaration_kinds: &["property_declaration"],
    class_kinds: &["class_declaration"],
    identifier_kinds: &["name", "variable_name"],
    address_of_kinds: &[],
    object_creation_kinds: &["object_creation_expression"],
};

/// Grammar implementation backed by `tree-sitter-php`.
pub struct PhpGrammar {
    tree: Tree,
    source: String,
}

impl PhpGrammar {
    /// Parses `source` with the PHP tree-sitter grammar.
    ///
    /// # Panics
    ///
    /// Panics if the bundled PHP grammar fails to load, which indicates a
    /// version mismatch between `tree-sitter` and `tree-sitter-php`.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
            .expect("tree-sitter-php grammar version mismatch");
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

impl Grammar for PhpGrammar {
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

    fn declarations(&self, start: usize, end: usize) -> Vec<DeclarationMatch> {
        common::declarations(&LANG, &self.tree, &self.source, start, end)
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
    fn finds_class_and_method_definitions() {
        let source = "<?php\nclass C {\n    function sink($x) {\n        echo $x;\n    }\n}\n";
        let grammar = PhpGrammar::parse(source);
        assert!(grammar.class_definitions().contains_key("C"));
        let methods = grammar.method_definitions();
        assert!(methods.iter().any(|m| m.name == "sink"));
    }

    #[test]
    fn object_instantiation_and_member_call() {
        let source = "<?php\n$o = new C();\n$o->sink($_GET['x']);\n";
        let grammar = PhpGrammar::parse(source);
        let calls = grammar.method_calls(0, source.len());
        assert!(calls.iter().any(|c| c.callee.ident == "sink"));
    }
}
