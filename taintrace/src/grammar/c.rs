//! C grammar: `tree-sitter-c` walked through the shared traversal in
//! [`super::common`].
//!
//! Attribute separators are `.`/`->`; control keywords additionally include
//! `case`, `default`, `while`, `for`, `goto`. C has no `elif` keyword: an
//! `else if` is an `else_clause` whose only child is a nested `if_statement`,
//! so [`classify_else`] inspects the clause's body to tell a chain
//! continuation from a closing `else`.

use super::common::{self, Lang};
use super::{ChainLink, ControlStructureMatch, DeclarationMatch, Grammar, MethodDefMatch, MutexMatch, ReturnMatch};
use crate::method::{Assignment, CallRecord};
use crate::rule::Identifier;
use compact_str::CompactString;
use tree_sitter::{Node, Parser, Tree};

fn classify_else(node: Node) -> ChainLink {
    let mut cursor = node.walk();
    let only_nested_if = node
        .named_children(&mut cursor)
        .all(|c| c.kind() == "if_statement")
        && node.named_child_count() == 1;
    if only_nested_if {
        ChainLink::Alternative
    } else {
        ChainLink::AlternativeEnd
    }
}

const LANG: Lang = Lang {
    separators: &[".", "->"],
    self_identifier: "",
    function_def_kinds: &["function_definition"],
    call_kinds: &["call_expression"],
    member_kinds: &["field_expression"],
    assignment_kinds: &["assignment_expression"],
    if_kinds: &["if_statement"],
    elif_kinds: &[],
    else_kinds: &["else_clause"],
    branch_only_kinds: &["case_statement", "goto_statement"],
    classify_else,
    loop_kinds: &["while_statement", "for_statement", "do_statement"],
    return_kinds: &["return_statement"],
    declaration_kinds: &["declaration"],
    class_kinds: &["struct_specifier"],
    identifier_kinds: &["identifier"],
    address_of_kinds: &["pointer_expression"],
    object_creation_kinds: &[],
};

/// Grammar implementation backed by `tree-sitter-c`.
pub struct CGrammar {
    tree: Tree,
    source: String,
}

impl CGrammar {
    /// Parses `source` with the C tree-sitter grammar.
    ///
    /// # Panics
    ///
    /// Panics if the bundled C grammar fails to load, which indicates a
    /// version mismatch between `tree-sitter` and `tree-sitter-c`.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .expect("tree-sitter-c grammar version mismatch");
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

impl Grammar for CGrammar {
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
    fn finds_method_definitions() {
        let grammar = CGrammar::parse("int f(int x) {\n    return x;\n}\n");
        let methods = grammar.method_definitions();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "f");
    }

    #[test]
    fn else_if_chain_continues_not_closes() {
        let source = "int f(int c) {\n    if (c) {\n        return 1;\n    } else if (c) {\n        return 2;\n    } else {\n        return 3;\n    }\n}\n";
        let grammar = CGrammar::parse(source);
        let body = grammar.method_definitions()[0].body.clone();
        let chain = grammar.mutually_exclusive_positions(body.start, body.end);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].kind, super::super::ChainLink::If);
        assert_eq!(chain[1].kind, super::super::ChainLink::Alternative);
        assert_eq!(chain[2].kind, super::super::ChainLink::AlternativeEnd);
    }

    #[test]
    fn scanf_then_printf_call_sites() {
        let source = "int main(void) {\n    char buf[256];\n    scanf(\"%s\", &buf);\n    printf(buf);\n    return 0;\n}\n";
        let grammar = CGrammar::parse(source);
        let body = grammar.method_definitions()[0].body.clone();
        let calls = grammar.method_calls(body.start, body.end);
        let names: Vec<_> = calls.iter().map(|c| c.callee.ident.as_str()).collect();
        assert!(names.contains(&"scanf"));
        assert!(names.contains(&"printf"));
    }
}
