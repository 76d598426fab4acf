//! Shared tree-sitter traversal shared by the three concrete grammars.
//!
//! Each language's node-kind names differ, but the traversal shape
//! (walk every node in a byte window, dispatch on a small kind table) is
//! identical. A [`Lang`] describes the kind names for one language; the
//! functions here do the walking.

use crate::method::{Assignment, CallRecord, Expr, Position};
use crate::rule::Identifier;
use crate::utils::LineIndex;
use compact_str::CompactString;
use std::collections::BTreeMap;
use tree_sitter::{Node, Tree};

use super::{ChainLink, ControlStructureMatch, DeclarationMatch, MethodDefMatch, MutexMatch, ReturnMatch};

/// Node-kind names for one language's tree-sitter grammar.
pub struct Lang {
    /// Attribute/member-access separators in textual order of preference
    /// (used only for display; matching is structural on the parsed tree).
    pub separators: &'static [&'static str],
    /// `self`/`this`, or empty.
    pub self_identifier: &'static str,
    /// Node kinds that represent a function/method definition.
    pub function_def_kinds: &'static [&'static str],
    /// Node kinds that represent a call expression.
    pub call_kinds: &'static [&'static str],
    /// Node kinds that represent a member-access expression (`a.b`, `a->b`, `a::b`).
    pub member_kinds: &'static [&'static str],
    /// Node kinds that represent an assignment.
    pub assignment_kinds: &'static [&'static str],
    /// Node kinds that represent an `if` statement (opens a mutex chain).
    pub if_kinds: &'static [&'static str],
    /// Node kinds for a dedicated `elif`-like continuation clause that is
    /// unambiguously part of a mutually-exclusive chain (Python's
    /// `elif_clause`).
    pub elif_kinds: &'static [&'static str],
    /// Node kinds for an `else`-like clause whose role (continuing the chain
    /// vs. closing it) depends on whether it wraps a nested `if` — resolved
    /// by `classify_else`.
    pub else_kinds: &'static [&'static str],
    /// Node kinds that are branch keywords contributing to statement/edge
    /// counts but that never participate in mutex-chain tagging (PHP's
    /// single-keyword `elseif`, which counts generically but is excluded
    /// from the `else if` two-word chain per the original grammar).
    pub branch_only_kinds: &'static [&'static str],
    /// Decides whether an `else_kinds` node continues a chain (it wraps a
    /// single nested `if`) or closes it.
    pub classify_else: fn(Node) -> ChainLink,
    /// Node kinds for loop constructs.
    pub loop_kinds: &'static [&'static str],
    /// Node kinds for a return statement.
    pub return_kinds: &'static [&'static str],
    /// Node kinds for a bare declaration (no assignment).
    pub declaration_kinds: &'static [&'static str],
    /// Node kinds for a class/struct definition.
    pub class_kinds: &'static [&'static str],
    /// Node kinds for an identifier/name leaf.
    pub identifier_kinds: &'static [&'static str],
    /// Node kinds for an address-of expression (C's `&x`), whose `argument`
    /// field is unwrapped so `&buf` is treated as a reference to `buf`
    /// rather than an opaque literal. Empty for languages with no such
    /// operator.
    pub address_of_kinds: &'static [&'static str],
    /// Node kinds for a constructor-call expression whose callee sits under
    /// a `class` field rather than `function`/`name` (PHP's `new C()`, a
    /// dedicated `object_creation_expression` node rather than an ordinary
    /// call). Treated as a call everywhere a call is recognized. Empty for
    /// languages whose instantiation syntax already is an ordinary call
    /// (Python's `C()`).
    pub object_creation_kinds: &'static [&'static str],
}

fn kind_is(node: Node, kinds: &[&str]) -> bool {
    kinds.contains(&node.kind())
}

fn is_call_kind(lang: &Lang, node: Node) -> bool {
    kind_is(node, lang.call_kinds) || kind_is(node, lang.object_creation_kinds)
}

/// Walks the whole tree, counting statement-bearing nodes and
/// mutually-exclusive blocks within `[start, end)`.
pub fn statement_count(lang: &Lang, tree: &Tree, start: usize, end: usize) -> usize {
    let mutex = mutually_exclusive_positions(lang, tree, start, end).len();
    let mut branch_only = 0;
    let mut count = 0;
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if node.is_named() && node.kind().ends_with("statement") {
            count += 1;
        }
        if kind_is(node, lang.branch_only_kinds) {
            branch_only += 1;
        }
    });
    count + mutex + branch_only
}

/// `3*loops + 2*mutually_exclusive + statements`.
pub fn edge_count(lang: &Lang, tree: &Tree, start: usize, end: usize) -> usize {
    let statements = statement_count(lang, tree, start, end);
    let mutex = mutually_exclusive_positions(lang, tree, start, end).len();
    let loops = control_structures(lang, tree, start, end)
        .iter()
        .filter(|c| c.is_loop)
        .count();
    3 * loops + 2 * mutex + statements
}

/// Visits every node in `[start, end)`, shallow-first, calling `f` on each.
fn walk_in_range<'a>(node: Node<'a>, start: usize, end: usize, f: &mut impl FnMut(Node<'a>)) {
    if node.end_byte() <= start || node.start_byte() >= end {
        return;
    }
    if node.start_byte() >= start && node.end_byte() <= end {
        f(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_in_range(child, start, end, f);
    }
}

/// Collects mutually-exclusive if/elif/else chains in `[start, end)`.
pub fn mutually_exclusive_positions(
    lang: &Lang,
    tree: &Tree,
    start: usize,
    end: usize,
) -> Vec<MutexMatch> {
    let mut matches = Vec::new();
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if kind_is(node, lang.if_kinds) {
            matches.push(MutexMatch {
                kind: ChainLink::If,
                position: node.start_byte()..node.end_byte(),
            });
        } else if kind_is(node, lang.elif_kinds) {
            matches.push(MutexMatch {
                kind: ChainLink::Alternative,
                position: node.start_byte()..node.end_byte(),
            });
        } else if kind_is(node, lang.else_kinds) {
            matches.push(MutexMatch {
                kind: (lang.classify_else)(node),
                position: node.start_byte()..node.end_byte(),
            });
        }
    });
    matches.sort_by_key(|m| m.position.start);
    matches
}

/// Collects every function/method definition in the file.
pub fn method_definitions(lang: &Lang, tree: &Tree, source: &str) -> Vec<MethodDefMatch> {
    let mut matches = Vec::new();
    visit_all(tree.root_node(), &mut |node| {
        if kind_is(node, lang.function_def_kinds) {
            if let Some(name) = function_name(lang, node, source) {
                let body = node
                    .child_by_field_name("body")
                    .map_or(node.start_byte()..node.end_byte(), |b| {
                        b.start_byte()..b.end_byte()
                    });
                matches.push(MethodDefMatch { name, body });
            }
        }
    });
    matches
}

fn visit_all<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_all(child, f);
    }
}

fn function_name(lang: &Lang, node: Node, source: &str) -> Option<CompactString> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return Some(text_of(name_node, source).into());
    }
    // C wraps the name inside a `declarator` chain; walk to the innermost identifier.
    if let Some(declarator) = node.child_by_field_name("declarator") {
        let mut cur = declarator;
        loop {
            if kind_is(cur, lang.identifier_kinds) {
                return Some(text_of(cur, source).into());
            }
            match cur.child_by_field_name("declarator") {
                Some(next) => cur = next,
                None => break,
            }
        }
    }
    None
}

/// Collects every call expression in `[start, end)`.
pub fn method_calls(lang: &Lang, tree: &Tree, source: &str, start: usize, end: usize) -> Vec<CallRecord> {
    let mut calls = Vec::new();
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if is_call_kind(lang, node) {
            if let Some(call) = build_call(lang, node, source) {
                calls.push(call);
            }
        }
    });
    calls
}

fn build_call(lang: &Lang, node: Node, source: &str) -> Option<CallRecord> {
    let callee_node = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("name"))
        .or_else(|| node.child_by_field_name("class"))?;
    let callee = identifier_from_node(lang, callee_node, source);
    let args = node
        .child_by_field_name("arguments")
        .map(|args_node| {
            let mut out = Vec::new();
            let mut cursor = args_node.walk();
            for child in args_node.named_children(&mut cursor) {
                out.push(expr_from_node(lang, child, source));
            }
            out
        })
        .unwrap_or_default();
    Some(CallRecord {
        callee,
        args,
        position: node.start_byte()..node.end_byte(),
    })
}

/// Flattens a member-access chain (`a.b.c`, `a->b`, `a::b`) into an
/// `Identifier { object_name: ["a","b"], ident: "c" }`. A plain name becomes
/// `Identifier { object_name: [], ident: name }`.
pub fn identifier_from_node(lang: &Lang, node: Node, source: &str) -> Identifier {
    let mut parts = Vec::new();
    collect_dotted(lang, node, source, &mut parts);
    match parts.split_last() {
        Some((last, rest)) => Identifier {
            object_name: rest.to_vec(),
            ident: last.clone(),
        },
        None => Identifier::bare(text_of(node, source)),
    }
}

fn collect_dotted(lang: &Lang, node: Node, source: &str, out: &mut Vec<CompactString>) {
    if kind_is(node, lang.member_kinds) {
        if let Some(object) = node
            .child_by_field_name("object")
            .or_else(|| node.child_by_field_name("argument"))
        {
            collect_dotted(lang, object, source, out);
        }
        if let Some(field) = node
            .child_by_field_name("attribute")
            .or_else(|| node.child_by_field_name("field"))
            .or_else(|| node.child_by_field_name("name"))
        {
            out.push(text_of(field, source).into());
        }
        return;
    }
    out.push(text_of(node, source).into());
}

fn expr_from_node(lang: &Lang, node: Node, source: &str) -> Expr {
    if kind_is(node, lang.address_of_kinds) {
        if let Some(argument) = node.child_by_field_name("argument") {
            return expr_from_node(lang, argument, source);
        }
    }
    if is_call_kind(lang, node) {
        if let Some(call) = build_call(lang, node, source) {
            return Expr::Call(Box::new(call));
        }
    }
    if kind_is(node, lang.member_kinds) || kind_is(node, lang.identifier_kinds) {
        return Expr::Var(identifier_from_node(lang, node, source));
    }
    Expr::Literal(text_of(node, source).into())
}

fn text_of<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or_default()
}

/// Collects every assignment statement in `[start, end)`.
pub fn assignments(
    lang: &Lang,
    tree: &Tree,
    source: &str,
    start: usize,
    end: usize,
) -> Vec<(Identifier, Assignment)> {
    let mut out = Vec::new();
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if kind_is(node, lang.assignment_kinds) {
            let lvalue = node
                .child_by_field_name("left")
                .or_else(|| node.child_by_field_name("name"));
            let rvalue = node
                .child_by_field_name("right")
                .or_else(|| node.child_by_field_name("value"));
            if let Some(lvalue) = lvalue {
                let ident = identifier_from_node(lang, lvalue, source);
                let value = rvalue
                    .map(|r| expr_from_node(lang, r, source))
                    .unwrap_or_else(|| Expr::Literal(CompactString::new("")));
                out.push((
                    ident,
                    Assignment {
                        value,
                        position: node.start_byte()..node.end_byte(),
                    },
                ));
            }
        }
    });
    out
}

/// Collects every control structure (loop or branch keyword) in `[start, end)`.
pub fn control_structures(
    lang: &Lang,
    tree: &Tree,
    start: usize,
    end: usize,
) -> Vec<ControlStructureMatch> {
    let mut out = Vec::new();
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if kind_is(node, lang.loop_kinds) {
            out.push(ControlStructureMatch {
                is_loop: true,
                position: node.start_byte()..node.end_byte(),
            });
        } else if kind_is(node, lang.if_kinds)
            || kind_is(node, lang.elif_kinds)
            || kind_is(node, lang.else_kinds)
            || kind_is(node, lang.branch_only_kinds)
        {
            out.push(ControlStructureMatch {
                is_loop: false,
                position: node.start_byte()..node.end_byte(),
            });
        }
    });
    out
}

/// Collects every return statement in `[start, end)`.
pub fn returns(lang: &Lang, tree: &Tree, source: &str, start: usize, end: usize) -> Vec<ReturnMatch> {
    let mut out = Vec::new();
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if kind_is(node, lang.return_kinds) {
            let mut cursor = node.walk();
            let value = node
                .named_children(&mut cursor)
                .next()
                .map(|v| expr_from_node(lang, v, source));
            out.push(ReturnMatch {
                value,
                position: node.start_byte()..node.end_byte(),
            });
        }
    });
    out
}

/// Collects bare declarations (no initializer) in `[start, end)`.
pub fn declarations(
    lang: &Lang,
    tree: &Tree,
    source: &str,
    start: usize,
    end: usize,
) -> Vec<DeclarationMatch> {
    let mut out = Vec::new();
    walk_in_range(tree.root_node(), start, end, &mut |node| {
        if kind_is(node, lang.declaration_kinds) {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                out.push(DeclarationMatch {
                    ident: identifier_from_node(lang, declarator, source),
                    position: node.start_byte()..node.end_byte(),
                });
            }
        }
    });
    out
}

/// Collects class/struct definitions as a name-to-start-offset map.
pub fn class_definitions(lang: &Lang, tree: &Tree, source: &str) -> BTreeMap<CompactString, usize> {
    let mut out = BTreeMap::new();
    walk_in_range(tree.root_node(), 0, tree.root_node().end_byte(), &mut |node| {
        if kind_is(node, lang.class_kinds) {
            if let Some(name) = node.child_by_field_name("name") {
                out.insert(text_of(name, source).into(), node.start_byte());
            }
        }
    });
    out
}

/// Byte offsets covered by every method body, used to compute the
/// complement for `global_variables`.
pub fn method_spans(lang: &Lang, tree: &Tree, source: &str) -> Vec<Position> {
    method_definitions(lang, tree, source)
        .into_iter()
        .map(|m| m.body)
        .collect()
}

/// Declarations/assignments outside every method body.
pub fn global_variables(
    lang: &Lang,
    tree: &Tree,
    source: &str,
) -> Vec<DeclarationMatch> {
    let spans = method_spans(lang, tree, source);
    let end = tree.root_node().end_byte();
    let in_method = |offset: usize| spans.iter().any(|s| s.contains(&offset));

    let mut out = Vec::new();
    for decl in declarations(lang, tree, source, 0, end) {
        if !in_method(decl.position.start) {
            out.push(decl);
        }
    }
    for (ident, assignment) in assignments(lang, tree, source, 0, end) {
        if !in_method(assignment.position.start) {
            out.push(DeclarationMatch {
                ident,
                position: assignment.position,
            });
        }
    }
    out.sort_by_key(|d| d.position.start);
    out
}

/// Parameters of the method whose body is `[start, end)`, in declaration
/// order: walks up from the body to the enclosing definition's parameter
/// list.
pub fn parameters(
    lang: &Lang,
    tree: &Tree,
    source: &str,
    start: usize,
    _end: usize,
) -> Vec<(CompactString, Option<CompactString>)> {
    let mut result = Vec::new();
    let Some(def_node) = find_enclosing_function(lang, tree.root_node(), start) else {
        return result;
    };
    let Some(params_node) = def_node.child_by_field_name("parameters") else {
        return result;
    };
    let mut cursor = params_node.walk();
    let mut first = true;
    for param in params_node.named_children(&mut cursor) {
        let name_node = param
            .child_by_field_name("name")
            .or(Some(param))
            .unwrap_or(param);
        let name = text_of(name_node, source);
        if first && name == lang.self_identifier && !lang.self_identifier.is_empty() {
            first = false;
            continue;
        }
        first = false;
        let default = param
            .child_by_field_name("value")
            .or_else(|| param.child_by_field_name("default_value"))
            .map(|v| CompactString::from(text_of(v, source)));
        result.push((name.into(), default));
    }
    result
}

fn find_enclosing_function<'a>(lang: &Lang, node: Node<'a>, offset: usize) -> Option<Node<'a>> {
    if node.start_byte() > offset || node.end_byte() < offset {
        return None;
    }
    let mut best = None;
    if kind_is(node, lang.function_def_kinds) {
        best = Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(inner) = find_enclosing_function(lang, child, offset) {
            best = Some(inner);
        }
    }
    best
}

/// Builds a `LineIndex` for `source`, shared by every grammar implementation
/// for reporting.
#[must_use]
pub fn line_index(source: &str) -> LineIndex {
    LineIndex::new(source)
}
