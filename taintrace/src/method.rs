//! Per-function record of discovered artifacts: calls, variables, matched
//! rules, taints, enumerated paths, and complexity.

use crate::rule::{Identifier, RuleKey};
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A half-open byte range `[start, end)` into a file's contents.
pub type Position = std::ops::Range<usize>;

/// An expression appearing as a call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A nested call.
    Call(Box<CallRecord>),
    /// A variable reference.
    Var(Identifier),
    /// A literal value, as it appears in source text.
    Literal(CompactString),
}

/// A single call site: the callee identifier, its positional arguments, and
/// its position in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// The identifier being called.
    pub callee: Identifier,
    /// Positional argument expressions.
    pub args: Vec<Expr>,
    /// Byte range of the call expression.
    pub position: Position,
}

/// A single assignment to a variable: `(object_name, ident)` is the key it's
/// filed under in `Method::variables`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// The assigned expression.
    pub value: Expr,
    /// Byte range of the assignment statement.
    pub position: Position,
}

/// One recorded taint: a sink reached by tainted data, optionally through a
/// sanitizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taint {
    /// The matching sink's comment, surfaced to the report.
    pub comment: String,
    /// Byte range of the sink call.
    pub position: Position,
    /// The sink call record itself.
    pub call: CallRecord,
    /// The sanitizer that preceded the sink on this path, if any.
    pub sanitizer: Option<RuleKey>,
}

/// An ordered sequence of `(start, end)` segments covering a method body;
/// one path is the set of segments chosen across every mutually-exclusive
/// chain plus the non-branching segments between them.
pub type Path = Vec<Position>;

/// Key identifying a variable: its object-name prefix tuple plus its name.
pub type VariableKey = (SmallVec<[CompactString; 2]>, CompactString);

/// Per-function accumulator. Constructed once per method definition; mutated
/// throughout analysis via the `add_*` merge-append operations.
#[derive(Debug, Clone)]
pub struct Method {
    /// Byte offset where the method begins.
    pub start: usize,
    /// Byte offset where the method ends.
    pub end: usize,
    /// The method's name.
    pub method_name: CompactString,
    /// Parameters, in declaration order: name to default-value-literal-or-none.
    pub parameters: Vec<(CompactString, Option<CompactString>)>,
    /// Every call site found in the method, keyed by callee identifier.
    pub calls: FxHashMap<Identifier, Vec<CallRecord>>,
    /// Every assignment found in the method, keyed by `(object_name, ident)`,
    /// in textual order.
    pub variables: FxHashMap<VariableKey, Vec<Assignment>>,
    /// Matched source rules and the call sites that matched them.
    pub sources: FxHashMap<RuleKey, Vec<CallRecord>>,
    /// Matched sink rules and the call sites that matched them.
    pub sinks: FxHashMap<RuleKey, Vec<CallRecord>>,
    /// Matched sanitizer rules and the call sites that matched them.
    pub sanitizers: FxHashMap<RuleKey, Vec<CallRecord>>,
    /// Recorded taints, keyed by the sink rule they were found against.
    pub taints: FxHashMap<RuleKey, Vec<Taint>>,
    /// Enumerated control-flow paths through the method body.
    pub paths: Vec<Path>,
    /// McCabe cyclomatic complexity; `-1` until computed.
    pub complexity: i64,
}

/// Merge-appends `from` into `original`: for each key in `from`, insert it if
/// absent, or extend `original`'s list with only the entries not already
/// present (order-preserving set union).
fn merge_append<K, V>(original: &mut FxHashMap<K, Vec<V>>, from: FxHashMap<K, Vec<V>>)
where
    K: std::hash::Hash + Eq,
    V: PartialEq,
{
    for (key, additions) in from {
        match original.get_mut(&key) {
            None => {
                original.insert(key, additions);
            }
            Some(existing) => {
                for item in additions {
                    if !existing.contains(&item) {
                        existing.push(item);
                    }
                }
            }
        }
    }
}

impl Method {
    /// Creates a new, empty method record spanning `[start, end)`.
    #[must_use]
    pub fn new(start: usize, end: usize, method_name: impl Into<CompactString>) -> Self {
        Self {
            start,
            end,
            method_name: method_name.into(),
            parameters: Vec::new(),
            calls: FxHashMap::default(),
            variables: FxHashMap::default(),
            sources: FxHashMap::default(),
            sinks: FxHashMap::default(),
            sanitizers: FxHashMap::default(),
            taints: FxHashMap::default(),
            paths: Vec::new(),
            complexity: -1,
        }
    }

    /// Merge-appends newly discovered source matches.
    pub fn add_sources(&mut self, sources: FxHashMap<RuleKey, Vec<CallRecord>>) {
        merge_append(&mut self.sources, sources);
    }

    /// Merge-appends newly discovered sink matches.
    pub fn add_sinks(&mut self, sinks: FxHashMap<RuleKey, Vec<CallRecord>>) {
        merge_append(&mut self.sinks, sinks);
    }

    /// Merge-appends newly discovered sanitizer matches.
    pub fn add_sanitizers(&mut self, sanitizers: FxHashMap<RuleKey, Vec<CallRecord>>) {
        merge_append(&mut self.sanitizers, sanitizers);
    }

    /// Merge-appends newly discovered taints.
    pub fn add_taints(&mut self, taints: FxHashMap<RuleKey, Vec<Taint>>) {
        merge_append(&mut self.taints, taints);
    }

    /// Merge-appends newly discovered variable assignments.
    pub fn add_variables(&mut self, variables: FxHashMap<VariableKey, Vec<Assignment>>) {
        merge_append(&mut self.variables, variables);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, pos: Position) -> CallRecord {
        CallRecord {
            callee: Identifier::bare(name),
            args: Vec::new(),
            position: pos,
        }
    }

    fn key(name: &str) -> RuleKey {
        RuleKey {
            object_name: None,
            methods: vec![crate::rule::MethodPatternKey {
                method_name: name.into(),
                parameters: Vec::new(),
            }],
        }
    }

    #[test]
    fn merge_append_inserts_new_key() {
        let mut method = Method::new(0, 10, "f");
        let mut additions = FxHashMap::default();
        additions.insert(key("scanf"), vec![call("scanf", 0..5)]);
        method.add_sources(additions);
        assert_eq!(method.sources.len(), 1);
    }

    #[test]
    fn merge_append_deduplicates_existing_entries() {
        let mut method = Method::new(0, 10, "f");
        let mut first = FxHashMap::default();
        first.insert(key("scanf"), vec![call("scanf", 0..5)]);
        method.add_sources(first.clone());
        method.add_sources(first);
        assert_eq!(method.sources[&key("scanf")].len(), 1);
    }

    #[test]
    fn merge_append_extends_with_only_new_entries() {
        let mut method = Method::new(0, 10, "f");
        let mut first = FxHashMap::default();
        first.insert(key("scanf"), vec![call("scanf", 0..5)]);
        method.add_sources(first);

        let mut second = FxHashMap::default();
        second.insert(key("scanf"), vec![call("scanf", 0..5), call("scanf", 20..25)]);
        method.add_sources(second);

        assert_eq!(method.sources[&key("scanf")].len(), 2);
    }
}
