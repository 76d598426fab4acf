//! Source/sink/sanitizer matching and variable-source tracing.
//!
//! Matching is purely structural: a rule's method pattern matches any call
//! with the same receiver constraint, method name, and argument count,
//! where literal parameter slots equal the argument's literal text. The
//! `$TAINT` sentinel marks which positions matter for taint detection later
//! ([`super::paths::find_taints`]); it imposes no precondition at match time.

use super::Analysis;
use crate::method::{Assignment, CallRecord, Expr, Method, Position, VariableKey};
use crate::rule::{Identifier, ParameterPattern, RuleKey};
use compact_str::CompactString;
use rustc_hash::FxHashMap;

fn literal_text(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Literal(s) => Some(s.as_str()),
        _ => None,
    }
}

fn receiver_matches(object_name: &Option<Vec<CompactString>>, callee: &Identifier) -> bool {
    match object_name {
        None => true,
        Some(constraint) => callee.object_name == *constraint,
    }
}

fn pattern_matches(parameters: &[ParameterPattern], call: &CallRecord) -> bool {
    if parameters.len() != call.args.len() {
        return false;
    }
    parameters.iter().zip(&call.args).all(|(pattern, arg)| match pattern {
        ParameterPattern::Wildcard | ParameterPattern::Taint => true,
        ParameterPattern::Literal(expected) => literal_text(arg) == Some(expected.as_str()),
    })
}

/// Matches every call in `method` against `rules`, returning a map from the
/// matching rule's identity to the call sites that matched it.
fn match_calls<'a>(
    calls: impl Iterator<Item = &'a CallRecord>,
    rules: impl Iterator<Item = (RuleKey, &'a Option<Vec<CompactString>>, &'a [crate::rule::MethodPatternKey])>,
) -> FxHashMap<RuleKey, Vec<CallRecord>> {
    let rules: Vec<_> = rules.collect();
    let mut out: FxHashMap<RuleKey, Vec<CallRecord>> = FxHashMap::default();
    for call in calls {
        for (key, object_name, patterns) in &rules {
            if !receiver_matches(object_name, &call.callee) {
                continue;
            }
            let hit = patterns
                .iter()
                .any(|p| p.method_name == call.callee.ident && pattern_matches(&p.parameters, call));
            if hit {
                out.entry(key.clone()).or_default().push(call.clone());
            }
        }
    }
    out
}

fn all_calls(method: &Method) -> impl Iterator<Item = &CallRecord> {
    method.calls.values().flatten()
}

/// Matches every call in method `idx` against the ruleset's sources.
pub fn find_sources(analysis: &Analysis, idx: usize) -> FxHashMap<RuleKey, Vec<CallRecord>> {
    let method = &analysis.methods[idx];
    match_calls(
        all_calls(method),
        analysis
            .ruleset
            .sources
            .iter()
            .map(|s| (s.key(), &s.object_name, s.methods.as_slice())),
    )
}

/// Matches every call in method `idx` against the ruleset's sinks.
pub fn find_sinks(analysis: &Analysis, idx: usize) -> FxHashMap<RuleKey, Vec<CallRecord>> {
    let method = &analysis.methods[idx];
    match_calls(
        all_calls(method),
        analysis
            .ruleset
            .sinks
            .iter()
            .map(|s| (s.key(), &s.object_name, s.methods.as_slice())),
    )
}

/// Matches every call in method `idx` against every sink's sanitizer list.
pub fn find_sanitizers(analysis: &Analysis, idx: usize) -> FxHashMap<RuleKey, Vec<CallRecord>> {
    let method = &analysis.methods[idx];
    let mut out: FxHashMap<RuleKey, Vec<CallRecord>> = FxHashMap::default();
    for sink in &analysis.ruleset.sinks {
        for sanitizer_list in &sink.sanitizers {
            for sanitizer in sanitizer_list {
                let matched = match_calls(
                    all_calls(method),
                    std::iter::once((sanitizer.key(), &sanitizer.object_name, sanitizer.methods.as_slice())),
                );
                for (key, calls) in matched {
                    out.entry(key).or_default().extend(calls);
                }
            }
        }
    }
    out
}

/// Returns the matching sources whose pattern would be satisfied by a call
/// with this shape, used when tracing whether an expression derives from a
/// known source.
pub fn matches_any_source(analysis: &Analysis, call: &CallRecord) -> bool {
    analysis.ruleset.sources.iter().any(|source| {
        receiver_matches(&source.object_name, &call.callee)
            && source
                .methods
                .iter()
                .any(|p| p.method_name == call.callee.ident && pattern_matches(&p.parameters, call))
    })
}

fn variable_key(ident: &Identifier) -> VariableKey {
    (ident.object_name.clone().into(), ident.ident.clone())
}

/// For each matched source call, synthesizes an assignment for every
/// `$TAINT`-marked parameter whose argument is a plain variable (e.g. `buf`
/// in `scanf("%s", &buf)`, once the grammar layer has unwrapped the
/// address-of), recording that variable as having received the source's
/// tainted output. Without this, a source whose taint escapes through an
/// output parameter rather than a return value would never be traced by
/// [`find_variable_source`].
pub fn source_output_assignments(
    analysis: &Analysis,
    sources: &FxHashMap<RuleKey, Vec<CallRecord>>,
) -> FxHashMap<VariableKey, Vec<Assignment>> {
    let mut out: FxHashMap<VariableKey, Vec<Assignment>> = FxHashMap::default();
    for source in &analysis.ruleset.sources {
        let Some(calls) = sources.get(&source.key()) else {
            continue;
        };
        for call in calls {
            let Some(pattern) = source
                .methods
                .iter()
                .find(|p| p.method_name == call.callee.ident && p.parameters.len() == call.args.len())
            else {
                continue;
            };
            for (i, param) in pattern.parameters.iter().enumerate() {
                if !matches!(param, ParameterPattern::Taint) {
                    continue;
                }
                if let Some(Expr::Var(ident)) = call.args.get(i) {
                    out.entry(variable_key(ident)).or_default().push(Assignment {
                        value: Expr::Call(Box::new(call.clone())),
                        position: call.position.clone(),
                    });
                }
            }
        }
    }
    out
}

/// Walks backward from `position` through reassignments of `ident`,
/// returning the chronological (earliest-first) trail of assignment
/// records that feed its value.
pub fn find_variable_source(method: &Method, ident: &Identifier, position: usize) -> Vec<crate::method::Assignment> {
    let mut trail = Vec::new();
    let mut current = ident.clone();
    let mut cursor = position;
    loop {
        let key = variable_key(&current);
        let Some(candidates) = method.variables.get(&key) else {
            break;
        };
        let Some(assignment) = candidates
            .iter()
            .filter(|a| a.position.end <= cursor)
            .max_by_key(|a| a.position.start)
        else {
            break;
        };
        trail.push(assignment.clone());
        cursor = assignment.position.start;
        match &assignment.value {
            Expr::Var(next) => current = next.clone(),
            _ => break,
        }
    }
    trail.reverse();
    trail
}

/// Whether `expr`, evaluated at `before` inside `method`, ultimately derives
/// from a known source: directly (a call matching a source rule), or
/// transitively through a chain of variable reassignments or nested call
/// arguments.
pub fn is_tainted(analysis: &Analysis, method: &Method, expr: &Expr, before: usize) -> bool {
    match expr {
        Expr::Literal(_) => false,
        Expr::Var(ident) => {
            let trail = find_variable_source(method, ident, before);
            match trail.last() {
                Some(assignment) => is_tainted(analysis, method, &assignment.value, assignment.position.start),
                None => false,
            }
        }
        Expr::Call(call) => {
            matches_any_source(analysis, call)
                || call.args.iter().any(|a| is_tainted(analysis, method, a, call.position.start))
        }
    }
}

/// The byte position immediately preceding `call`, used as the "before"
/// cursor for tracing its arguments' origins.
#[must_use]
pub fn call_site(call: &CallRecord) -> Position {
    call.position.clone()
}
