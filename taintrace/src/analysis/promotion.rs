//! Inter-procedural promotion: when one of a method's own parameters flows
//! into a source/sink/sanitizer argument (or its return value depends on a
//! source), the method itself is promoted into a new rule so that callers
//! passing tainted data into it are caught at the call site.

use super::matching;
use super::Analysis;
use crate::grammar::Grammar;
use crate::method::Expr;
use crate::rule::{ParameterPattern, Sanitizer, Sink, Source};

fn parameter_position(method: &crate::method::Method, ident: &crate::rule::Identifier) -> Option<usize> {
    if !ident.object_name.is_empty() {
        return None;
    }
    method
        .parameters
        .iter()
        .position(|(name, _default)| name == &ident.ident)
}

fn taint_pattern(method: &crate::method::Method, tainted_index: usize) -> Vec<ParameterPattern> {
    let arity = method.parameters.len().max(tainted_index + 1);
    (0..arity)
        .map(|i| if i == tainted_index { ParameterPattern::Taint } else { ParameterPattern::Wildcard })
        .collect()
}

/// Scans method `idx`'s own call sites for parameters that flow into a
/// known source/sink/sanitizer argument, promoting the method itself when
/// found.
pub fn promote_from_method(analysis: &mut Analysis, idx: usize, grammar: &dyn Grammar) {
    let method_name = analysis.methods[idx].method_name.clone();
    let calls: Vec<_> = analysis.methods[idx].calls.values().flatten().cloned().collect();

    for call in &calls {
        for arg in &call.args {
            let Expr::Var(ident) = arg else { continue };
            let Some(param_idx) = parameter_position(&analysis.methods[idx], ident) else {
                continue;
            };

            if matching::matches_any_source(analysis, call) {
                let pattern = taint_pattern(&analysis.methods[idx], param_idx);
                let candidate = Source {
                    object_name: None,
                    methods: vec![crate::rule::MethodPatternKey {
                        method_name: method_name.clone(),
                        parameters: pattern,
                    }],
                    comments: vec![format!("Parameter passed into a known source ({method_name}).")],
                };
                let method = analysis.methods[idx].clone();
                analysis.ruleset.add_source(&method, candidate);
                continue;
            }

            for sink in analysis.ruleset.sinks.clone() {
                let Some(matched_idx) = sink
                    .methods
                    .iter()
                    .position(|p| p.method_name == call.callee.ident && p.parameters.len() == call.args.len())
                else {
                    continue;
                };
                let pattern = taint_pattern(&analysis.methods[idx], param_idx);
                let comment = sink.comments.get(matched_idx).cloned().unwrap_or_default();
                let candidate = Sink {
                    object_name: None,
                    methods: vec![crate::rule::MethodPatternKey {
                        method_name: method_name.clone(),
                        parameters: pattern,
                    }],
                    comments: vec![comment],
                    sanitizers: vec![sink.sanitizers.get(matched_idx).cloned().unwrap_or_default()],
                };
                let method = analysis.methods[idx].clone();
                analysis.ruleset.add_sink(&method, candidate);
            }

            for sink in analysis.ruleset.sinks.clone() {
                let sink_key = sink.key();
                for (method_idx, sanitizer_list) in sink.sanitizers.iter().enumerate() {
                    for sanitizer in sanitizer_list {
                        let matched = sanitizer
                            .methods
                            .iter()
                            .any(|p| p.method_name == call.callee.ident && p.parameters.len() == call.args.len());
                        if !matched {
                            continue;
                        }
                        let pattern = taint_pattern(&analysis.methods[idx], param_idx);
                        let comment = sanitizer.comments.first().cloned().unwrap_or_default();
                        let candidate = Sanitizer {
                            object_name: None,
                            methods: vec![crate::rule::MethodPatternKey {
                                method_name: method_name.clone(),
                                parameters: pattern,
                            }],
                            comments: vec![comment],
                            level: sanitizer.level + 1,
                        };
                        let method = analysis.methods[idx].clone();
                        analysis.ruleset.add_sanitizer(&method, &sink_key, method_idx, candidate);
                    }
                }
            }
        }
    }

    promote_from_return(analysis, idx, grammar);
}

/// Promotes method `idx` into a new source when one of its return
/// expressions depends on a known source: callers treating its result as
/// tainted are then caught by ordinary matching at the call site.
fn promote_from_return(analysis: &mut Analysis, idx: usize, grammar: &dyn Grammar) {
    let method = analysis.methods[idx].clone();
    if method.method_name == crate::constants::GLOBALS_METHOD_NAME {
        return;
    }
    let derives_from_source = grammar.returns(method.start, method.end).iter().any(|r| {
        r.value
            .as_ref()
            .is_some_and(|value| matching::is_tainted(analysis, &method, value, r.position.start))
    });
    if !derives_from_source {
        return;
    }
    let candidate = Source {
        object_name: None,
        methods: vec![crate::rule::MethodPatternKey {
            method_name: method.method_name.clone(),
            parameters: method.parameters.iter().map(|_| ParameterPattern::Wildcard).collect(),
        }],
        comments: vec![format!("Return value derives from a known source ({}).", method.method_name)],
    };
    analysis.ruleset.add_source(&method, candidate);
}
