//! Path enumeration through mutually-exclusive control-flow chains, and
//! per-path taint detection.

use super::matching;
use super::Analysis;
use crate::grammar::{ChainLink, Grammar, MutexMatch};
use crate::method::{Path, Position, Taint};
use rustc_hash::FxHashMap;

/// Groups consecutive [`MutexMatch`]es into maximal chains: a chain starts
/// at an `If` and continues through `Alternative`s, optionally closed by an
/// `AlternativeEnd`.
fn group_chains(matches: &[MutexMatch]) -> Vec<Vec<&MutexMatch>> {
    let mut chains: Vec<Vec<&MutexMatch>> = Vec::new();
    for m in matches {
        if matches!(m.kind, ChainLink::If) {
            chains.push(vec![m]);
        } else if let Some(chain) = chains.last_mut() {
            chain.push(m);
        }
    }
    chains
}

/// Branch choices for one chain: each inner `Position` is a segment taken
/// by one possible branch, plus (if the chain has no closing `else`) one
/// zero-length "none taken" segment.
fn chain_branches(chain: &[&MutexMatch]) -> Vec<Position> {
    let mut branches: Vec<Position> = chain.iter().map(|m| m.position.clone()).collect();
    let closed = chain.last().is_some_and(|m| matches!(m.kind, ChainLink::AlternativeEnd));
    if !closed {
        let after = chain.last().map_or(0, |m| m.position.end);
        branches.push(after..after);
    }
    branches
}

/// Enumerates every control-flow path through method `idx`: the Cartesian
/// product of branch choices across every mutually-exclusive chain,
/// interleaved with the non-branching segments between chains.
pub fn find_paths_through(analysis: &mut Analysis, idx: usize, grammar: &dyn Grammar) {
    let (start, end) = {
        let method = &analysis.methods[idx];
        (method.start, method.end)
    };
    let matches = grammar.mutually_exclusive_positions(start, end);
    let chains = group_chains(&matches);

    if chains.is_empty() {
        analysis.methods[idx].paths = vec![vec![start..end]];
        return;
    }

    let mut segments: Vec<Vec<Position>> = Vec::new();
    let mut cursor = start;
    for chain in &chains {
        let chain_start = chain.first().map_or(cursor, |m| m.position.start);
        if chain_start > cursor {
            segments.push(vec![cursor..chain_start]);
        }
        segments.push(chain_branches(chain));
        cursor = chain.last().map_or(chain_start, |m| m.position.end);
    }
    if cursor < end {
        segments.push(vec![cursor..end]);
    }

    let mut paths: Vec<Path> = vec![Vec::new()];
    for options in &segments {
        if options.len() == 1 {
            for path in &mut paths {
                path.push(options[0].clone());
            }
            continue;
        }
        let mut expanded = Vec::with_capacity(paths.len() * options.len());
        for path in &paths {
            for option in options {
                let mut next = path.clone();
                next.push(option.clone());
                expanded.push(next);
            }
        }
        paths = expanded;
    }

    analysis.methods[idx].paths = paths;
}

fn in_path(path: &[Position], position: usize) -> bool {
    path.iter().any(|seg| seg.start <= position && position < seg.end)
}

/// Restricts a `sources`/`sinks`/`sanitizers` map to calls whose position
/// lies within `path`.
fn restrict(
    map: &FxHashMap<crate::rule::RuleKey, Vec<crate::method::CallRecord>>,
    path: &[Position],
) -> FxHashMap<crate::rule::RuleKey, Vec<crate::method::CallRecord>> {
    map.iter()
        .filter_map(|(key, calls)| {
            let kept: Vec<_> = calls.iter().filter(|c| in_path(path, c.position.start)).cloned().collect();
            (!kept.is_empty()).then_some((key.clone(), kept))
        })
        .collect()
}

/// For every sink call reached by `path`, checks whether a `$TAINT`-marked
/// argument traces back to a source, and whether a sanitizer precedes it on
/// the same path; records the resulting taints via merge-append.
pub fn find_taints(analysis: &mut Analysis, idx: usize, path: &[Position]) {
    let sinks = restrict(&analysis.methods[idx].sinks, path);
    let sanitizers = restrict(&analysis.methods[idx].sanitizers, path);

    let mut new_taints: FxHashMap<crate::rule::RuleKey, Vec<Taint>> = FxHashMap::default();

    for sink in &analysis.ruleset.sinks {
        let sink_key = sink.key();
        let Some(calls) = sinks.get(&sink_key) else {
            continue;
        };
        for call in calls {
            let Some((pattern_idx, pattern)) = sink
                .methods
                .iter()
                .enumerate()
                .find(|(_, p)| p.method_name == call.callee.ident && p.parameters.len() == call.args.len())
            else {
                continue;
            };
            let tainted_arg = pattern.parameters.iter().enumerate().any(|(i, p)| {
                matches!(p, crate::rule::ParameterPattern::Taint)
                    && call
                        .args
                        .get(i)
                        .is_some_and(|a| matching::is_tainted(analysis, &analysis.methods[idx], a, call.position.start))
            });
            if !tainted_arg {
                continue;
            }

            let preceding_sanitizer = sanitizers
                .iter()
                .flat_map(|(key, calls)| calls.iter().map(move |c| (key, c)))
                .filter(|(_, s)| s.position.end <= call.position.start)
                .max_by_key(|(_, s)| s.position.start)
                .map(|(key, _)| key.clone());

            let comment = sink.comments.get(pattern_idx).cloned().unwrap_or_default();
            new_taints.entry(sink_key.clone()).or_default().push(Taint {
                comment,
                position: call.position.clone(),
                call: call.clone(),
                sanitizer: preceding_sanitizer,
            });
        }
    }

    analysis.methods[idx].add_taints(new_taints);
}
