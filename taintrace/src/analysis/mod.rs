//! The analysis engine: per-method control-flow and data-flow reasoning
//! over a file's [`Grammar`]-exposed structure and a language [`Ruleset`].
//!
//! [`Analysis::new`] enumerates methods and registers itself (via a dirty
//! flag shared with a [`DirtyFlag`] observer) with the ruleset; [`Analysis::run`]
//! drives the full pipeline described for each method and reruns matching
//! whenever inter-procedural promotion appends a new rule, until a full pass
//! makes no further additions.

pub mod matching;
pub mod paths;
pub mod promotion;

use crate::constants::GLOBALS_METHOD_NAME;
use crate::grammar::Grammar;
use crate::method::{Assignment, Expr, Method};
use crate::ruleset::{Observer, Ruleset};
use std::cell::Cell;
use std::rc::Rc;

/// Observer that records "something changed" without touching the ruleset
/// or methods directly, avoiding any reentrant-borrow hazard when promotion
/// triggers further promotion.
struct DirtyFlag(Rc<Cell<bool>>);

impl Observer for DirtyFlag {
    fn update(&mut self, _method: &Method, _changed_sanitizer: bool, _new_source: bool) {
        self.0.set(true);
    }
}

/// Owns every [`Method`] discovered in a file plus the [`Ruleset`] it is
/// matched against, and runs the full analysis pipeline.
pub struct Analysis {
    pub(crate) methods: Vec<Method>,
    pub(crate) ruleset: Ruleset,
    dirty: Rc<Cell<bool>>,
}

impl Analysis {
    /// Enumerates methods from `grammar`, seeds a `__globals` pseudo-method
    /// from its top-level declarations/assignments, and registers as a
    /// `ruleset` observer.
    #[must_use]
    pub fn new(grammar: &dyn Grammar, mut ruleset: Ruleset) -> Self {
        let mut defs = grammar.method_definitions();
        defs.sort_by_key(|d| d.body.start);

        let first_start = defs.first().map_or(0, |d| d.body.start);
        let mut globals = Method::new(0, first_start, GLOBALS_METHOD_NAME);
        for decl in grammar.global_variables() {
            let key = (decl.ident.object_name.clone().into(), decl.ident.ident.clone());
            globals.variables.entry(key).or_default().push(Assignment {
                value: Expr::Var(decl.ident.clone()),
                position: decl.position.clone(),
            });
        }

        let mut methods = vec![globals];
        for def in &defs {
            let mut method = Method::new(def.body.start, def.body.end, def.name.clone());
            method.parameters = grammar.parameters(def.body.start, def.body.end);
            for call in grammar.method_calls(def.body.start, def.body.end) {
                method.calls.entry(call.callee.clone()).or_default().push(call);
            }
            methods.push(method);
        }

        let dirty = Rc::new(Cell::new(false));
        ruleset.register_observer(Box::new(DirtyFlag(Rc::clone(&dirty))));

        Self { methods, ruleset, dirty }
    }

    /// Every enumerated method, `__globals` first.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// The ruleset this analysis matches against, including any rules
    /// promoted during [`Analysis::run`].
    #[must_use]
    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Reclaims the (possibly promotion-grown) ruleset, so a driver can
    /// reuse it across every file sharing the same language module.
    #[must_use]
    pub fn into_ruleset(self) -> Ruleset {
        self.ruleset
    }

    /// Computes McCabe cyclomatic complexity for every method:
    /// `edges - nodes + 2`.
    pub fn calculate_complexity(&mut self, grammar: &dyn Grammar) {
        for method in self.methods.iter_mut().skip(1) {
            let nodes = grammar.statement_count(method.start, method.end) as i64;
            let edges = grammar.edge_count(method.start, method.end) as i64;
            method.complexity = edges - nodes + 2;
        }
    }

    /// Walks assignments in every method body, seeding parameters as
    /// zero-length assignments at `(0, 0)` and recording the rest in
    /// textual order.
    pub fn follow_variables(&mut self, grammar: &dyn Grammar) {
        for method in self.methods.iter_mut().skip(1) {
            for (name, _default) in method.parameters.clone() {
                let key = (Default::default(), name.clone());
                method.variables.entry(key).or_default().push(Assignment {
                    value: Expr::Literal(compact_str::CompactString::new("")),
                    position: 0..0,
                });
            }
            for (ident, assignment) in grammar.assignments(method.start, method.end) {
                let key = (ident.object_name.into(), ident.ident);
                method.variables.entry(key).or_default().push(assignment);
            }
        }
    }

    /// Rewrites the receiver of direct `var.method(...)` calls where `var`
    /// was last assigned the result of a call to a known class constructor,
    /// so matching sees a stable class-scoped identity. One level only: a
    /// chained `var.attr.method(...)` is left untouched.
    pub fn fix_object_names(&mut self, grammar: &dyn Grammar) {
        let classes = grammar.class_definitions();
        if classes.is_empty() {
            return;
        }
        for method in self.methods.iter_mut().skip(1) {
            let mut class_of_var: rustc_hash::FxHashMap<compact_str::CompactString, compact_str::CompactString> =
                rustc_hash::FxHashMap::default();
            for ((object_name, ident), assignments) in &method.variables {
                if !object_name.is_empty() {
                    continue;
                }
                for assignment in assignments {
                    if let Expr::Call(call) = &assignment.value {
                        if call.callee.object_name.is_empty() && classes.contains_key(call.callee.ident.as_str()) {
                            class_of_var.insert(ident.clone(), call.callee.ident.clone());
                        }
                    }
                }
            }
            if class_of_var.is_empty() {
                continue;
            }
            let renamed: Vec<_> = method
                .calls
                .keys()
                .filter(|callee| {
                    callee.object_name.len() == 1
                        && class_of_var.contains_key(&callee.object_name[0])
                })
                .cloned()
                .collect();
            for old_key in renamed {
                let class_name = class_of_var[&old_key.object_name[0]].clone();
                let calls = method.calls.remove(&old_key).unwrap_or_default();
                let new_key = crate::rule::Identifier {
                    object_name: vec![class_name],
                    ident: old_key.ident,
                };
                method.calls.entry(new_key).or_default().extend(calls);
            }
        }
    }

    /// Runs the full pipeline (complexity, variable tracking, object-name
    /// fixup, matching, path enumeration, taint detection) over every
    /// method, re-running matching whenever promotion appends a new rule,
    /// until a pass makes no further additions.
    pub fn run(&mut self, grammar: &dyn Grammar, lazy: bool) {
        self.calculate_complexity(grammar);
        self.follow_variables(grammar);
        self.fix_object_names(grammar);

        loop {
            self.dirty.set(false);
            for idx in 0..self.methods.len() {
                let all_sources = matching::find_sources(self, idx);
                let all_sinks = matching::find_sinks(self, idx);
                let all_sanitizers = matching::find_sanitizers(self, idx);

                let source_vars = matching::source_output_assignments(self, &all_sources);
                if !source_vars.is_empty() {
                    self.methods[idx].add_variables(source_vars);
                }

                if lazy {
                    let method = &mut self.methods[idx];
                    method.paths = vec![vec![method.start..method.end]];
                } else {
                    paths::find_paths_through(self, idx, grammar);
                }

                let method_paths = self.methods[idx].paths.clone();
                for path in &method_paths {
                    self.methods[idx].sources = all_sources.clone();
                    self.methods[idx].sinks = all_sinks.clone();
                    self.methods[idx].sanitizers = all_sanitizers.clone();
                    paths::find_taints(self, idx, path);
                }
                if method_paths.len() > 1 {
                    let whole = self.methods[idx].start..self.methods[idx].end;
                    let preserved = self.methods[idx].taints.clone();
                    self.methods[idx].sources = all_sources;
                    self.methods[idx].sinks = all_sinks;
                    self.methods[idx].sanitizers = all_sanitizers;
                    paths::find_taints(self, idx, &[whole]);
                    self.methods[idx].add_taints(preserved);
                }

                promotion::promote_from_method(self, idx, grammar);
            }
            if !self.dirty.get() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::c::CGrammar;
    use crate::grammar::php::PhpGrammar;
    use crate::ruleset::Ruleset;
    use tempfile::tempdir;

    fn empty_ruleset() -> Ruleset {
        let dir = tempdir().unwrap();
        Ruleset::load(dir.path(), "c").unwrap()
    }

    fn write_rule(dir: &std::path::Path, name: &str, yaml: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), yaml).unwrap();
    }

    fn scanf_printf_ruleset() -> Ruleset {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write_rule(
            &root.join("c/sources"),
            "scanf.yml",
            "null:\n  Methods:\n    - Methodname: scanf\n      Parameters: [null, \"$TAINT\"]\n      Comment: Reads formatted input from stdin.\n",
        );
        write_rule(
            &root.join("c/sinks"),
            "printf.yml",
            "null:\n  Methods:\n    - Methodname: printf\n      Parameters: [\"$TAINT\"]\n      Comment: Format string vulnerability.\n",
        );
        Ruleset::load(root, "c").unwrap()
    }

    #[test]
    fn output_parameter_source_taints_reference_argument() {
        let source = "int main(void) {\n    char buf[256];\n    scanf(\"%s\", &buf);\n    printf(buf);\n    return 0;\n}\n";
        let grammar = CGrammar::parse(source);
        let mut analysis = Analysis::new(&grammar, scanf_printf_ruleset());
        analysis.run(&grammar, false);

        let method = analysis
            .methods()
            .iter()
            .find(|m| m.method_name == "main")
            .expect("main method analyzed");
        assert!(
            method.taints.values().any(|taints| !taints.is_empty()),
            "buf passed by address to scanf should taint the later printf(buf) call"
        );
    }

    fn php_class_sink_ruleset() -> Ruleset {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write_rule(
            &root.join("php/sources"),
            "getenv.yml",
            "null:\n  Methods:\n    - Methodname: getenv\n      Parameters: [null]\n      Comment: Reads an environment variable.\n",
        );
        write_rule(
            &root.join("php/sinks"),
            "sink.yml",
            "C:\n  Methods:\n    - Methodname: sink\n      Parameters: [\"$TAINT\"]\n      Comment: Class-scoped sink.\n",
        );
        Ruleset::load(root, "php").unwrap()
    }

    #[test]
    fn object_creation_is_recognized_as_a_call_and_enables_class_scoped_sink_matching() {
        let source = "<?php\nclass C {\n    function sink($x) {\n        echo $x;\n    }\n}\nfunction run() {\n    $x = getenv('TAINT');\n    $o = new C();\n    $o->sink($x);\n}\n";
        let grammar = PhpGrammar::parse(source);
        let mut analysis = Analysis::new(&grammar, php_class_sink_ruleset());
        analysis.run(&grammar, false);

        let method = analysis
            .methods()
            .iter()
            .find(|m| m.method_name == "run")
            .expect("run method analyzed");
        assert!(
            method.taints.values().any(|taints| !taints.is_empty()),
            "$o->sink($x) should match the C-scoped sink once $o is resolved to class C via the object_creation_expression call shape"
        );
    }

    #[test]
    fn enumerates_methods_with_globals_first() {
        let source = "int g;\nint f(int x) {\n    return x;\n}\n";
        let grammar = CGrammar::parse(source);
        let analysis = Analysis::new(&grammar, empty_ruleset());
        assert_eq!(analysis.methods()[0].method_name, GLOBALS_METHOD_NAME);
        assert_eq!(analysis.methods().len(), 2);
        assert_eq!(analysis.methods()[1].method_name, "f");
    }

    #[test]
    fn complexity_of_straight_line_function_is_two() {
        let source = "int f(void) {\n    return 0;\n}\n";
        let grammar = CGrammar::parse(source);
        let mut analysis = Analysis::new(&grammar, empty_ruleset());
        analysis.calculate_complexity(&grammar);
        assert_eq!(analysis.methods()[1].complexity, 2);
    }
}
