//! The language-agnostic query surface the Analysis Engine consumes.
//!
//! Every query is scoped to a `[start, end)` byte window. Implementations
//! (`c`, `php`, `python`) wrap a `tree-sitter::Tree` parsed once per file and
//! walk its nodes to answer each query; the engine itself never knows which
//! language it's looking at.

pub mod c;
pub mod php;
pub mod python;

use crate::method::{Assignment, CallRecord, Expr, Position};
use crate::rule::Identifier;
use compact_str::CompactString;
use std::collections::BTreeMap;

/// One link in a mutually-exclusive chain: an `if`, a continuing
/// `elif`/`else if`/`elseif`, or the closing `else`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLink {
    /// Opens a mutually-exclusive chain.
    If,
    /// Continues an open chain (`elif`, `else if`, `elseif`).
    Alternative,
    /// Closes a chain (a final, condition-less `else`).
    AlternativeEnd,
}

/// One entry in `mutually_exclusive_positions`.
#[derive(Debug, Clone)]
pub struct MutexMatch {
    /// Which role this branch plays in its chain.
    pub kind: ChainLink,
    /// Byte range of the branch's body (what executes if this branch is taken).
    pub position: Position,
}

/// One entry in `method_definitions`.
#[derive(Debug, Clone)]
pub struct MethodDefMatch {
    /// The method's name.
    pub name: CompactString,
    /// Byte range of the method's body, used as the method's `[start, end)`.
    pub body: Position,
}

/// One entry in `returns`.
#[derive(Debug, Clone)]
pub struct ReturnMatch {
    /// The returned expression, if any.
    pub value: Option<Expr>,
    /// Byte range of the return statement.
    pub position: Position,
}

/// One entry in `declarations`: a name declared without being assigned a
/// value (e.g. a bare C declaration, or a PHP/Python global statement).
#[derive(Debug, Clone)]
pub struct DeclarationMatch {
    /// The declared identifier.
    pub ident: Identifier,
    /// Byte range of the declaration.
    pub position: Position,
}

/// One entry in `control_structures`: any branch/loop keyword contributing
/// to statement/edge counts (`if`, `while`, `for`, `foreach`, `case`, ...).
/// `is_loop` distinguishes loop constructs (3 edges) from conditionals
/// already covered by `mutually_exclusive_positions` (2 edges, counted
/// separately so as not to double count).
#[derive(Debug, Clone, Copy)]
pub struct ControlStructureMatch {
    /// Whether this is a loop construct contributing 3 edges.
    pub is_loop: bool,
    /// Byte range of the control structure.
    pub position: Position,
}

/// The capability set a language implementation must provide. All queries
/// are scoped to `[start, end)`; positions returned are absolute byte
/// offsets into the file unless documented otherwise.
pub trait Grammar {
    /// Ordered map from class name to its absolute start offset. Empty for
    /// languages without classes (e.g. C).
    fn class_definitions(&self) -> BTreeMap<CompactString, usize> {
        BTreeMap::new()
    }

    /// The identifier used to refer to the current instance (`self`,
    /// `this`), or empty if the language has no notion of one.
    fn self_identifier(&self) -> &str {
        ""
    }

    /// Count of statements, branch keywords, and mutually-exclusive blocks
    /// in `[start, end)`.
    fn statement_count(&self, start: usize, end: usize) -> usize;

    /// `3*loops + 2*mutually_exclusive + statements` in `[start, end)`.
    fn edge_count(&self, start: usize, end: usize) -> usize;

    /// Mutually-exclusive branch chains in `[start, end)`, in textual order.
    fn mutually_exclusive_positions(&self, start: usize, end: usize) -> Vec<MutexMatch>;

    /// Every method/function definition in the file.
    fn method_definitions(&self) -> Vec<MethodDefMatch>;

    /// Every call expression in `[start, end)`.
    fn method_calls(&self, start: usize, end: usize) -> Vec<CallRecord>;

    /// Every assignment statement in `[start, end)`.
    fn assignments(&self, start: usize, end: usize) -> Vec<(Identifier, Assignment)>;

    /// Every branch/loop control structure in `[start, end)`.
    fn control_structures(&self, start: usize, end: usize) -> Vec<ControlStructureMatch>;

    /// Every return statement in `[start, end)`.
    fn returns(&self, start: usize, end: usize) -> Vec<ReturnMatch>;

    /// Declarations with no accompanying assignment in `[start, end)`.
    /// Default: none (languages without bare declarations, e.g. Python).
    fn declarations(&self, _start: usize, _end: usize) -> Vec<DeclarationMatch> {
        Vec::new()
    }

    /// Parameters, in declaration order, for the method spanning
    /// `[start, end)`, skipping a leading parameter equal to
    /// `self_identifier()` when present.
    fn parameters(&self, start: usize, end: usize) -> Vec<(CompactString, Option<CompactString>)>;

    /// Declarations/assignments found outside every method body. Default:
    /// none.
    fn global_variables(&self) -> Vec<DeclarationMatch> {
        Vec::new()
    }

    /// The file's full contents, for substring extraction by the engine.
    fn source(&self) -> &str;
}

/// Constructs the grammar implementation for a detected language module.
///
/// # Errors
///
/// Returns [`crate::error::Error::UnknownModule`] if `module` names no known
/// language.
pub fn build(module: &str, source: &str) -> crate::error::Result<Box<dyn Grammar>> {
    match module {
        crate::constants::C_MODULE => Ok(Box::new(c::CGrammar::parse(source))),
        crate::constants::PHP_MODULE => Ok(Box::new(php::PhpGrammar::parse(source))),
        crate::constants::PYTHON_MODULE => Ok(Box::new(python::PythonGrammar::parse(source))),
        other => Err(crate::error::Error::UnknownModule {
            module: other.to_owned(),
        }),
    }
}
