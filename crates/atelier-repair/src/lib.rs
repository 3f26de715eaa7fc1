//! Source repair compiler for generated UI code.
//!
//! Turns raw generator output into something the sandbox can execute:
//! strips conversational wrapping, parses the component-markup dialect into
//! a lightweight module AST, resolves recognized unbound identifiers through
//! a pluggable rule table, and rewrites only the import section. Repair is
//! deterministic, idempotent and best-effort by design.

pub mod ast;
pub mod compiler;
pub mod fix;
pub mod lexer;
pub mod parser;
pub mod rules;
pub mod strip;

pub use ast::{ImportDecl, Module, ParseResult};
pub use compiler::{RepairCompiler, RepairOutcome};
pub use fix::{Fix, FixKind};
pub use rules::{FixRule, ImportKind, RuleSet};
