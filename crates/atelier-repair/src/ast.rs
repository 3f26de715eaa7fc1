//! Syntax tree types produced by the module parser.

use serde::Serialize;
use std::collections::HashSet;

/// An `import` declaration, possibly malformed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDecl {
    /// First source line of the statement (1-based).
    pub start_line: usize,
    /// Last source line of the statement (1-based).
    pub end_line: usize,
    /// Module specifier. Empty when the statement never named one.
    pub source: String,
    /// Whether the specifier was a proper string literal.
    pub quoted: bool,
    /// Default-import binding, if any.
    pub default: Option<String>,
    /// Namespace binding (`* as ns`), if any.
    pub namespace: Option<String>,
    /// Named bindings, aliases applied.
    pub named: Vec<String>,
    /// Whether the statement parsed as a complete import.
    pub valid: bool,
}

impl ImportDecl {
    /// All names this import binds in module scope.
    pub fn bound_names(&self) -> impl Iterator<Item = &String> {
        self.default
            .iter()
            .chain(self.namespace.iter())
            .chain(self.named.iter())
    }

    /// Renders the declaration back to canonical source text.
    pub fn render(&self) -> String {
        if self.default.is_none() && self.namespace.is_none() && self.named.is_empty() {
            return format!("import \"{}\";", self.source);
        }
        let mut clauses = Vec::new();
        if let Some(default) = &self.default {
            clauses.push(default.clone());
        }
        if let Some(ns) = &self.namespace {
            clauses.push(format!("* as {ns}"));
        }
        if !self.named.is_empty() {
            clauses.push(format!("{{ {} }}", self.named.join(", ")));
        }
        format!("import {} from \"{}\";", clauses.join(", "), self.source)
    }
}

/// A reference to an identifier in the module body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentRef {
    pub name: String,
    /// 1-based source line.
    pub line: usize,
    /// 1-based source column.
    pub column: usize,
}

/// Root of the parsed module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Import declarations in source order.
    pub imports: Vec<ImportDecl>,
    /// Identifier references in the module body, in source order.
    pub references: Vec<IdentRef>,
    /// Names declared anywhere in the module (bindings, params, classes).
    pub declared: HashSet<String>,
}

impl Module {
    /// Whether `name` is bound by a declaration or an import.
    pub fn binds(&self, name: &str) -> bool {
        self.declared.contains(name)
            || self
                .imports
                .iter()
                .any(|import| import.bound_names().any(|bound| bound == name))
    }

    /// Line immediately after the last import, where new imports go.
    /// Returns 0 when the module has no imports yet.
    pub fn import_section_end(&self) -> usize {
        self.imports.iter().map(|i| i.end_line).max().unwrap_or(0)
    }
}

/// Outcome of a parse attempt.
///
/// Parsing is total: `module` is populated whenever tokenization yields
/// anything, even if `success` is false. `errors` holds ordered syntax
/// error messages.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub success: bool,
    pub module: Option<Module>,
    pub errors: Vec<String>,
}
