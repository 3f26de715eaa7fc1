//! Repair fixes: what was changed and where.

use serde::Serialize;

/// Kind of a repair fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    /// A known symbol was referenced without an import; one was inserted.
    MissingImport,
    /// An import statement was syntactically broken and was rewritten.
    MalformedImport,
}

/// One applied repair fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    /// What category of repair this was.
    pub kind: FixKind,
    /// Human-readable description of the change.
    pub description: String,
    /// The symbol the fix was about, when applicable.
    pub symbol: Option<String>,
    /// The module source involved, when applicable.
    pub source: Option<String>,
    /// 1-based line the fix refers to (usage site for missing imports,
    /// statement line for malformed ones).
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl Fix {
    /// Builds a missing-import fix for `symbol` resolved from `source`.
    pub fn missing_import(
        symbol: impl Into<String>,
        source: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        let symbol = symbol.into();
        let source = source.into();
        Self {
            kind: FixKind::MissingImport,
            description: format!("imported '{symbol}' from \"{source}\""),
            symbol: Some(symbol),
            source: Some(source),
            line,
            column,
        }
    }

    /// Builds a malformed-import fix for the statement at `line`.
    pub fn malformed_import(source: impl Into<String>, line: usize) -> Self {
        let source = source.into();
        Self {
            kind: FixKind::MalformedImport,
            description: format!("rewrote malformed import of \"{source}\""),
            symbol: None,
            source: Some(source),
            line,
            column: 1,
        }
    }
}
