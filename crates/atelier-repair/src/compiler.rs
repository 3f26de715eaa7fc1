//! The source repair compiler.
//!
//! Repairs freshly generated source before execution: strips conversational
//! wrapping, parses, inserts imports for recognized unbound symbols and
//! rewrites malformed import statements. Repair is best-effort and strictly
//! additive: it never blocks the pipeline and never touches usage sites, so
//! a partially wrong render is always preferred over no render.

use crate::ast::{ImportDecl, Module, ParseResult};
use crate::fix::Fix;
use crate::parser::parse;
use crate::rules::{AMBIENT_GLOBALS, ImportKind, RuleSet};
use crate::strip::strip_wrapping;
use atelier_core::dialect::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Result of one repair pass.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// The repaired (or best-effort cleaned) source.
    pub code: String,
    /// Fixes actually present in `code`, in application order.
    pub fixes: Vec<Fix>,
    /// Whether the returned source parsed cleanly.
    pub parse_ok: bool,
    /// Syntax errors observed on the returned source, if any.
    pub errors: Vec<String>,
}

/// Deterministic, best-effort repair of generated source.
#[derive(Debug, Clone)]
pub struct RepairCompiler {
    rules: RuleSet,
}

impl Default for RepairCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairCompiler {
    /// Compiler with the standard rule table.
    pub fn new() -> Self {
        Self {
            rules: RuleSet::standard(),
        }
    }

    /// Compiler with a caller-supplied rule table.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Parses source for the given dialect without repairing it.
    pub fn parse_source(source: &str, dialect: Dialect) -> ParseResult {
        match dialect {
            Dialect::ComponentMarkup => parse(source),
            Dialect::PlainMarkup => plain_parse(source),
        }
    }

    /// Repairs `source`. Infallible: the worst case returns the
    /// fence-stripped input unchanged with an empty fix list.
    pub fn repair(&self, source: &str, dialect: Dialect) -> RepairOutcome {
        let stripped = strip_wrapping(source, dialect);

        if dialect == Dialect::PlainMarkup {
            let result = plain_parse(&stripped);
            return RepairOutcome {
                code: stripped,
                fixes: Vec::new(),
                parse_ok: result.success,
                errors: result.errors,
            };
        }

        let mut fixes = Vec::new();
        let mut working = stripped;
        let mut result = parse(&working);

        // Malformed imports with a recoverable specifier are rewritten
        // first; that often unlocks the binding pass below.
        if !result.success {
            if let Some((rewritten, applied)) = self.rewrite_malformed_imports(&working, &result) {
                let reparsed = parse(&rewritten);
                if reparsed.errors.len() < result.errors.len() {
                    working = rewritten;
                    result = reparsed;
                    fixes.extend(applied);
                }
            }
        }

        if !result.success {
            debug!(errors = ?result.errors, "repair: parse failed, returning best-effort cleanup");
            return RepairOutcome {
                code: working,
                fixes,
                parse_ok: false,
                errors: result.errors,
            };
        }

        let Some(module) = result.module.as_ref() else {
            return RepairOutcome {
                code: working,
                fixes,
                parse_ok: true,
                errors: Vec::new(),
            };
        };
        let (inserted, import_fixes) = self.insert_missing_imports(&working, module);
        if import_fixes.is_empty() {
            return RepairOutcome {
                code: working,
                fixes,
                parse_ok: true,
                errors: Vec::new(),
            };
        }

        // Sanity re-parse; on regression keep the pre-insertion version.
        let reparsed = parse(&inserted);
        if !reparsed.success {
            debug!(errors = ?reparsed.errors, "repair: fix application regressed the parse, reverting");
            return RepairOutcome {
                code: working,
                fixes,
                parse_ok: true,
                errors: Vec::new(),
            };
        }

        fixes.extend(import_fixes);
        RepairOutcome {
            code: inserted,
            fixes,
            parse_ok: true,
            errors: Vec::new(),
        }
    }

    /// Rewrites imports whose module specifier lost its quotes. Returns the
    /// rewritten source and the fixes, or `None` when nothing is recoverable.
    fn rewrite_malformed_imports(
        &self,
        source: &str,
        result: &ParseResult,
    ) -> Option<(String, Vec<Fix>)> {
        let module = result.module.as_ref()?;
        let recoverable: Vec<&ImportDecl> = module
            .imports
            .iter()
            .filter(|import| !import.valid && !import.quoted && !import.source.is_empty())
            .collect();
        if recoverable.is_empty() {
            return None;
        }

        let mut lines: Vec<String> = source.split('\n').map(str::to_string).collect();
        let mut rendered: Vec<(usize, usize, String)> = Vec::new();
        let mut fixes = Vec::new();
        for import in recoverable {
            let mut fixed = import.clone();
            fixed.quoted = true;
            fixed.valid = true;
            rendered.push((import.start_line, import.end_line, fixed.render()));
            fixes.push(Fix::malformed_import(&import.source, import.start_line));
        }

        // Bottom-up so earlier line numbers stay valid.
        rendered.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end, text) in &rendered {
            replace_line_range(&mut lines, *start, *end, text);
        }
        Some((lines.join("\n"), fixes))
    }

    /// Inserts imports for recognized free identifiers. Returns the new
    /// source and one fix per resolved symbol.
    fn insert_missing_imports(&self, source: &str, module: &Module) -> (String, Vec<Fix>) {
        // First reference per unbound name, in source order.
        let mut seen = std::collections::HashSet::new();
        let mut missing = Vec::new();
        for reference in &module.references {
            if !seen.insert(reference.name.as_str()) {
                continue;
            }
            if module.binds(&reference.name) || AMBIENT_GLOBALS.contains(reference.name.as_str()) {
                continue;
            }
            if let Some(rule) = self.rules.lookup(&reference.name) {
                missing.push((reference.clone(), rule.clone()));
            }
        }
        if missing.is_empty() {
            return (source.to_string(), Vec::new());
        }

        // Group resolved symbols by providing module, keeping source order.
        let mut groups: Vec<(String, Vec<(crate::ast::IdentRef, ImportKind)>)> = Vec::new();
        let mut fixes = Vec::new();
        for (reference, rule) in missing {
            fixes.push(Fix::missing_import(
                &rule.symbol,
                &rule.module,
                reference.line,
                reference.column,
            ));
            match groups.iter_mut().find(|(module, _)| *module == rule.module) {
                Some((_, entries)) => entries.push((reference, rule.kind)),
                None => groups.push((rule.module.clone(), vec![(reference, rule.kind)])),
            }
        }

        let mut lines: Vec<String> = source.split('\n').map(str::to_string).collect();
        let mut merges: Vec<(usize, usize, String)> = Vec::new();
        let mut additions: Vec<String> = Vec::new();

        for (module_source, entries) in groups {
            let existing = module
                .imports
                .iter()
                .find(|import| import.valid && import.source == module_source);
            match existing {
                Some(import) => {
                    let mut merged = import.clone();
                    apply_symbols(&mut merged, &entries);
                    merges.push((import.start_line, import.end_line, merged.render()));
                }
                None => {
                    let mut fresh = ImportDecl {
                        start_line: 0,
                        end_line: 0,
                        source: module_source,
                        quoted: true,
                        default: None,
                        namespace: None,
                        named: Vec::new(),
                        valid: true,
                    };
                    apply_symbols(&mut fresh, &entries);
                    additions.push(fresh.render());
                }
            }
        }

        merges.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end, text) in &merges {
            replace_line_range(&mut lines, *start, *end, text);
        }

        if !additions.is_empty() {
            // New imports land after the existing import section, or at the
            // very top when there is none. Deterministic order.
            additions.sort();
            let insert_at = module.import_section_end();
            for (offset, line) in additions.into_iter().enumerate() {
                lines.insert(insert_at + offset, line);
            }
        }

        (lines.join("\n"), fixes)
    }

    /// Detects the likely root component name, defaulting to `App`.
    pub fn detect_component_name(source: &str) -> String {
        for pattern in COMPONENT_NAME_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(source) {
                return caps[1].to_string();
            }
        }
        "App".to_string()
    }
}

fn apply_symbols(import: &mut ImportDecl, entries: &[(crate::ast::IdentRef, ImportKind)]) {
    for (reference, kind) in entries {
        match kind {
            ImportKind::Named => {
                if !import.named.contains(&reference.name) {
                    import.named.push(reference.name.clone());
                }
            }
            ImportKind::Default => {
                if import.default.is_none() {
                    import.default = Some(reference.name.clone());
                }
            }
            ImportKind::Namespace => {
                if import.namespace.is_none() {
                    import.namespace = Some(reference.name.clone());
                }
            }
        }
    }
}

/// Replaces the 1-based inclusive line range with a single line of text.
fn replace_line_range(lines: &mut Vec<String>, start: usize, end: usize, text: &str) {
    if start == 0 || start > lines.len() {
        return;
    }
    let end = end.min(lines.len());
    lines.splice(start - 1..end, [text.to_string()]);
}

/// Best-effort check that plain markup is a renderable document.
fn plain_parse(source: &str) -> ParseResult {
    let trimmed = source.trim_start();
    let mut errors = Vec::new();
    if trimmed.is_empty() {
        errors.push("empty document".to_string());
    } else if !trimmed.starts_with('<') {
        errors.push("document does not start with markup".to_string());
    }
    ParseResult {
        success: errors.is_empty(),
        module: None,
        errors,
    }
}

static COMPONENT_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"export\s+default\s+function\s+([A-Z][A-Za-z0-9]*)",
        r"export\s+default\s+([A-Z][A-Za-z0-9]*)",
        r"const\s+([A-Z][A-Za-z0-9]*)\s*[:=][^;\n]*=>",
        r"function\s+([A-Z][A-Za-z0-9]*)\s*\(",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("component-name patterns are valid"))
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "import React, { useState } from \"react\";\n\nexport default function Counter() {\n  const [count, setCount] = useState(0);\n  return <button onClick={() => setCount(count + 1)}>{count}</button>;\n}\n";

    #[test]
    fn test_clean_source_round_trips_unchanged() {
        let compiler = RepairCompiler::new();
        let outcome = compiler.repair(CLEAN, Dialect::ComponentMarkup);
        assert_eq!(outcome.code, CLEAN);
        assert!(outcome.fixes.is_empty());
        assert!(outcome.parse_ok);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let compiler = RepairCompiler::new();
        let broken = "export default function Counter() {\n  const [count, setCount] = useState(0);\n  return <div>{count}</div>;\n}\n";
        let once = compiler.repair(broken, Dialect::ComponentMarkup);
        let twice = compiler.repair(&once.code, Dialect::ComponentMarkup);
        assert_eq!(once.code, twice.code);
        assert!(twice.fixes.is_empty());
    }

    #[test]
    fn test_inserts_missing_hook_import() {
        let compiler = RepairCompiler::new();
        let broken = "export default function Counter() {\n  const [count, setCount] = useState(0);\n  return <div>{count}</div>;\n}\n";
        let outcome = compiler.repair(broken, Dialect::ComponentMarkup);
        assert!(outcome.code.starts_with("import { useState } from \"react\";"));
        assert_eq!(outcome.fixes.len(), 1);
        assert_eq!(outcome.fixes[0].symbol.as_deref(), Some("useState"));
        // Usage site location is reported.
        assert_eq!(outcome.fixes[0].line, 2);
    }

    #[test]
    fn test_merges_into_existing_import() {
        let compiler = RepairCompiler::new();
        let broken = "import { useState } from \"react\";\n\nexport default function Clock() {\n  const [now, setNow] = useState(0);\n  useEffect(() => {}, []);\n  return <div>{now}</div>;\n}\n";
        let outcome = compiler.repair(broken, Dialect::ComponentMarkup);
        assert!(
            outcome
                .code
                .starts_with("import { useState, useEffect } from \"react\";")
        );
        // No duplicate react import.
        assert_eq!(outcome.code.matches("from \"react\"").count(), 1);
    }

    #[test]
    fn test_groups_symbols_from_different_modules() {
        let compiler = RepairCompiler::new();
        let broken = "export default function Page() {\n  const [open, setOpen] = useState(false);\n  return <AnimatePresence>{open && <motion.div/>}</AnimatePresence>;\n}\n";
        let outcome = compiler.repair(broken, Dialect::ComponentMarkup);
        assert!(
            outcome
                .code
                .contains("import { AnimatePresence, motion } from \"framer-motion\";")
        );
        assert!(outcome.code.contains("import { useState } from \"react\";"));
        assert_eq!(outcome.fixes.len(), 3);
    }

    #[test]
    fn test_rewrites_unquoted_import_specifier() {
        let compiler = RepairCompiler::new();
        let broken = "import { useState } from react;\n\nexport default function App() {\n  const [n] = useState(0);\n  return <div>{n}</div>;\n}\n";
        let outcome = compiler.repair(broken, Dialect::ComponentMarkup);
        assert!(
            outcome
                .code
                .starts_with("import { useState } from \"react\";")
        );
        assert!(outcome.parse_ok);
        assert!(
            outcome
                .fixes
                .iter()
                .any(|f| f.kind == crate::fix::FixKind::MalformedImport)
        );
    }

    #[test]
    fn test_unparseable_source_returns_stripped_input() {
        let compiler = RepairCompiler::new();
        let broken = "function App() { return <div>\n"; // unbalanced brace
        let outcome = compiler.repair(broken, Dialect::ComponentMarkup);
        assert_eq!(outcome.code, broken);
        assert!(!outcome.parse_ok);
        assert!(outcome.fixes.is_empty());
    }

    #[test]
    fn test_unknown_free_identifiers_are_left_alone() {
        let compiler = RepairCompiler::new();
        let source = "export default function App() {\n  return <div>{mysteryHelper()}</div>;\n}\n";
        let outcome = compiler.repair(source, Dialect::ComponentMarkup);
        assert_eq!(outcome.code, source);
        assert!(outcome.fixes.is_empty());
        assert!(outcome.parse_ok);
    }

    #[test]
    fn test_strips_fences_before_analysis() {
        let compiler = RepairCompiler::new();
        let wrapped = "Here you go:\n```tsx\nexport default function App() {\n  const [n] = useState(0);\n  return <div>{n}</div>;\n}\n```\nEnjoy!";
        let outcome = compiler.repair(wrapped, Dialect::ComponentMarkup);
        assert!(outcome.code.starts_with("import { useState } from \"react\";"));
        assert!(!outcome.code.contains("```"));
    }

    #[test]
    fn test_plain_markup_only_strips() {
        let compiler = RepairCompiler::new();
        let wrapped = "```html\n<!DOCTYPE html>\n<html><body>useState</body></html>\n```";
        let outcome = compiler.repair(wrapped, Dialect::PlainMarkup);
        assert!(outcome.code.starts_with("<!DOCTYPE html>"));
        assert!(outcome.fixes.is_empty());
        assert!(outcome.parse_ok);
    }

    #[test]
    fn test_detect_component_name() {
        assert_eq!(
            RepairCompiler::detect_component_name("export default function TodoList() {}"),
            "TodoList"
        );
        assert_eq!(
            RepairCompiler::detect_component_name("const Dashboard = () => <div/>;"),
            "Dashboard"
        );
        assert_eq!(RepairCompiler::detect_component_name("let x = 1;"), "App");
    }

    #[test]
    fn test_ambient_globals_never_fixed() {
        let compiler = RepairCompiler::new();
        let source =
            "export default function App() {\n  console.log(window.location);\n  return null;\n}\n";
        let outcome = compiler.repair(source, Dialect::ComponentMarkup);
        assert!(outcome.fixes.is_empty());
        assert_eq!(outcome.code, source);
    }
}
