//! Pluggable missing-import rules.
//!
//! Binding repair is driven by a table mapping well-known symbols to the
//! module that provides them. The traversal never hard-codes a symbol:
//! extending coverage means adding a rule here or supplying a custom
//! [`RuleSet`] to the compiler.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// How a symbol is imported from its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import { symbol } from "module";`
    Named,
    /// `import symbol from "module";`
    Default,
    /// `import * as symbol from "module";`
    Namespace,
}

/// One (symbol → module) resolution rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRule {
    /// The free identifier this rule recognizes.
    pub symbol: String,
    /// The module specifier that provides it.
    pub module: String,
    /// Import form to generate.
    pub kind: ImportKind,
}

/// A lookup table of fix rules keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, FixRule>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in rule set covering the symbols generators most commonly
    /// reference without importing.
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    /// Adds or replaces a rule.
    pub fn with_rule(
        mut self,
        symbol: impl Into<String>,
        module: impl Into<String>,
        kind: ImportKind,
    ) -> Self {
        let symbol = symbol.into();
        self.rules.insert(
            symbol.clone(),
            FixRule {
                symbol,
                module: module.into(),
                kind,
            },
        );
        self
    }

    /// Looks a symbol up.
    pub fn lookup(&self, symbol: &str) -> Option<&FixRule> {
        self.rules.get(symbol)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

static STANDARD: Lazy<RuleSet> = Lazy::new(|| {
    let mut set = RuleSet::empty();
    set = set.with_rule("React", "react", ImportKind::Default);
    for hook in [
        "useState",
        "useEffect",
        "useRef",
        "useMemo",
        "useCallback",
        "useContext",
        "useReducer",
        "useLayoutEffect",
        "useTransition",
        "useId",
    ] {
        set = set.with_rule(hook, "react", ImportKind::Named);
    }
    set = set.with_rule("createRoot", "react-dom/client", ImportKind::Named);
    for symbol in ["motion", "AnimatePresence"] {
        set = set.with_rule(symbol, "framer-motion", ImportKind::Named);
    }
    for chart in [
        "ResponsiveContainer",
        "LineChart",
        "BarChart",
        "AreaChart",
        "PieChart",
        "Line",
        "Bar",
        "Area",
        "Pie",
        "Cell",
        "XAxis",
        "YAxis",
        "CartesianGrid",
        "Tooltip",
        "Legend",
    ] {
        set = set.with_rule(chart, "recharts", ImportKind::Named);
    }
    set = set.with_rule("clsx", "clsx", ImportKind::Default);
    set = set.with_rule("axios", "axios", ImportKind::Default);
    set = set.with_rule("dayjs", "dayjs", ImportKind::Default);
    set = set.with_rule("_", "lodash", ImportKind::Default);
    set = set.with_rule("d3", "d3", ImportKind::Namespace);
    set
});

/// Names that exist in the sandboxed global scope without any import,
/// including the injected model-call proxy.
pub static AMBIENT_GLOBALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "console",
        "window",
        "document",
        "navigator",
        "location",
        "history",
        "localStorage",
        "sessionStorage",
        "fetch",
        "setTimeout",
        "setInterval",
        "clearTimeout",
        "clearInterval",
        "requestAnimationFrame",
        "cancelAnimationFrame",
        "alert",
        "confirm",
        "prompt",
        "Math",
        "JSON",
        "Object",
        "Array",
        "String",
        "Number",
        "Boolean",
        "Date",
        "RegExp",
        "Promise",
        "Set",
        "Map",
        "WeakMap",
        "WeakSet",
        "Symbol",
        "Error",
        "TypeError",
        "RangeError",
        "URL",
        "URLSearchParams",
        "Blob",
        "FormData",
        "AbortController",
        "Intl",
        "parseInt",
        "parseFloat",
        "isNaN",
        "isFinite",
        "encodeURIComponent",
        "decodeURIComponent",
        "structuredClone",
        "crypto",
        "performance",
        "event",
        "arguments",
        // Injected by the sandbox bridge before load.
        "llm",
        "llmStream",
    ]
    .into_iter()
    .collect()
});
