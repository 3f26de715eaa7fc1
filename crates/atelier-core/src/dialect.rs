//! Target source dialects for generation and repair.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The declared source format being generated, repaired and rendered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Dialect {
    /// Component markup: markup mixed with expressions, compiled by an
    /// out-of-process compiler before execution.
    #[default]
    ComponentMarkup,
    /// Plain markup: a self-contained document injected directly into the
    /// execution context.
    PlainMarkup,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_dialect_round_trips_through_strum() {
        assert_eq!(Dialect::ComponentMarkup.to_string(), "component-markup");
        assert_eq!(
            Dialect::from_str("plain-markup").unwrap(),
            Dialect::PlainMarkup
        );
    }

    #[test]
    fn test_dialect_serde_uses_kebab_case() {
        let json = serde_json::to_string(&Dialect::PlainMarkup).unwrap();
        assert_eq!(json, "\"plain-markup\"");
    }
}
