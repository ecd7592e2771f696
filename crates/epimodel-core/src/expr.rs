//! Symbolic expressions (rate laws, initial values, observables).
//!
//! Expressions are kept as text. The only structure we need is the set of
//! free identifiers and whole-identifier renaming, which is what
//! stratification and parameter lookup rely on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("identifier regex is valid")
});

/// Function and constant names that never denote model symbols.
const BUILTINS: &[&str] = &[
    "exp", "log", "ln", "sqrt", "sin", "cos", "tan", "abs", "Abs", "Max", "Min", "max", "min",
    "pow", "Piecewise", "pi", "E", "Heaviside", "floor", "ceiling",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolicExpr(String);

impl SymbolicExpr {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Free identifiers, excluding known function/constant names.
    pub fn symbols(&self) -> BTreeSet<String> {
        IDENTIFIER
            .find_iter(&self.0)
            .map(|m| m.as_str())
            .filter(|name| !BUILTINS.contains(name))
            .map(String::from)
            .collect()
    }

    pub fn mentions(&self, symbol: &str) -> bool {
        IDENTIFIER
            .find_iter(&self.0)
            .any(|m| m.as_str() == symbol)
    }

    /// Rename whole identifiers; substrings of longer identifiers are untouched.
    pub fn substitute(&self, renames: &BTreeMap<String, String>) -> Self {
        if renames.is_empty() {
            return self.clone();
        }
        let replaced = IDENTIFIER.replace_all(&self.0, |caps: &Captures| {
            let name = &caps[0];
            renames
                .get(name)
                .cloned()
                .unwrap_or_else(|| name.to_string())
        });
        Self(replaced.into_owned())
    }
}

impl fmt::Display for SymbolicExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SymbolicExpr {
    fn from(expression: &str) -> Self {
        Self::new(expression)
    }
}

impl From<String> for SymbolicExpr {
    fn from(expression: String) -> Self {
        Self(expression)
    }
}
