//! Variable store for officebatch scripts
//!
//! The store holds the script scope: a flat name to string map shared by
//! every nested block of a run. Lookups that miss the script scope fall
//! through to the [`EnvironmentContext`].

pub mod environment;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BatchError, Result};

pub use environment::{EnvironmentContext, EnvironmentScope};

// Constant patterns, compile-time verified
#[allow(clippy::expect_used)]
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("constant regex pattern is valid")
});

/// Check a name against `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Script-scoped variables with environment fallback
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: BTreeMap<String, String>,
    environment: EnvironmentContext,
}

impl VariableStore {
    /// Create a store on top of the given environment
    pub fn new(environment: EnvironmentContext) -> Self {
        Self {
            variables: BTreeMap::new(),
            environment,
        }
    }

    /// Store whose exports stay out of the process environment
    pub fn isolated() -> Self {
        Self::new(EnvironmentContext::isolated())
    }

    /// Set a script variable
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        validate_name(name)?;
        self.variables.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Remove a script variable, returning its previous value
    pub fn unset(&mut self, name: &str) -> Option<String> {
        self.variables.remove(name)
    }

    /// Script scope, then environment, then `default`
    pub fn get(&self, name: &str, default: &str) -> String {
        if let Some(value) = self.variables.get(name) {
            return value.clone();
        }
        self.environment
            .get(name)
            .unwrap_or_else(|| default.to_string())
    }

    /// Script-scope value only
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Set a variable and export it through the environment context.
    ///
    /// With a process-scoped context the value persists in the process
    /// environment for the rest of the process lifetime.
    pub fn export(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.set(name, value.clone())?;
        self.environment.export(name, &value);
        Ok(())
    }

    /// Whether the script scope defines `name`
    pub fn has(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// All script-scope variables, in name order
    pub fn list_all(&self) -> Vec<(String, String)> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace every `${NAME}` and `$NAME` reference with its value.
    ///
    /// Unknown names resolve to the empty string.
    pub fn resolve(&self, text: &str) -> String {
        self.resolve_except(text, &[])
    }

    /// Like [`resolve`](Self::resolve), but references to any name in
    /// `unresolved` are left in the text as written.
    pub fn resolve_except(&self, text: &str, unresolved: &[String]) -> String {
        REFERENCE
            .replace_all(text, |caps: &regex::Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                if unresolved.iter().any(|n| n == name) {
                    caps[0].to_string()
                } else {
                    self.get(name, "")
                }
            })
            .into_owned()
    }

    pub fn environment(&self) -> &EnvironmentContext {
        &self.environment
    }

    /// Format the script scope for display
    pub fn display(&self) -> String {
        let mut output = String::new();
        output.push_str("Variables\n");
        output.push_str("---------\n");
        if self.variables.is_empty() {
            output.push_str("(none)\n");
        }
        for (name, value) in &self.variables {
            output.push_str(&format!("  {} = {}\n", name, value));
        }
        output
    }
}

fn validate_name(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(BatchError::Variable(format!(
            "invalid variable name '{}': must match [A-Za-z_][A-Za-z0-9_]*",
            name
        )))
    }
}
