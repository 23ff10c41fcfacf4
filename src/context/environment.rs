//! Process environment access for scripts
//!
//! Every read of the environment and every `@export` goes through an
//! [`EnvironmentContext`] so the engine never touches `std::env` behind the
//! caller's back.

use std::collections::BTreeMap;

/// Where `@export` writes land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentScope {
    /// Exports are written into the real process environment and persist
    /// for the remainder of the process, after the script has finished.
    Process,
    /// Exports are kept in this context only. Dispatched commands still see
    /// them, the hosting process does not.
    Isolated,
}

/// Environment seen by a running script
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    scope: EnvironmentScope,
    exported: BTreeMap<String, String>,
}

impl EnvironmentContext {
    /// Context whose exports mutate the process environment.
    ///
    /// Values exported through this context stay set for the lifetime of
    /// the process, are visible to every command dispatched afterwards and
    /// to any other code in the process reading the environment.
    pub fn process() -> Self {
        Self {
            scope: EnvironmentScope::Process,
            exported: BTreeMap::new(),
        }
    }

    /// Context whose exports never leave this value
    pub fn isolated() -> Self {
        Self {
            scope: EnvironmentScope::Isolated,
            exported: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> EnvironmentScope {
        self.scope
    }

    /// Look up a name: values exported by the script win over the
    /// inherited process environment.
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.exported.get(name) {
            return Some(value.clone());
        }
        std::env::var(name).ok()
    }

    /// Record an export, writing through to the process when the scope is
    /// [`EnvironmentScope::Process`].
    pub fn export(&mut self, name: &str, value: &str) {
        if self.scope == EnvironmentScope::Process {
            tracing::info!(name, "exporting variable into process environment");
            std::env::set_var(name, value);
        }
        self.exported.insert(name.to_string(), value.to_string());
    }

    /// Everything exported so far, in name order
    pub fn exported(&self) -> &BTreeMap<String, String> {
        &self.exported
    }
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self::process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_export_does_not_touch_process() {
        let mut env = EnvironmentContext::isolated();
        env.export("OFFICEBATCH_ENV_ISOLATED_TEST", "1");
        assert_eq!(env.get("OFFICEBATCH_ENV_ISOLATED_TEST"), Some("1".to_string()));
        assert!(std::env::var("OFFICEBATCH_ENV_ISOLATED_TEST").is_err());
    }

    #[test]
    fn test_process_export_persists() {
        let mut env = EnvironmentContext::process();
        env.export("OFFICEBATCH_ENV_PROCESS_TEST", "yes");
        drop(env);
        assert_eq!(
            std::env::var("OFFICEBATCH_ENV_PROCESS_TEST").ok(),
            Some("yes".to_string())
        );
        std::env::remove_var("OFFICEBATCH_ENV_PROCESS_TEST");
    }

    #[test]
    fn test_get_falls_back_to_process_environment() {
        std::env::set_var("OFFICEBATCH_ENV_FALLBACK_TEST", "inherited");
        let env = EnvironmentContext::isolated();
        assert_eq!(
            env.get("OFFICEBATCH_ENV_FALLBACK_TEST"),
            Some("inherited".to_string())
        );
        std::env::remove_var("OFFICEBATCH_ENV_FALLBACK_TEST");
    }
}
