//! Typed parsing of configuration overrides.
//!
//! The same parser reads process environment variables (with a prefix
//! such as `LTD_`) and the key/value pairs loaded from a config file, so
//! both layers share validation, error collection and source tracking.

use super::source::{ConfigSource, Sourced};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while parsing an override.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    /// Invalid log level.
    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

enum Lookup {
    Process,
    Vars(BTreeMap<String, String>),
    File {
        path: PathBuf,
        values: BTreeMap<String, String>,
    },
}

/// Type-safe override parser.
///
/// Collects errors during parsing so all issues can be reported at once.
/// Every getter takes the value resolved so far and returns it unchanged
/// when the key is absent, which lets callers stack layers.
pub struct EnvParser {
    prefix: &'static str,
    lookup: Lookup,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Parser over the process environment with the given prefix.
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            lookup: Lookup::Process,
            errors: Vec::new(),
        }
    }

    /// Parser over a fixed set of variables, reported as env sources.
    pub fn from_vars(prefix: &'static str, vars: BTreeMap<String, String>) -> Self {
        Self {
            prefix,
            lookup: Lookup::Vars(vars),
            errors: Vec::new(),
        }
    }

    /// Parser over values loaded from a config file (no prefix).
    pub fn from_file(path: PathBuf, values: BTreeMap<String, String>) -> Self {
        Self {
            prefix: "",
            lookup: Lookup::File { path, values },
            errors: Vec::new(),
        }
    }

    /// Get all accumulated errors.
    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Get the full variable name with prefix.
    fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn raw(&self, name: &str) -> Option<(String, String, ConfigSource)> {
        let var_name = self.var_name(name);
        let (value, source) = match &self.lookup {
            Lookup::Process => {
                let value = env::var(&var_name).ok()?;
                (value, ConfigSource::Env(var_name.clone()))
            }
            Lookup::Vars(vars) => {
                let value = vars.get(&var_name)?.clone();
                (value, ConfigSource::Env(var_name.clone()))
            }
            Lookup::File { path, values } => {
                let value = values.get(&var_name)?.clone();
                (value, ConfigSource::File(path.clone()))
            }
        };
        Some((var_name, value, source))
    }

    /// Get a string value, keeping `current` when unset.
    pub fn get_string(&mut self, name: &str, current: Sourced<String>) -> Sourced<String> {
        match self.raw(name) {
            Some((_, value, source)) => Sourced::with_source(value, source),
            None => current,
        }
    }

    /// Get a boolean value, keeping `current` when unset.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off (for false)
    pub fn get_bool(&mut self, name: &str, current: Sourced<bool>) -> Sourced<bool> {
        let Some((var_name, value, source)) = self.raw(name) else {
            return current;
        };
        match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Sourced::with_source(true, source),
            "0" | "false" | "no" | "off" => Sourced::with_source(false, source),
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                current
            }
        }
    }

    /// Get a u64 value with range validation, keeping `current` when unset
    /// or invalid.
    pub fn get_u64_range(
        &mut self,
        name: &str,
        current: Sourced<u64>,
        min: u64,
        max: u64,
    ) -> Sourced<u64> {
        let Some((var_name, value, source)) = self.raw(name) else {
            return current;
        };
        match value.trim().parse::<u64>() {
            Ok(n) if n >= min && n <= max => Sourced::with_source(n, source),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                current
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                current
            }
        }
    }

    /// Get a u32 value with range validation.
    pub fn get_u32_range(
        &mut self,
        name: &str,
        current: Sourced<u32>,
        min: u32,
        max: u32,
    ) -> Sourced<u32> {
        let widened = Sourced::with_source(u64::from(current.value), current.source.clone());
        let parsed = self.get_u64_range(name, widened, u64::from(min), u64::from(max));
        match u32::try_from(parsed.value) {
            Ok(value) => Sourced::with_source(value, parsed.source),
            Err(_) => current,
        }
    }

    /// Get a log level value with validation.
    pub fn get_log_level(&mut self, name: &str, current: Sourced<String>) -> Sourced<String> {
        let Some((var_name, value, source)) = self.raw(name) else {
            return current;
        };
        let lower = value.to_lowercase();
        match lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => {
                Sourced::with_source(lower, source)
            }
            _ => {
                self.errors.push(EnvError::InvalidLogLevel {
                    var: var_name,
                    value,
                });
                current
            }
        }
    }

    /// Get an optional string (None if empty).
    pub fn get_optional_string(
        &mut self,
        name: &str,
        current: Sourced<Option<String>>,
    ) -> Sourced<Option<String>> {
        match self.raw(name) {
            Some((_, value, source)) if value.is_empty() => Sourced::with_source(None, source),
            Some((_, value, source)) => Sourced::with_source(Some(value), source),
            None => current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_get_bool_true_values() {
        for val in &["1", "true", "yes", "on", "TRUE", "Yes"] {
            let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_FLAG", val)]));
            let result = parser.get_bool("FLAG", Sourced::default_value(false));
            assert!(result.value, "Expected true for '{}'", val);
            assert_eq!(result.source, ConfigSource::Env("LTD_FLAG".into()));
            assert!(!parser.has_errors());
        }
    }

    #[test]
    fn test_get_bool_false_values() {
        for val in &["0", "false", "no", "off", "FALSE", "False"] {
            let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_FLAG", val)]));
            let result = parser.get_bool("FLAG", Sourced::default_value(true));
            assert!(!result.value, "Expected false for '{}'", val);
            assert!(!parser.has_errors());
        }
    }

    #[test]
    fn test_get_bool_invalid_keeps_current() {
        let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_FLAG", "maybe")]));
        let result = parser.get_bool("FLAG", Sourced::default_value(true));
        assert!(result.value);
        assert_eq!(result.source, ConfigSource::Default);
        assert!(parser.has_errors());
    }

    #[test]
    fn test_get_u64_range_valid() {
        let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_SLEEP", "5")]));
        let result = parser.get_u64_range("SLEEP", Sourced::default_value(20), 1, 100);
        assert_eq!(result.value, 5);
        assert!(!parser.has_errors());
    }

    #[test]
    fn test_get_u64_range_out_of_range() {
        let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_SLEEP", "0")]));
        let result = parser.get_u64_range("SLEEP", Sourced::default_value(20), 1, 100);
        assert_eq!(result.value, 20);
        assert!(matches!(parser.errors()[0], EnvError::OutOfRange { .. }));
    }

    #[test]
    fn test_get_u64_not_a_number() {
        let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_SLEEP", "soon")]));
        parser.get_u64_range("SLEEP", Sourced::default_value(20), 1, 100);
        let errors = parser.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "Invalid value for LTD_SLEEP: expected unsigned 64-bit integer, got 'soon'"
        );
        assert!(!parser.has_errors());
    }

    #[test]
    fn test_file_values_report_file_source() {
        let path = PathBuf::from("pipeline.env");
        let mut parser = EnvParser::from_file(path.clone(), vars(&[("SLEEP", "3")]));
        let result = parser.get_u64_range("SLEEP", Sourced::default_value(20), 1, 100);
        assert_eq!(result.value, 3);
        assert_eq!(result.source, ConfigSource::File(path));
    }

    #[test]
    fn test_missing_key_keeps_current_source() {
        let mut parser = EnvParser::from_vars("LTD_", BTreeMap::new());
        let current = Sourced::from_file("note".to_string(), "cfg.toml");
        let result = parser.get_string("MESSAGE", current.clone());
        assert_eq!(result, current);
    }

    #[test]
    fn test_log_level_validation() {
        let mut parser = EnvParser::from_vars("LTD_", vars(&[("LTD_LOG_LEVEL", "LOUD")]));
        let result = parser.get_log_level("LOG_LEVEL", Sourced::default_value("info".into()));
        assert_eq!(result.value, "info");
        assert!(matches!(parser.errors()[0], EnvError::InvalidLogLevel { .. }));
    }
}
