//! Config file loading.
//!
//! `.toml` files are parsed as a flat TOML table; anything else is read as
//! dotenv-style `KEY=VALUE` lines. Both produce upper-case keys so that
//! `sleep_period_in_secs = 5` and `SLEEP_PERIOD_IN_SECS=5` are equivalent.

use super::ConfigError;
use std::collections::BTreeMap;
use std::path::Path;

/// Read a config file into upper-case key/value pairs.
pub fn load_config_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        parse_toml(path, &contents)
    } else {
        parse_dotenv(path, &contents)
    }
}

fn parse_toml(path: &Path, contents: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let table: toml::Table = toml::from_str(contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut values = BTreeMap::new();
    for (key, value) in table {
        let rendered = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(n) => n.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => {
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: format!("{key}: expected string, integer or boolean, got {other}"),
                });
            }
        };
        values.insert(key.to_uppercase(), rendered);
    }
    Ok(values)
}

fn parse_dotenv(path: &Path, contents: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut values = BTreeMap::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("line {}: expected KEY=VALUE, got '{}'", idx + 1, raw_line),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("line {}: empty key", idx + 1),
            });
        }
        values.insert(key.to_uppercase(), unquote(value.trim()).to_string());
    }
    Ok(values)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dotenv_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.env");
        std::fs::write(
            &path,
            "# overrides\nSLEEP_PERIOD_IN_SECS=5\n\n\
             export DEPLOYMENT_MESSAGE=\"Nightly run\"\nallow_continue_with_errors = True\n",
        )
        .unwrap();

        let values = load_config_file(&path).unwrap();
        assert_eq!(values["SLEEP_PERIOD_IN_SECS"], "5");
        assert_eq!(values["DEPLOYMENT_MESSAGE"], "Nightly run");
        assert_eq!(values["ALLOW_CONTINUE_WITH_ERRORS"], "True");
    }

    #[test]
    fn test_dotenv_rejects_line_without_equals() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.env");
        std::fs::write(&path, "SLEEP_PERIOD_IN_SECS\n").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_toml_file_keys_are_uppercased() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ltd.toml");
        std::fs::write(
            &path,
            "queue_timeout_in_secs = 60\nredeploy_outdated_apps = false\n\
             deployment_message = \"hi\"\n",
        )
        .unwrap();

        let values = load_config_file(&path).unwrap();
        assert_eq!(values["QUEUE_TIMEOUT_IN_SECS"], "60");
        assert_eq!(values["REDEPLOY_OUTDATED_APPS"], "false");
        assert_eq!(values["DEPLOYMENT_MESSAGE"], "hi");
    }

    #[test]
    fn test_toml_rejects_nested_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ltd.toml");
        std::fs::write(&path, "[pipeline]\nsleep = 1\n").unwrap();

        assert!(matches!(
            load_config_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config_file(Path::new("/nonexistent/ltd.env")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
