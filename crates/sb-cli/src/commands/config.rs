//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use sb_core::config::{self, ConfigFile};

use super::effective_config_path;
use crate::output::{print_error, print_info, print_success};

/// Read the config file as a raw table, or the defaults when it is missing
fn read_table(path: &Path) -> Result<toml::Table> {
    if !path.exists() {
        let defaults = toml::to_string(&ConfigFile::default())?;
        return Ok(toml::from_str(&defaults)?);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Value at a dotted key path such as `bridge.api_url`
fn lookup<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let mut parts = key.split('.');
    let mut current = table.get(parts.next()?)?;
    for part in parts {
        current = current.as_table()?.get(part)?;
    }
    Some(current)
}

/// Parse a command-line value into the closest TOML type
fn parse_value(value: &str) -> toml::Value {
    if value == "true" {
        toml::Value::Boolean(true)
    } else if value == "false" {
        toml::Value::Boolean(false)
    } else if let Ok(i) = value.parse::<i64>() {
        toml::Value::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        toml::Value::Float(f)
    } else {
        toml::Value::String(value.to_string())
    }
}

/// Set a dotted key, creating intermediate tables
fn assign(table: &mut toml::Table, key: &str, value: toml::Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let (last, parents) = parts
        .split_last()
        .filter(|(last, _)| !last.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid key: {}", key))?;

    let mut current = table;
    for part in parents {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("Cannot navigate to key: {}", key))?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Get a config value by key
pub fn config_get(config_path: Option<&Path>, key: &str) -> Result<()> {
    let path = effective_config_path(config_path);
    let table = read_table(&path)?;

    match lookup(&table, key) {
        Some(toml::Value::String(s)) => println!("{}", s),
        Some(toml::Value::Table(t)) => println!("{}", toml::to_string_pretty(t)?),
        Some(value) => println!("{}", value),
        None => anyhow::bail!("Key not found: {}", key),
    }
    Ok(())
}

/// Set a config value by key.
///
/// The result must still be a valid configuration before it is written.
pub fn config_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = effective_config_path(config_path);
    let mut table = read_table(&path)?;
    assign(&mut table, key, parse_value(value))?;

    let content = toml::to_string_pretty(&table)?;
    let parsed: ConfigFile = toml::from_str(&content).map_err(|e| {
        print_error(&format!("Rejected {} = {}", key, value));
        anyhow::anyhow!("Invalid configuration: {}", e)
    })?;
    config::save_config(&path, &parsed)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Show the effective configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = effective_config_path(config_path);
    let config = if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
        config::load_config::<ConfigFile>(&path)?
    } else {
        print_info(&format!("No configuration file at {:?}, showing defaults", path));
        ConfigFile::default()
    };
    println!();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Print the config file path
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", effective_config_path(config_path).display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_dotted_key() {
        let table = read_table(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(
            lookup(&table, "bridge.production_marker").and_then(|v| v.as_str()),
            Some("PROD")
        );
        assert_eq!(
            lookup(&table, "transfer.settle_delay_ms").and_then(|v| v.as_integer()),
            Some(1000)
        );
        assert!(lookup(&table, "bridge.nope").is_none());
        assert!(lookup(&table, "bridge.api_url.deeper").is_none());
    }

    #[test]
    fn test_set_writes_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        config_set(Some(&path), "bridge.production_marker", "LIVE").unwrap();
        config_set(Some(&path), "transfer.max_in_flight_chunks", "4").unwrap();

        let loaded: ConfigFile = config::load_config(&path).unwrap();
        assert_eq!(loaded.bridge.production_marker, "LIVE");
        assert_eq!(loaded.transfer.max_in_flight_chunks, Some(4));
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(config_set(Some(&path), "bridge.connect_timeout", "soon").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_assign_rejects_empty_key() {
        let mut table = toml::Table::new();
        assert!(assign(&mut table, "bridge.", toml::Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("20"), toml::Value::Integer(20));
        assert_eq!(parse_value("wss://x"), toml::Value::String("wss://x".to_string()));
    }
}
