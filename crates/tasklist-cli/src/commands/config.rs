//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use tasklist_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "base_url": config.base_url,
                    "timeout_secs": config.timeout_secs,
                    "batch_policy": config.batch_policy,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.base_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  base_url:     {}", config.base_url);
            println!("  timeout_secs: {}", config.timeout_secs);
            println!("  batch_policy: {}", config.batch_policy);
            println!(
                "  log_file:     {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);

    // Edit the file as written; env overrides must not leak into it
    let mut config = Config::load_file(&save_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "base_url" => {
            if value.trim().is_empty() {
                bail!("base_url cannot be empty");
            }
            config.base_url = value.trim().to_string();
        }
        "timeout_secs" => {
            config.timeout_secs = value
                .parse()
                .context("Invalid value for timeout_secs. Use a whole number of seconds.")?;
        }
        "batch_policy" => {
            config.batch_policy = value.parse().map_err(anyhow::Error::msg)?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: base_url, timeout_secs, batch_policy, log_file",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard};

    use tasklist_core::BatchPolicy;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "TASKLIST_BASE_URL",
        "TASKLIST_TIMEOUT_SECS",
        "TASKLIST_BATCH_POLICY",
    ];

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "base_url", "http://tasks.internal:9000").unwrap();
        apply(&mut config, "timeout_secs", "5").unwrap();
        apply(&mut config, "batch_policy", "per_item").unwrap();
        apply(&mut config, "log_file", "/tmp/tasklist.log").unwrap();

        assert_eq!(config.base_url, "http://tasks.internal:9000");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.batch_policy, BatchPolicy::PerItem);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/tasklist.log")));

        apply(&mut config, "log_file", "none").unwrap();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply(&mut config, "timeout_secs", "soon").is_err());
        assert!(apply(&mut config, "batch_policy", "sometimes").is_err());
        assert!(apply(&mut config, "base_url", "  ").is_err());
        assert!(apply(&mut config, "data_dir", "/tmp").is_err());
    }

    #[test]
    fn test_set_writes_config_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "timeout_secs".to_string(),
            "12".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("timeout_secs = 12"));
    }

    #[test]
    fn test_set_keeps_env_overrides_out_of_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        env::set_var("TASKLIST_BASE_URL", "http://from-env:1234");
        env::set_var("TASKLIST_TIMEOUT_SECS", "99");

        set(
            "batch_policy".to_string(),
            "per_item".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let saved = Config::load_file(&path).unwrap();
        assert_eq!(saved.batch_policy, BatchPolicy::PerItem);
        assert_eq!(saved.base_url, "http://localhost:8080");
        assert_eq!(saved.timeout_secs, 30);
    }
}
