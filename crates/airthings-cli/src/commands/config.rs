//! Config command implementation.

use std::path::Path;

use anyhow::{Result, bail};

use crate::cli::{ConfigAction, ConfigKey};
use crate::config::Config;

pub fn cmd_config(action: ConfigAction, quiet: bool) -> Result<()> {
    run_config(action, &Config::path(), quiet)
}

/// Apply a config action to the file at `path`.
pub(crate) fn run_config(action: ConfigAction, path: &Path, quiet: bool) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let config = Config::load_from(path);
            let content = toml::to_string_pretty(&config)?;
            if !quiet {
                println!("# {}", path.display());
            }
            print!("{}", content);
        }
        ConfigAction::Get { key } => {
            let config = Config::load_from(path);
            match config.get(key) {
                Some(value) => println!("{}", value),
                None => {
                    if !quiet {
                        eprintln!("{} is not set", key_name(key));
                    }
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(path);
            config.set(key, &value)?;
            config.save_to(path)?;
            if !quiet {
                eprintln!("Set {} = {}", key_name(key), value);
            }
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load_from(path);
            config.unset(key);
            config.save_to(path)?;
            if !quiet {
                eprintln!("Unset {}", key_name(key));
            }
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save_to(path)?;
            if !quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

fn key_name(key: ConfigKey) -> String {
    use clap::ValueEnum;
    key.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_else(|| format!("{:?}", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_unset_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        run_config(
            ConfigAction::Set {
                key: ConfigKey::FetchAttempts,
                value: "4".to_string(),
            },
            &path,
            true,
        )
        .unwrap();
        assert_eq!(Config::load_from(&path).acquisition.fetch_attempts, Some(4));

        run_config(
            ConfigAction::Unset {
                key: ConfigKey::FetchAttempts,
            },
            &path,
            true,
        )
        .unwrap();
        assert_eq!(Config::load_from(&path).acquisition.fetch_attempts, None);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        run_config(ConfigAction::Init { force: false }, &path, true).unwrap();
        assert!(path.exists());
        assert!(run_config(ConfigAction::Init { force: false }, &path, true).is_err());
        assert!(run_config(ConfigAction::Init { force: true }, &path, true).is_ok());
    }

    #[test]
    fn test_set_invalid_value_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let result = run_config(
            ConfigAction::Set {
                key: ConfigKey::ConnectAttempts,
                value: "zero".to_string(),
            },
            &path,
            true,
        );
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_key_name_is_kebab_case() {
        assert_eq!(key_name(ConfigKey::ReconnectSleep), "reconnect-sleep");
    }
}
