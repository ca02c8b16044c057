use serde::Deserialize;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::error::{Error, Result};

/// Resolved paths for one run. Precedence: command-line flags, then
/// ~/.config/snapvault/config.toml, then platform defaults.
pub struct Config {
    pub db_path: PathBuf,
    pub registry_path: PathBuf,
    pub state_path: Option<PathBuf>,
}

/// Shape of the optional config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
    /// File whose contents are captured and restored as live state.
    state_path: Option<PathBuf>,
    /// Override for the data directory holding the database and registry.
    data_dir: Option<PathBuf>,
}

fn load_config_file() -> ConfigFile {
    let Some(dirs) = directories::ProjectDirs::from("", "", "snapvault") else {
        return ConfigFile::default();
    };

    let path = dirs.config_dir().join("config.toml");
    match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring malformed {}: {e}", path.display());
            ConfigFile::default()
        }),
        Err(_) => ConfigFile::default(),
    }
}

impl Config {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = load_config_file();

        let data_dir = match cli.data_dir.clone().or(file.data_dir) {
            Some(dir) => dir,
            None => directories::ProjectDirs::from("", "", "snapvault")
                .ok_or_else(|| {
                    Error::Io(std::io::Error::other("could not determine data directory"))
                })?
                .data_dir()
                .to_path_buf(),
        };

        Ok(Config {
            db_path: data_dir.join("vault.db"),
            registry_path: data_dir.join("registry.json"),
            state_path: cli.state.clone().or(file.state_path),
        })
    }
}
