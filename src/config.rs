// Configuration sourced once at startup. The upload token comes from
// `GOFILE_TOKEN`, or from `~/.gofile_token` when the variable is unset.

use log::warn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TOKEN_ENV: &str = "GOFILE_TOKEN";
const TOKEN_FILE: &str = ".gofile_token";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub token: Option<String>,
}

impl Settings {
    /// Read the token from the environment, falling back to the token
    /// file in the home directory.
    pub fn load() -> Self {
        let from_env = std::env::var(TOKEN_ENV).ok();
        Self::from_sources(from_env, token_file().as_deref())
    }

    /// Empty values count as absent. A token file that is missing or
    /// unreadable leaves the token unset; only single-folder uploads need it.
    pub fn from_sources(env_token: Option<String>, token_file: Option<&Path>) -> Self {
        if let Some(token) = non_empty(env_token) {
            return Settings { token: Some(token) };
        }
        let Some(path) = token_file else {
            return Settings::default();
        };
        match fs::read_to_string(path) {
            Ok(contents) => Settings {
                token: non_empty(Some(contents)),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                warn!("Ignoring token file {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Location of the token file, if a home directory is known.
pub fn token_file() -> Option<PathBuf> {
    dirs::home_dir().map(|dir| dir.join(TOKEN_FILE))
}
