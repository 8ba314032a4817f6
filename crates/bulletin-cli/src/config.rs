use std::path::Path;
use std::{env, fs};

use bulletin_editor_core::EditorConfig;
use bulletin_editor_media::MediaPolicy;
use miette::miette;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub editor: EditorConfig,
    pub media: MediaPolicy,
}

impl Config {
    pub fn load(config_file: &Path) -> miette::Result<Config> {
        let config_string = fs::read_to_string(config_file)
            .map_err(|e| miette!("error reading config file {}: {}", config_file.display(), e))?;
        Self::parse(&config_string, env::vars())
    }

    /// Parse TOML after substituting `$NAME` for each variable in `vars`.
    pub fn parse(
        config_string: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> miette::Result<Config> {
        let mut config_string = config_string.to_owned();
        // Longest names first, so $HOME_DIR is not eaten by $HOME.
        let mut vars: Vec<_> = vars.into_iter().collect();
        vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        for (k, v) in vars {
            config_string = config_string.replace(&format!("${}", k), &v);
        }

        toml::from_str(&config_string).map_err(|e| miette!("error parsing config file {}", e))
    }
}
