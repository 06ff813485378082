//! Configuration file loader.

use std::path::{Path, PathBuf};

use tracing::{info, trace};

use super::schema::JunctionConfig;
use crate::error::{ConfigError, ConfigResult};

const CONFIG_NAMES: [&str; 4] = [
    "junction.yaml",
    "junction.yml",
    ".junction.yaml",
    ".junction.yml",
];

/// Loads `junction.yaml` from a set of search directories.
///
/// [`ConfigLoader::default`] searches the working directory and then the
/// user configuration directory; [`ConfigLoader::new`] starts with no
/// search paths for callers that resolve files themselves.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Appends a directory to search for configuration files.
    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    /// Loads configuration from the first file found in the search paths,
    /// or defaults when none exists.
    pub fn load(&self) -> ConfigResult<JunctionConfig> {
        match self.locate() {
            Some(path) => self.load_from_file(path),
            None => {
                info!("no configuration file found, using defaults");
                Ok(JunctionConfig::default())
            }
        }
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<JunctionConfig> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        info!(path = %path.display(), "loading configuration");
        let raw = std::fs::read_to_string(path)?;
        self.load_from_str(&raw)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<JunctionConfig> {
        let config: JunctionConfig = serde_yaml::from_str(&expand_env_vars(yaml))?;
        validate_config(&config)?;
        Ok(config)
    }

    /// The first configuration file that exists under the search paths.
    fn locate(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .flat_map(|dir| CONFIG_NAMES.iter().map(move |name| dir.join(name)))
            .inspect(|candidate| trace!(path = %candidate.display(), "probing for config file"))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        let mut search_paths = Vec::new();
        search_paths.extend(std::env::current_dir().ok());
        search_paths.extend(dirs::config_dir().map(|dir| dir.join("junction")));
        Self { search_paths }
    }
}

/// Substitutes `${VAR}` and `${VAR:-default}` references with environment
/// values. An unset variable without a default expands to the empty string.
fn expand_env_vars(content: &str) -> String {
    let reference = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid");

    let mut expanded = String::with_capacity(content.len());
    let mut tail = 0;
    for caps in reference.captures_iter(content) {
        let span = caps.get(0).expect("capture 0 is the whole match");
        expanded.push_str(&content[tail..span.start()]);
        match std::env::var(&caps[1]) {
            Ok(value) => expanded.push_str(&value),
            Err(_) => expanded.push_str(caps.get(2).map_or("", |m| m.as_str())),
        }
        tail = span.end();
    }
    expanded.push_str(&content[tail..]);
    expanded
}

fn validate_config(config: &JunctionConfig) -> ConfigResult<()> {
    if config.server.host.is_empty() {
        return Err(ConfigError::Invalid("server.host must not be empty".into()));
    }
    if config.server.port == 0 {
        return Err(ConfigError::Invalid("server.port must not be 0".into()));
    }
    Ok(())
}

/// Convenience function to load configuration with default settings.
pub fn load_config() -> ConfigResult<JunctionConfig> {
    ConfigLoader::default().load()
}

/// Convenience function to load configuration from a specific file.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<JunctionConfig> {
    ConfigLoader::new().load_from_file(path)
}
