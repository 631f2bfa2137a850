use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use log::{debug, info, warn};
use serde::Deserialize;

use crate::engine::MAX_COUNT;
use crate::keymap::{BindingSpec, BindingTable, UNBIND, default_bindings};
use crate::session::SessionOptions;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub default_keys: Option<bool>,
    #[serde(default)]
    pub navigation: NavigationConfigFile,
    /// Sequence → action. `"none"` removes a default binding.
    #[serde(default)]
    pub keys: BTreeMap<String, BindingSpec>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct NavigationConfigFile {
    pub max_count: Option<u32>,
    pub window_height: Option<usize>,
    pub search_cache: Option<bool>,
    pub smartcase: Option<bool>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub default_keys: bool,
    pub navigation: NavigationConfig,
    pub keys: BTreeMap<String, BindingSpec>,
}

pub struct NavigationConfig {
    pub max_count: u32,
    pub window_height: usize,
    pub search_cache: bool,
    pub smartcase: bool,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, window_height: Option<usize>, no_default_keys: bool) {
        if let Some(v) = window_height {
            debug!("config: CLI override window_height={v}");
            self.navigation.window_height = window_height;
        }
        if no_default_keys {
            debug!("config: CLI override default_keys=false");
            self.default_keys = Some(false);
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let config = Config {
            default_keys: self.default_keys.unwrap_or(true),
            navigation: NavigationConfig {
                max_count: self.navigation.max_count.unwrap_or(MAX_COUNT).max(1),
                window_height: self.navigation.window_height.unwrap_or(20).max(1),
                search_cache: self.navigation.search_cache.unwrap_or(true),
                smartcase: self.navigation.smartcase.unwrap_or(true),
            },
            keys: self.keys,
        };
        info!(
            "config: resolved default_keys={}, max_count={}, window_height={}, \
             search_cache={}, smartcase={}, user_keys={}",
            config.default_keys,
            config.navigation.max_count,
            config.navigation.window_height,
            config.navigation.search_cache,
            config.navigation.smartcase,
            config.keys.len(),
        );
        config
    }
}

impl Config {
    /// Build the binding table: defaults (unless disabled), minus `"none"`
    /// entries, plus user bindings. Any invalid user binding is an error.
    pub fn binding_table(&self) -> anyhow::Result<BindingTable> {
        let mut table = if self.default_keys {
            default_bindings()
        } else {
            BindingTable::new()
        };

        let mut user = Vec::new();
        for (keys, spec) in &self.keys {
            if spec.action() == UNBIND {
                if table.remove(keys).is_none() {
                    warn!("config: no binding for {keys:?} to remove, skipped");
                }
                continue;
            }
            let desc = spec
                .to_descriptor(keys)
                .with_context(|| format!("invalid binding for {keys:?}"))?;
            user.push((keys.as_str(), desc));
        }

        let user = BindingTable::install(user).context("invalid [keys] table")?;
        table
            .merge(&user)
            .context("[keys] conflicts with the default bindings")?;
        info!("config: {} bindings ({} from [keys])", table.len(), user.len());
        Ok(table)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            window_height: self.navigation.window_height,
            max_count: self.navigation.max_count,
            search_cache: self.navigation.search_cache,
            smartcase: self.navigation.smartcase,
        }
    }
}

/// Resolve the XDG config path for vinav.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config"))
        })?;
    Some(config_dir.join("vinav").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{ReadSpec, action};

    #[test]
    fn empty_toml() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        let resolved = cfg.resolve();
        assert!(resolved.default_keys);
        assert_eq!(resolved.navigation.max_count, MAX_COUNT);
        assert_eq!(resolved.navigation.window_height, 20);
        assert!(resolved.navigation.search_cache);
        assert!(resolved.navigation.smartcase);
        assert_eq!(
            resolved.binding_table().unwrap().len(),
            default_bindings().len()
        );
    }

    #[test]
    fn partial_toml() {
        let text = r#"
            [navigation]
            window_height = 12
            smartcase = false
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let resolved = cfg.resolve();
        assert_eq!(resolved.navigation.window_height, 12);
        assert!(!resolved.navigation.smartcase);
        // Defaults for unspecified fields
        assert_eq!(resolved.navigation.max_count, MAX_COUNT);
        let opts = resolved.session_options();
        assert_eq!(opts.window_height, 12);
        assert!(opts.search_cache);
    }

    #[test]
    fn invalid_toml() {
        let text = "this is not valid toml [[[";
        let result = toml::from_str::<ConfigFile>(text);
        assert!(result.is_err());
    }

    #[test]
    fn cli_overrides() {
        let mut cfg: ConfigFile = toml::from_str("[navigation]\nwindow_height = 5").unwrap();
        cfg.merge_cli(Some(30), true);
        let resolved = cfg.resolve();
        assert_eq!(resolved.navigation.window_height, 30); // CLI wins
        assert!(!resolved.default_keys);
        assert!(resolved.binding_table().unwrap().is_empty());
    }

    #[test]
    fn user_keys_merge_over_defaults() {
        let text = r#"
            [keys]
            "g g" = "none"
            "g" = "cursor-to-document-top"
            "m" = { action = "mark", read = "one-char" }
            "n" = "next-file"
            "q" = "none"
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let table = cfg.resolve().binding_table().unwrap();
        assert!(table.get_keys("g g").is_none());
        assert_eq!(
            table.get_keys("g").unwrap().name,
            action::CURSOR_TO_DOCUMENT_TOP
        );
        assert_eq!(table.get_keys("m").unwrap().read, Some(ReadSpec::OneChar));
        assert_eq!(table.get_keys("n").unwrap().name, "next-file");
        assert!(table.get_keys("q").is_none());
    }

    #[test]
    fn unknown_read_is_fatal() {
        let text = r#"
            [keys]
            "m" = { action = "mark", read = "readLine" }
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let err = cfg.resolve().binding_table().unwrap_err();
        assert!(format!("{err:#}").contains("readLine"));
    }

    #[test]
    fn conflict_with_defaults_is_fatal() {
        let text = r#"
            [keys]
            "z" = "fold"
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        assert!(cfg.resolve().binding_table().is_err());
    }
}
