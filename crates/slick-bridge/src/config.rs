//! Bridge configuration (slick.toml)
//!
//! Optional file at the root of an application bundle. Every field has a
//! default, so an absent file and an empty file configure the same bridge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path of the configuration file inside a bundle
pub const BUNDLE_PATH: &str = "slick.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Global table the primitive API is registered under
    pub api_name: String,

    /// Archive directory scripts are resolved from
    pub asset_root: String,

    /// Script file extension, without the dot
    pub script_extension: String,

    /// Host storage directory exposed to scripts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_name: "_internal".to_string(),
            asset_root: "assets".to_string(),
            script_extension: "lua".to_string(),
            storage_path: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the storage path
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_lua_identifier(&self.api_name) {
            return Err(ConfigError::ValidationError(format!(
                "api_name '{}' is not a valid Lua identifier",
                self.api_name
            )));
        }

        if self.script_extension.is_empty() || self.script_extension.starts_with('.') {
            return Err(ConfigError::ValidationError(format!(
                "script_extension '{}' must be non-empty and must not start with '.'",
                self.script_extension
            )));
        }

        if self.asset_root.split('/').any(|part| part == "..") {
            return Err(ConfigError::ValidationError(format!(
                "asset_root '{}' must not contain '..'",
                self.asset_root
            )));
        }

        Ok(())
    }

    /// Archive path of the script for a dotted module name, trying the file
    /// form first and the package `init` form second
    pub fn module_paths(&self, module: &str) -> [String; 2] {
        let relative = module.replace('.', "/");
        let base = if self.asset_root.is_empty() {
            relative
        } else {
            format!("{}/{}", self.asset_root.trim_end_matches('/'), relative)
        };
        [
            format!("{}.{}", base, self.script_extension),
            format!("{}/init.{}", base, self.script_extension),
        ]
    }
}

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

fn is_lua_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !LUA_KEYWORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.api_name, "_internal");
        assert_eq!(config.asset_root, "assets");
        assert_eq!(config.script_extension, "lua");
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
api_name = "bridge"
asset_root = "scripts/lua"
script_extension = "luac"
storage_path = "/data/app"
"#;
        let config = BridgeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.api_name, "bridge");
        assert_eq!(config.asset_root, "scripts/lua");
        assert_eq!(config.script_extension, "luac");
        assert_eq!(config.storage_path, Some(PathBuf::from("/data/app")));
    }

    #[test]
    fn test_invalid_api_name() {
        for name in ["", "1abc", "a-b", "end"] {
            let toml = format!("api_name = \"{}\"", name);
            let err = BridgeConfig::from_toml_str(&toml).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{name}");
        }
    }

    #[test]
    fn test_invalid_extension() {
        let err = BridgeConfig::from_toml_str("script_extension = \".lua\"").unwrap_err();
        assert!(err.to_string().contains("script_extension"));
        assert!(BridgeConfig::from_toml_str("script_extension = \"\"").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = BridgeConfig::from_toml_str("apiName = \"x\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_module_paths() {
        let config = BridgeConfig::default();
        assert_eq!(
            config.module_paths("app.ui.main"),
            ["assets/app/ui/main.lua".to_string(), "assets/app/ui/main/init.lua".to_string()]
        );

        let bare = BridgeConfig {
            asset_root: String::new(),
            ..BridgeConfig::default()
        };
        assert_eq!(bare.module_paths("boot")[0], "boot.lua");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BUNDLE_PATH);
        std::fs::write(&path, "asset_root = \"lua\"\n").unwrap();
        let config = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(config.asset_root, "lua");

        let err = BridgeConfig::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
