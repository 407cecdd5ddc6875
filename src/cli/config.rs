// FILE: src/cli/config.rs

use crate::error::{CompilerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;

/// Project settings loaded with `-c`. Command-line flags override these.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub project_name: Option<String>,
    pub include_directories: Option<Vec<String>>,
    pub custom_variables: Option<HashMap<String, String>>,
    pub features: Option<Vec<String>>,
    pub target_version: Option<String>,
    pub output_directory: Option<String>,
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| CompilerError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let config = parse(config_path, &config_content)?;
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}

fn parse(config_path: &str, config_content: &str) -> Result<ConfigFile> {
    if config_path.ends_with(".json") {
        serde_json::from_str(config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid JSON config: {}", e),
        })
    } else if config_path.ends_with(".toml") {
        toml::from_str(config_content).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid TOML config: {}", e),
        })
    } else {
        Err(CompilerError::InvalidFormat {
            message: "Config file must be .json or .toml format".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_toml_config() {
        let config = parse(
            "mcc.toml",
            "project_name = \"arena\"\nfeatures = [\"nulls\"]\n\n[custom_variables]\nrounds = \"3\"\n",
        )
        .unwrap();
        assert_eq!(config.project_name.as_deref(), Some("arena"));
        assert_eq!(config.features, Some(vec!["nulls".to_string()]));
        assert_eq!(config.custom_variables.unwrap()["rounds"], "3");
        assert!(config.output_directory.is_none());
    }

    #[test]
    fn test_json_config_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mcc.json");
        fs::write(&path, r#"{"output_directory": "pack", "include_directories": ["lib"]}"#).unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.output_directory.as_deref(), Some("pack"));
        assert_eq!(config.include_directories, Some(vec!["lib".to_string()]));
    }

    #[test]
    fn test_rejects_unknown_format() {
        match parse("mcc.yaml", "a: 1") {
            Err(CompilerError::InvalidFormat { message }) => assert!(message.contains(".json or .toml")),
            other => panic!("Expected format error, got {:?}", other),
        }
        assert!(load("does/not/exist.toml").is_err());
    }
}
