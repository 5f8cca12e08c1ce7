use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Container settings, shared by the root scope and every scope derived from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Name of the root scope, shown in diagnostics
    pub root_scope_name: String,
    /// Run cycle detection on every registration and reject one that closes a cycle
    pub verify_on_provide: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            root_scope_name: "root".to_string(),
            verify_on_provide: false,
        }
    }
}

impl ContainerConfig {
    pub fn from_yaml_str(yaml: &str) -> DiResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> DiResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DiResult<()> {
        if self.root_scope_name.trim().is_empty() {
            return Err(DiError::Config {
                message: "root_scope_name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.root_scope_name, "root");
        assert!(!config.verify_on_provide);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_fills_missing_fields() {
        let config = ContainerConfig::from_yaml_str("verify_on_provide: true\n").unwrap();
        assert!(config.verify_on_provide);
        assert_eq!(config.root_scope_name, "root");
    }

    #[test]
    fn test_json_loading() {
        let config = ContainerConfig::from_json_str(r#"{"root_scope_name": "app"}"#).unwrap();
        assert_eq!(config.root_scope_name, "app");
    }

    #[test]
    fn test_empty_root_name_is_rejected() {
        let error = ContainerConfig::from_yaml_str("root_scope_name: \"  \"\n").unwrap_err();
        assert!(matches!(error, DiError::Config { .. }));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(ContainerConfig::from_json_str("{"), Err(DiError::Json(_))));
        assert!(matches!(
            ContainerConfig::from_yaml_str("verify_on_provide: [1, 2]"),
            Err(DiError::Yaml(_))
        ));
    }
}
