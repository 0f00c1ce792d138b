//! # Client Configuration Module
//!
//! Connection settings, credentials and data source aliases for [`DaasClient`].
//! Configurations are read from YAML (`.yaml` / `.yml`) or JSON files.
//!
//! ## Example
//!
//! ```yaml
//! server: 10.20.30.40
//! port: 80
//! service_node_id: NMIC_MUSIC_CMADAAS
//! user: my_user
//! password: my_password
//! conn_timeout_secs: 3
//! request_timeout_secs: 60
//! alias:
//!   ECMWF_P: NAFP_ECMF_FTM_HIGH_ANEA_FOR
//!   SURFACE: SURF_CHN_MUL_HOR
//! ```
//!
//! ```rust,no_run
//! use daas_client::config::ClientConfig;
//!
//! let config = ClientConfig::from_file("daas.yaml")?;
//! assert!(config.resolve_alias("ECMWF_P").starts_with("NAFP"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`DaasClient`]: crate::client::DaasClient

use crate::error::{DaasError, DaasResult};
use crate::sign::Credentials;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_port() -> u16 {
    80
}

fn default_conn_timeout() -> u64 {
    3
}

fn default_request_timeout() -> u64 {
    60
}

fn default_language() -> String {
    "Python".to_string()
}

fn default_client_version() -> String {
    "V2.0.0".to_string()
}

/// Connection and identity settings of a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Host name or address of the query service
    pub server: String,
    /// Service port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Service node identifier sent with every call
    pub service_node_id: String,
    /// Connect timeout in seconds
    #[serde(default = "default_conn_timeout")]
    pub conn_timeout_secs: u64,
    /// Limit on a whole call in seconds, from connect to the last byte of the body
    #[serde(default = "default_request_timeout", alias = "read_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Client language tag the service expects in the signature
    #[serde(default = "default_language")]
    pub language: String,
    /// Client version tag the service expects in the signature
    #[serde(default = "default_client_version")]
    pub client_version: String,
    /// Short names for data codes, e.g. `ECMWF_P -> NAFP_ECMF_FTM_HIGH_ANEA_FOR`
    #[serde(default)]
    pub alias: HashMap<String, String>,
    /// Extra YAML alias file; its entries never override `alias`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Minimal configuration for a server, with defaults everywhere else.
    pub fn new(server: impl Into<String>, service_node_id: impl Into<String>) -> Self {
        ClientConfig {
            server: server.into(),
            port: default_port(),
            service_node_id: service_node_id.into(),
            conn_timeout_secs: default_conn_timeout(),
            request_timeout_secs: default_request_timeout(),
            user: String::new(),
            password: String::new(),
            language: default_language(),
            client_version: default_client_version(),
            alias: HashMap::new(),
            alias_file: None,
        }
    }

    /// Loads a configuration file, choosing the format from the extension.
    ///
    /// `.yaml` and `.yml` are parsed as YAML, anything else as JSON. A relative
    /// `alias_file` is resolved against the configuration file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> DaasResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| DaasError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let mut config = if is_yaml {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };

        if let Some(alias_file) = config.alias_file.clone() {
            let alias_path = if alias_file.is_relative() {
                path.parent().unwrap_or(Path::new(".")).join(alias_file)
            } else {
                alias_file
            };
            config.load_alias_file(&alias_path)?;
        }
        Ok(config)
    }

    pub fn from_json(json_str: &str) -> DaasResult<Self> {
        let config: ClientConfig = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(yaml_str: &str) -> DaasResult<Self> {
        let config: ClientConfig = serde_yaml::from_str(yaml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Merges a YAML `name: data_code` map under the inline aliases.
    pub fn load_alias_file(&mut self, path: &Path) -> DaasResult<()> {
        let content = fs::read_to_string(path)
            .map_err(|e| DaasError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let extra: HashMap<String, String> = serde_yaml::from_str(&content)?;
        for (name, code) in extra {
            self.alias.entry(name).or_insert(code);
        }
        Ok(())
    }

    pub fn validate(&self) -> DaasResult<()> {
        if self.server.trim().is_empty() {
            return Err(DaasError::Config("server must not be empty".to_string()));
        }
        if self.service_node_id.trim().is_empty() {
            return Err(DaasError::Config("service_node_id must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(DaasError::Config("port must not be 0".to_string()));
        }
        Ok(())
    }

    /// Data code for a name, or the name itself when it is not an alias.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.alias.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Service endpoint all calls go to.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/music-ws/api", self.server, self.port)
    }

    pub fn conn_timeout(&self) -> Duration {
        Duration::from_secs(self.conn_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            service_node_id: self.service_node_id.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            language: self.language.clone(),
            client_version: self.client_version.clone(),
        }
    }
}
