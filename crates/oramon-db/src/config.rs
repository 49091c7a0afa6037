//! Target descriptor: where and how to connect.
//!
//! Loaded from the `[database]` table of the exporter's TOML file:
//!
//! ```toml
//! [database]
//! host = "db01.example.com"
//! port = 1521
//! service_name = "ORCLCDB"
//! username = "c##monitor"
//! password = "secret"
//! pdbs = ["SALES", "HR"]
//! ```
//!
//! A `dsn` (any connect string the driver accepts) may replace the
//! host/port/service triple for the root connection. Tenant connections
//! always go through `host:port/<tenant>`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::driver::ConnectTarget;
use crate::error::ConfigError;

/// Default Oracle listener port.
pub const DEFAULT_PORT: u16 = 1521;

/// Connection settings for one monitored database.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Direct connect string for the root container.
    pub dsn: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub service_name: Option<String>,
    pub username: String,
    pub password: String,
    /// Tenant (pluggable database) service names, visited in this order.
    pub pdbs: Vec<String>,
    /// Tenant override set by the connection manager before reconnecting.
    #[serde(skip)]
    active_tenant: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            host: None,
            port: DEFAULT_PORT,
            service_name: None,
            username: String::new(),
            password: String::new(),
            pdbs: Vec::new(),
            active_tenant: None,
        }
    }
}

// Passwords stay out of logs.
impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("dsn", &self.dsn)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pdbs", &self.pdbs)
            .field("active_tenant", &self.active_tenant)
            .finish()
    }
}

#[derive(Deserialize)]
struct ConfigDocument {
    database: Option<TargetConfig>,
}

impl TargetConfig {
    /// Read and validate the `[database]` table from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate the `[database]` table from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let doc: ConfigDocument =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config = doc
            .database
            .ok_or_else(|| ConfigError::Invalid("missing [database] table".to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that a root connect string can be derived.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dsn.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            return Ok(());
        }
        match (&self.host, &self.service_name) {
            (Some(h), Some(s)) if !h.trim().is_empty() && !s.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::Invalid(
                "either dsn or host + service_name must be set".to_string(),
            )),
        }
    }

    /// The tenant the next connection will be scoped to, if any.
    pub fn active_tenant(&self) -> Option<&str> {
        self.active_tenant.as_deref()
    }

    pub fn set_active_tenant(&mut self, tenant: &str) {
        self.active_tenant = Some(tenant.to_string());
    }

    pub fn clear_active_tenant(&mut self) {
        self.active_tenant = None;
    }

    /// Resolve the connect string for the current scope.
    ///
    /// Tenant override first, then the explicit `dsn`, then
    /// `host:port/service_name`.
    pub fn connect_string(&self) -> Result<String, ConfigError> {
        if let Some(tenant) = &self.active_tenant {
            let host = self.host.as_deref().ok_or_else(|| {
                ConfigError::Invalid(format!("tenant {tenant} requires host to be set"))
            })?;
            return Ok(format!("{host}:{}/{tenant}", self.port));
        }
        if let Some(dsn) = self.dsn.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(dsn.to_string());
        }
        match (&self.host, &self.service_name) {
            (Some(host), Some(service)) => Ok(format!("{host}:{}/{service}", self.port)),
            _ => Err(ConfigError::Invalid(
                "either dsn or host + service_name must be set".to_string(),
            )),
        }
    }

    /// Everything a driver needs to open a session in the current scope.
    pub fn connect_target(&self) -> Result<ConnectTarget, ConfigError> {
        Ok(ConnectTarget {
            connect_string: self.connect_string()?,
            username: self.username.clone(),
            password: self.password.clone(),
            tenant: self.active_tenant.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = r#"
[database]
host = "db01"
port = 1522
service_name = "ORCLCDB"
username = "monitor"
password = "secret"
pdbs = ["SALES", "HR"]
"#;

    #[test]
    fn parse_host_service_triple() {
        let config = TargetConfig::parse(ROOT).unwrap();
        assert_eq!(config.host.as_deref(), Some("db01"));
        assert_eq!(config.port, 1522);
        assert_eq!(config.pdbs, vec!["SALES", "HR"]);
        assert_eq!(config.connect_string().unwrap(), "db01:1522/ORCLCDB");
    }

    #[test]
    fn port_defaults_to_listener_port() {
        let config = TargetConfig::parse(
            r#"
[database]
host = "db01"
service_name = "ORCL"
"#,
        )
        .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.pdbs.is_empty());
    }

    #[test]
    fn dsn_wins_for_root_scope() {
        let config = TargetConfig::parse(
            r#"
[database]
dsn = "(DESCRIPTION=(ADDRESS=(HOST=db01)(PORT=1521))(CONNECT_DATA=(SERVICE_NAME=ORCL)))"
host = "db01"
service_name = "IGNORED"
"#,
        )
        .unwrap();
        assert!(config.connect_string().unwrap().starts_with("(DESCRIPTION="));
    }

    #[test]
    fn tenant_override_wins_over_dsn() {
        let mut config = TargetConfig::parse(
            r#"
[database]
dsn = "db01/ORCL"
host = "db01"
"#,
        )
        .unwrap();
        config.set_active_tenant("SALES");
        assert_eq!(config.connect_string().unwrap(), "db01:1521/SALES");

        let target = config.connect_target().unwrap();
        assert_eq!(target.tenant.as_deref(), Some("SALES"));

        config.clear_active_tenant();
        assert_eq!(config.connect_string().unwrap(), "db01/ORCL");
    }

    #[test]
    fn tenant_without_host_is_invalid() {
        let mut config = TargetConfig::parse("[database]\ndsn = \"db01/ORCL\"\n").unwrap();
        config.set_active_tenant("SALES");
        assert!(matches!(
            config.connect_string(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_target_is_invalid() {
        let err = TargetConfig::parse("[database]\nhost = \"db01\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = TargetConfig::parse("[exporter]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = TargetConfig::parse("[database\nhost = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unreadable_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TargetConfig::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn debug_redacts_password() {
        let config = TargetConfig::parse(ROOT).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
