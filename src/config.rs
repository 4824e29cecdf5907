//! Configuration management for database connections
//!
//! A `[database]`-style block selecting the backend and its credentials. Loaded
//! from `~/.config/rowset/config.toml` (TOML or JSON), an explicit file, or
//! the process environment.

use crate::db::sqlserver::SqlServerConfig;
use crate::db::Backend;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SQLSERVER_PORT: u16 = 1433;

/// Raw connection configuration, as written by the user
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DatabaseConfig {
    /// `sqlite` or `sqlserver` (alias `mssql`), case-insensitive
    #[serde(rename = "type", default)]
    pub backend: Option<String>,
    /// SQLite database file
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name on the server
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username_r: Option<String>,
    #[serde(default)]
    pub password_r: Option<String>,
    #[serde(default)]
    pub username_w: Option<String>,
    #[serde(default)]
    pub password_w: Option<String>,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default = "default_trust_cert")]
    pub trust_cert: bool,
}

fn default_trust_cert() -> bool {
    true
}

/// What a validated configuration connects to
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    Sqlite {
        path: PathBuf,
    },
    SqlServer {
        read: SqlServerConfig,
        write: SqlServerConfig,
    },
}

impl Target {
    pub fn backend(&self) -> Backend {
        match self {
            Target::Sqlite { .. } => Backend::Sqlite,
            Target::SqlServer { .. } => Backend::SqlServer,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a SQLite file
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Some("sqlite".to_string()),
            path: Some(path.into()),
            trust_cert: true,
            ..Self::default()
        }
    }

    /// Default config file path (~/.config/rowset/config.toml)
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not find config directory".to_string()))?
            .join("rowset");
        Ok(config_dir.join("config.toml"))
    }

    /// Load the default config file, falling back to the environment when it
    /// does not exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::from_env())
        }
    }

    /// Load a TOML file, or JSON when the extension is `.json`
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let parsed = if is_json {
            serde_json::from_str::<Self>(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str::<Self>(&contents).map_err(|e| e.to_string())
        };
        parsed.map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Read `DB_*` variables, after loading a `.env` file if one exists
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            backend: get("DB_TYPE"),
            path: get("DB_PATH").map(PathBuf::from),
            host: get("DB_HOST"),
            port: get("DB_PORT").and_then(|p| p.parse().ok()),
            name: get("DB_NAME"),
            username_r: get("DB_USER_R"),
            password_r: get("DB_PASSWORD_R"),
            username_w: get("DB_USER_W"),
            password_w: get("DB_PASSWORD_W"),
            encrypt: get("DB_ENCRYPT").is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
            trust_cert: get("DB_TRUST_CERT").map_or(true, |v| v != "0" && !v.eq_ignore_ascii_case("false")),
        }
    }

    /// Check required fields for the selected backend
    pub fn target(&self) -> Result<Target> {
        let backend: Backend = self
            .backend
            .as_deref()
            .ok_or_else(|| Error::Config("missing database type".to_string()))?
            .parse()
            .map_err(Error::Config)?;

        match backend {
            Backend::Sqlite => {
                let path = self
                    .path
                    .clone()
                    .filter(|p| !p.as_os_str().is_empty())
                    .ok_or_else(|| Error::Config("missing sqlite path".to_string()))?;
                // `./db.sqlite` and `db.sqlite` name the same file
                let path = path.strip_prefix("./").map(Path::to_path_buf).unwrap_or(path);
                Ok(Target::Sqlite { path })
            }
            Backend::SqlServer => {
                let required = |field: &Option<String>, name: &str| {
                    field
                        .clone()
                        .filter(|v| !v.trim().is_empty())
                        .ok_or_else(|| Error::Config(format!("missing `{}`", name)))
                };
                let host = required(&self.host, "host")?;
                let database = required(&self.name, "name")?;
                let login = |user: String, password: String| SqlServerConfig {
                    host: host.clone(),
                    port: self.port.unwrap_or(DEFAULT_SQLSERVER_PORT),
                    user,
                    password,
                    database: database.clone(),
                    encrypt: self.encrypt,
                    trust_cert: self.trust_cert,
                };
                let read = login(
                    required(&self.username_r, "username_r")?,
                    required(&self.password_r, "password_r")?,
                );
                let write = login(
                    required(&self.username_w, "username_w")?,
                    required(&self.password_w, "password_w")?,
                );
                Ok(Target::SqlServer { read, write })
            }
        }
    }
}
