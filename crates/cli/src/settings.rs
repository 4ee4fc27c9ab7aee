// CLI Settings (layered: defaults -> TOML file -> environment -> flags)

use config::{Config, ConfigError, Environment, File};
use order_edit_core::domain::audit::DEFAULT_REFERENCE_PREFIX;
use order_edit_core::domain::{DomainError, IsolationLevel};
use order_edit_core::port::Credentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.order-edit/orders.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const ENV_PREFIX: &str = "ORDER_EDIT";
const CONFIG_FILE_NAME: &str = "order-edit.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionSettings {
    /// Directory relative database paths are resolved against
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineSettings {
    pub isolation_level: String,
    pub reference_prefix: String,
}

/// Values given on the command line; `None` keeps the layered value
#[derive(Debug, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub isolation_level: Option<String>,
}

impl Settings {
    /// Load settings; an explicit `path` must exist, the default file may not
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("connection.server", "")?
            .set_default("connection.database", DEFAULT_DB_PATH)?
            .set_default("connection.username", "")?
            .set_default("connection.password", "")?
            .set_default("connection.busy_timeout_ms", DEFAULT_BUSY_TIMEOUT_MS)?
            .set_default(
                "engine.isolation_level",
                IsolationLevel::default().as_sql(),
            )?
            .set_default("engine.reference_prefix", DEFAULT_REFERENCE_PREFIX)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => match default_config_path() {
                Some(path) => builder.add_source(File::from(path).required(false)),
                None => builder,
            },
        };

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(server) = overrides.server {
            self.connection.server = server;
        }
        if let Some(database) = overrides.database {
            self.connection.database = database;
        }
        if let Some(username) = overrides.username {
            self.connection.username = username;
        }
        if let Some(password) = overrides.password {
            self.connection.password = password;
        }
        if let Some(level) = overrides.isolation_level {
            self.engine.isolation_level = level;
        }
        self
    }

    pub fn isolation_level(&self) -> Result<IsolationLevel, DomainError> {
        self.engine.isolation_level.parse()
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.busy_timeout_ms)
    }

    /// Credentials with `~` expanded in file paths (URLs are kept as given)
    pub fn credentials(&self) -> Credentials {
        let database = if self.connection.database.starts_with("sqlite:") {
            self.connection.database.clone()
        } else {
            shellexpand::tilde(&self.connection.database).into_owned()
        };

        Credentials::new(
            shellexpand::tilde(&self.connection.server).into_owned(),
            database,
            self.connection.username.clone(),
            self.connection.password.clone(),
        )
    }
}

/// `<config dir>/order-edit/order-edit.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "order-edit")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
