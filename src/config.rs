use {
    std::path::Path,
    sqlx::postgres::PgConnectOptions,
    crate::prelude::*,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)] Io(#[from] std::io::Error),
    #[error(transparent)] Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub database: Option<ConfigDatabase>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// Database overrides; anything left unset falls back to the connection
/// defaults (Unix socket, current user).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDatabase {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConfigDatabase {
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new();
        if let Some(ref host) = self.host { options = options.host(host) }
        if let Some(port) = self.port { options = options.port(port) }
        if let Some(ref username) = self.username { options = options.username(username) }
        if let Some(ref password) = self.password { options = options.password(password) }
        if let Some(ref database) = self.database { options = options.database(database) }
        options
    }
}
