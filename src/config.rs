use std::env;
use std::path::PathBuf;

use crate::error::{AppError, Result};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MODEL_PATH: &str = "LINEARMODEL";
const DEFAULT_SECRETS_PATH: &str = "secrets.json";
const DEFAULT_USERS_PATH: &str = "users.json";
const DEFAULT_WORKERS: usize = 1;

/// Where login credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read-only map of pre-hashed passwords supplied by the host.
    Secrets,
    /// JSON users file that also accepts registrations.
    File,
}

impl CredentialSource {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "secrets" => Ok(CredentialSource::Secrets),
            "file" => Ok(CredentialSource::File),
            other => Err(AppError::Config(format!(
                "unknown credential source '{other}' (expected 'secrets' or 'file')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub credentials: CredentialSource,
    pub secrets_path: PathBuf,
    pub users_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            credentials: CredentialSource::File,
            secrets_path: PathBuf::from(DEFAULT_SECRETS_PATH),
            users_path: PathBuf::from(DEFAULT_USERS_PATH),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = lookup("CGPA_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("CGPA_PORT") {
            config.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("CGPA_PORT is not a valid port: {port}")))?;
        }
        if let Some(workers) = lookup("CGPA_WORKERS") {
            config.workers = match workers.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(AppError::Config(format!(
                        "CGPA_WORKERS must be a positive integer: {workers}"
                    )))
                }
            };
        }
        if let Some(path) = lookup("CGPA_MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Some(source) = lookup("CGPA_CREDENTIALS") {
            config.credentials = CredentialSource::parse(&source)?;
        }
        if let Some(path) = lookup("CGPA_SECRETS_PATH") {
            config.secrets_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("CGPA_USERS_PATH") {
            config.users_path = PathBuf::from(path);
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.workers, 1);
        assert_eq!(config.credentials, CredentialSource::File);
        assert_eq!(config.model_path, PathBuf::from("LINEARMODEL"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("CGPA_PORT", "9000"),
            ("CGPA_CREDENTIALS", "Secrets"),
            ("CGPA_SECRETS_PATH", "/etc/cgpa/secrets.json"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.credentials, CredentialSource::Secrets);
        assert_eq!(config.secrets_path, PathBuf::from("/etc/cgpa/secrets.json"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("CGPA_PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("CGPA_WORKERS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("CGPA_CREDENTIALS", "ldap")])).is_err());
    }
}
