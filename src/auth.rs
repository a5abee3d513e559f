//! Credential gate.
//!
//! Passwords are never stored or compared in clear: every store holds the
//! SHA-256 hex digest of the password and the gate compares digests.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub username: String,
    pub secret: String,
}

impl CredentialRecord {
    pub fn from_password(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            secret: hash_password(password),
        }
    }
}

/// Lookup and insertion of credential records.
pub trait CredentialStore: Send + Sync {
    fn get(&self, username: &str) -> Result<Option<CredentialRecord>>;

    /// Inserts a new record; fails with `AlreadyExists` if the username is taken.
    fn put(&self, record: CredentialRecord) -> Result<()>;
}

// ── Host-supplied secrets ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SecretsFile {
    users: HashMap<String, String>,
}

/// Read-only map of usernames to pre-hashed passwords provided by the
/// hosting environment.
pub struct SecretsStore {
    users: HashMap<String, String>,
}

impl SecretsStore {
    pub fn new(users: HashMap<String, String>) -> Self {
        let users = users
            .into_iter()
            .map(|(name, digest)| (name, digest.trim().to_ascii_lowercase()))
            .collect();
        Self { users }
    }

    /// Loads `{"users": {"name": "<sha256 hex>"}}`. A missing or malformed
    /// secrets file is a deployment error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read secrets {}: {e}", path.display()))
        })?;
        let parsed: SecretsFile = serde_json::from_str(&raw)?;
        info!("Loaded {} user(s) from secrets {}", parsed.users.len(), path.display());
        Ok(Self::new(parsed.users))
    }
}

impl CredentialStore for SecretsStore {
    fn get(&self, username: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.users.get(username).map(|secret| CredentialRecord {
            username: username.to_string(),
            secret: secret.clone(),
        }))
    }

    fn put(&self, _record: CredentialRecord) -> Result<()> {
        Err(AppError::ReadOnlyStore)
    }
}

// ── JSON users file ──────────────────────────────────────────────────────────

/// Users file holding `{"name": "<sha256 hex>"}`.
///
/// The file is re-read on every lookup and rewritten in full on insert.
/// Inserts hold `lock` across the read and the rewrite.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Missing or malformed files read as an empty user set.
    fn read_all(&self) -> HashMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!("Cannot read users file {}: {e}", self.path.display());
                return HashMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed users file {}: {e}", self.path.display());
            HashMap::new()
        })
    }

    fn write_all(&self, users: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, username: &str) -> Result<Option<CredentialRecord>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Store("users file lock poisoned".to_string()))?;
        Ok(self.read_all().remove(username).map(|secret| CredentialRecord {
            username: username.to_string(),
            secret,
        }))
    }

    fn put(&self, record: CredentialRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Store("users file lock poisoned".to_string()))?;
        let mut users = self.read_all();
        if users.contains_key(&record.username) {
            return Err(AppError::AlreadyExists(record.username));
        }
        users.insert(record.username, record.secret);
        self.write_all(&users)
    }
}

// ── Gate ─────────────────────────────────────────────────────────────────────

pub struct CredentialGate {
    store: Box<dyn CredentialStore>,
}

impl CredentialGate {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// True iff a record exists for `username` whose secret is the digest of `password`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        let Some(record) = self.store.get(username)? else {
            return Ok(false);
        };
        Ok(record.secret == hash_password(password))
    }

    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        if username.trim().is_empty() {
            return Err(AppError::InvalidInput("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AppError::InvalidInput("password must not be empty".to_string()));
        }
        self.store.put(CredentialRecord::from_password(username, password))?;
        info!("Registered user {username}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash_password("").len(), 64);
    }

    #[test]
    fn secrets_store_matches_digest_only() {
        let mut users = HashMap::new();
        users.insert("alice".to_string(), hash_password("wonderland").to_uppercase());
        let gate = CredentialGate::new(Box::new(SecretsStore::new(users)));

        assert!(gate.authenticate("alice", "wonderland").unwrap());
        assert!(!gate.authenticate("alice", "Wonderland").unwrap());
        assert!(!gate.authenticate("x", "wonderland").unwrap());
        assert!(!gate.authenticate("", "").unwrap());
    }

    #[test]
    fn secrets_store_refuses_registration() {
        let gate = CredentialGate::new(Box::new(SecretsStore::new(HashMap::new())));
        assert!(matches!(gate.register("bob", "pw"), Err(AppError::ReadOnlyStore)));
    }

    #[test]
    fn secrets_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(
            &path,
            format!(r#"{{"users": {{"alice": "{}"}}}}"#, hash_password("pw")),
        )
        .unwrap();
        let gate = CredentialGate::new(Box::new(SecretsStore::load(&path).unwrap()));
        assert!(gate.authenticate("alice", "pw").unwrap());
    }

    #[test]
    fn missing_secrets_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SecretsStore::load(dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn register_then_authenticate() {
        let dir = tempfile::tempdir().unwrap();
        let gate = CredentialGate::new(Box::new(FileStore::new(dir.path().join("users.json"))));

        gate.register("carol", "s3cret").unwrap();
        assert!(gate.authenticate("carol", "s3cret").unwrap());
        assert!(!gate.authenticate("carol", "wrong").unwrap());
    }

    #[test]
    fn duplicate_registration_keeps_original_secret() {
        let dir = tempfile::tempdir().unwrap();
        let gate = CredentialGate::new(Box::new(FileStore::new(dir.path().join("users.json"))));

        gate.register("dave", "first").unwrap();
        let err = gate.register("dave", "second").unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(ref name) if name == "dave"));
        assert!(gate.authenticate("dave", "first").unwrap());
        assert!(!gate.authenticate("dave", "second").unwrap());
    }

    #[test]
    fn users_file_never_holds_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = FileStore::new(&path);
        CredentialGate::new(Box::new(FileStore::new(&path)))
            .register("erin", "hunter2")
            .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("hunter2"));
        assert_eq!(store.get("erin").unwrap().unwrap().secret, hash_password("hunter2"));
    }

    #[test]
    fn malformed_users_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "{not json").unwrap();
        let gate = CredentialGate::new(Box::new(FileStore::new(&path)));

        assert!(!gate.authenticate("anyone", "pw").unwrap());
        gate.register("frank", "pw").unwrap();
        assert!(gate.authenticate("frank", "pw").unwrap());
    }

    #[test]
    fn concurrent_registrations_are_all_kept() {
        use std::sync::Arc;
        use std::thread;

        const WRITERS: usize = 16;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let gate = Arc::new(CredentialGate::new(Box::new(FileStore::new(&path))));

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.register(&format!("student{i}"), "pw").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let users: HashMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(users.len(), WRITERS);
        for i in 0..WRITERS {
            assert!(gate.authenticate(&format!("student{i}"), "pw").unwrap());
        }
    }

    #[test]
    fn empty_username_cannot_register() {
        let dir = tempfile::tempdir().unwrap();
        let gate = CredentialGate::new(Box::new(FileStore::new(dir.path().join("users.json"))));
        assert!(matches!(gate.register("  ", "pw"), Err(AppError::InvalidInput(_))));
    }
}
