use crate::common::{WatchpostError, Result};
use crate::identity::Authenticator;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fs;
use std::path::{Path, PathBuf};

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;
const STORAGE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone)]
pub struct UserRecord {
    pub username: String,
    /// base64 random salt, used as the HMAC key
    salt: String,
    /// base64 HMAC-SHA256(salt, password)
    password_hash: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord").field("username", &self.username).finish_non_exhaustive()
    }
}

impl UserRecord {
    fn new(username: &str, password: &str) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Ok(Self {
            username: username.to_string(),
            salt: general_purpose::STANDARD.encode(salt),
            password_hash: general_purpose::STANDARD.encode(digest(&salt, password)?),
        })
    }

    fn verify(&self, password: &str) -> bool {
        let (salt, expected) = match (
            general_purpose::STANDARD.decode(&self.salt),
            general_purpose::STANDARD.decode(&self.password_hash),
        ) {
            (Ok(salt), Ok(expected)) => (salt, expected),
            _ => {
                tracing::warn!("Corrupt credential record for user {}", self.username);
                return false;
            }
        };
        let mut mac = match HmacSha256::new_from_slice(&salt) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(password.as_bytes());
        // constant-time comparison
        mac.verify_slice(&expected).is_ok()
    }
}

fn digest(salt: &[u8], password: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(salt)
        .map_err(|e| WatchpostError::UserStore(format!("Invalid salt: {}", e)))?;
    mac.update(password.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[derive(Serialize, Deserialize, Default)]
struct UserFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    users: Vec<UserRecord>,
}

fn default_version() -> u32 { STORAGE_VERSION }

/// File-backed credential store for the web interface.
pub struct UserStore {
    path: PathBuf,
    users: Vec<UserRecord>,
}

impl UserStore {
    /// Loads `path`; a missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self { path: path.to_path_buf(), users: Vec::new() });
        }

        let contents = fs::read_to_string(path)?;
        let file: UserFile = toml::from_str(&contents)
            .map_err(|e| WatchpostError::UserStore(format!("Failed to parse {}: {}", path.display(), e)))?;

        if file.version > STORAGE_VERSION {
            return Err(WatchpostError::UserStore(format!(
                "{} has version {}, newer than supported {}", path.display(), file.version, STORAGE_VERSION
            )));
        }

        Ok(Self { path: path.to_path_buf(), users: file.users })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.iter().map(|u| u.username.as_str())
    }

    /// Adds or replaces a user. Returns true if an existing entry was replaced.
    pub fn set_user(&mut self, username: &str, password: &str) -> Result<bool> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(WatchpostError::UserStore("Password must not be empty".into()));
        }

        let record = UserRecord::new(username, password)?;
        match self.users.iter_mut().find(|u| u.username == username) {
            Some(existing) => {
                *existing = record;
                Ok(true)
            }
            None => {
                self.users.push(record);
                Ok(false)
            }
        }
    }

    pub fn remove_user(&mut self, username: &str) -> Result<()> {
        let before = self.users.len();
        self.users.retain(|u| u.username != username);
        if self.users.len() == before {
            return Err(WatchpostError::UserNotFound(username.to_string()));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = UserFile { version: STORAGE_VERSION, users: self.users.clone() };
        let encoded = toml::to_string_pretty(&file)
            .map_err(|e| WatchpostError::UserStore(format!("Failed to serialize: {}", e)))?;
        fs::write(&self.path, encoded)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

impl Authenticator for UserStore {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        match self.users.iter().find(|u| u.username == username) {
            Some(record) => record.verify(password),
            None => false,
        }
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > 64 {
        return Err(WatchpostError::UserStore("Username must be 1-64 characters".into()));
    }
    // Basic auth splits on the first ':'
    if username.contains(':') || username.chars().any(char::is_control) {
        return Err(WatchpostError::UserStore(
            "Username must not contain ':' or control characters".into()
        ));
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
