//! Authentication state: the bearer token plus the signed-in user's profile.
//!
//! `SessionHandle` is the shared in-memory copy every component reads; the
//! optional `SessionStore` mirrors it to disk so a restart resumes the
//! session. Only the token and profile are ever written out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aes::Aes256;
use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::model::User;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const SESSION_VERSION: u32 = 1;
const SEAL_ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    #[serde(default)]
    session: Option<Session>,
    #[serde(default)]
    sealed: Option<String>,
}

/// Durable copy of the session. With a secret configured the file holds an
/// AES-256-CBC sealed blob instead of plain JSON.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
    secret: Option<String>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, secret: Option<String>) -> Self {
        Self {
            path: path.into(),
            secret,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read session file {}", self.path.display()))?;
        let file: SessionFile = serde_json::from_str(&raw).context("parse session file")?;
        if file.version != SESSION_VERSION {
            return Ok(None);
        }
        match (file.sealed, &self.secret) {
            (Some(sealed), Some(secret)) => {
                let plain = unseal(&sealed, secret)?;
                let session = serde_json::from_str(&plain).context("parse sealed session")?;
                Ok(Some(session))
            }
            (Some(_), None) => Err(anyhow!("session file is sealed but no secret is configured")),
            (None, _) => Ok(file.session),
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let file = match &self.secret {
            Some(secret) => {
                let plain = serde_json::to_string(session).context("encode session")?;
                SessionFile {
                    version: SESSION_VERSION,
                    session: None,
                    sealed: Some(seal(&plain, secret)?),
                }
            }
            None => SessionFile {
                version: SESSION_VERSION,
                session: Some(session.clone()),
                sealed: None,
            },
        };
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create session dir {}", dir.display()))?;
        }
        let json = serde_json::to_string(&file).context("encode session file")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("remove session file {}", self.path.display()))
            }
        }
    }
}

/// Shared, injectable auth state. Cloning shares the same session.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Option<Session>>>,
    store: Option<SessionStore>,
}

impl SessionHandle {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Starts from whatever the store holds; an unreadable file starts signed out.
    pub fn with_store(store: SessionStore) -> Self {
        let restored = match store.load() {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable session file");
                None
            }
        };
        Self {
            inner: Arc::new(Mutex::new(restored)),
            store: Some(store),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.lock().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.lock().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_some()
    }

    pub fn set(&self, session: Session) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&session) {
                tracing::warn!(error = %err, "failed to persist session");
            }
        }
        *self.lock() = Some(session);
    }

    /// Replaces the profile, keeping the token (after `GET /auth/me`).
    pub fn update_user(&self, user: User) {
        let updated = {
            let mut guard = self.lock();
            let Some(session) = guard.as_mut() else {
                return;
            };
            session.user = user;
            session.clone()
        };
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&updated) {
                tracing::warn!(error = %err, "failed to persist session");
            }
        }
    }

    pub fn clear(&self) {
        *self.lock() = None;
        if let Some(store) = &self.store {
            if let Err(err) = store.clear() {
                tracing::warn!(error = %err, "failed to remove session file");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn derive_key(secret: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, SEAL_ITERATIONS, &mut key);
    key
}

fn seal(plain: &str, secret: &str) -> Result<String> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);
    let key = derive_key(secret, &salt);

    let msg_len = plain.len();
    let mut buf = vec![0u8; msg_len + 16];
    buf[..msg_len].copy_from_slice(plain.as_bytes());
    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_mut::<Pkcs7>(&mut buf, msg_len)
        .map_err(|e| anyhow!("AES encrypt failed: {e}"))?;

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(ciphertext);
    Ok(BASE64.encode(out))
}

fn unseal(sealed: &str, secret: &str) -> Result<String> {
    let raw = BASE64
        .decode(sealed.trim().as_bytes())
        .context("sealed session base64 decode failed")?;
    if raw.len() <= SALT_LEN + IV_LEN {
        return Err(anyhow!("sealed session is truncated"));
    }
    let (salt, rest) = raw.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);
    let iv: [u8; IV_LEN] = iv.try_into().context("iv length")?;
    let key = derive_key(secret, salt);

    let mut buf = ciphertext.to_vec();
    let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| anyhow!("AES decrypt failed: {e}"))?;
    String::from_utf8(plaintext.to_vec()).context("sealed session is not utf8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, Role};

    fn sample() -> Session {
        Session {
            token: "header.payload.sig".to_string(),
            user: User {
                id: EntityId::from("12"),
                first_name: "Casey".into(),
                last_name: "Mills".into(),
                email: "casey@example.com".into(),
                role: Some(Role::Coach),
                team_id: None,
            },
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("league_console_test_{}_{name}", std::process::id()))
            .join("session.json")
    }

    #[test]
    fn plain_store_round_trips_and_clears() {
        let store = SessionStore::new(temp_path("plain"), None);
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn sealed_store_hides_the_token() {
        let path = temp_path("sealed");
        let store = SessionStore::new(&path, Some("correct horse".into()));
        store.save(&sample()).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("header.payload.sig"));
        assert_eq!(store.load().unwrap(), Some(sample()));

        let wrong = SessionStore::new(&path, Some("battery staple".into()));
        assert!(wrong.load().is_err() || wrong.load().unwrap() != Some(sample()));
        let unsealed = SessionStore::new(&path, None);
        assert!(unsealed.load().is_err());
        store.clear().unwrap();
    }

    #[test]
    fn handle_clear_removes_memory_and_file() {
        let store = SessionStore::new(temp_path("handle"), None);
        let handle = SessionHandle::with_store(store.clone());
        assert!(!handle.is_authenticated());
        handle.set(sample());
        assert_eq!(handle.token().as_deref(), Some("header.payload.sig"));

        let restored = SessionHandle::with_store(store.clone());
        assert_eq!(restored.user().map(|u| u.email), Some("casey@example.com".into()));

        handle.clear();
        assert!(handle.current().is_none());
        assert_eq!(store.load().unwrap(), None);
    }
}
