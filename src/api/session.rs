//! Authenticated session and its on-disk store.
//!
//! A [`Session`] is created by a successful login and handed by reference to
//! every call that needs a bearer token. It is never looked up globally.

use crate::api::ApiError;
use crate::models::User;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Token plus the user it was issued to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Unknown when the session was built from a raw token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: Option<User>) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    /// Value of the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn is_super_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_super_admin)
    }

    /// Gate for the user-management commands.
    pub fn require_super_admin(&self) -> Result<&User, ApiError> {
        match &self.user {
            Some(user) if user.is_super_admin() => Ok(user),
            _ => Err(ApiError::Forbidden),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.email.as_str())
    }
}

/// JSON file holding the current session between invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session. `Ok(None)` when nobody is signed in.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file: {}", self.path.display()))?;
        let session: Session = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", self.path.display()))?;

        debug!("Loaded session from {}", self.path.display());
        Ok(Some(session))
    }

    /// Persist a session, creating parent directories as needed.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(session)?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open session file: {}", self.path.display()))?;

        // The mode above only applies to new files; tighten an existing one
        // before the token is written.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", self.path.display()))?;
        }

        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;

        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored session. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove session file: {}", self.path.display()))?;
        Ok(true)
    }
}
