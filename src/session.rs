//! Session management for the Telegram client
//!
//! Provides:
//! - File-based session locking to prevent parallel execution
//! - Session file validation
//! - Client creation with proper configuration

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use grammers_client::Client;
use grammers_mtsender::{SenderPool, SenderPoolHandle};
use grammers_session::storages::SqliteSession;

use crate::config::Config;
use crate::error::{Error, Result};

/// Session lock guard that ensures exclusive access to the Telegram session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock on the session.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                eprintln!(
                    r#"
ERROR: the Telegram session is already used by another process!

Running several clients on one session leads to conflicts.
Wait for the other run to finish and try again.
"#
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Check if the session file exists.
pub fn check_session_exists(config: &Config) -> Result<()> {
    let session_file = config.session_file();

    if !session_file.exists() {
        eprintln!(
            r#"
ERROR: session file '{}' not found!

To create it:
1. Run: cargo run --bin init_session
2. Enter the login code sent by Telegram
"#,
            session_file.display()
        );
        return Err(Error::SessionNotFound(session_file.display().to_string()));
    }

    Ok(())
}

/// Open (or create) the session database.
pub fn open_session(config: &Config) -> Result<Arc<SqliteSession>> {
    let session_file = config.session_file();
    let session = SqliteSession::open(&session_file)
        .map_err(|e| Error::SessionNotFound(format!("Failed to open session: {}", e)))?;
    Ok(Arc::new(session))
}

/// Holder for SenderPool components and Client
pub struct TelegramClient {
    pub client: Client,
    pub handle: SenderPoolHandle,
    _runner_handle: tokio::task::JoinHandle<()>,
}

impl TelegramClient {
    /// Create a new TelegramClient from session
    pub async fn connect(session: Arc<SqliteSession>, api_id: i32) -> Result<Self> {
        if api_id == 0 {
            return Err(Error::ConfigError(
                "telegram.api_id is not set (config.yml or TELEGRAM_API_ID)".to_string(),
            ));
        }

        let pool = SenderPool::new(session, api_id);

        // Create client from pool (need reference to whole pool)
        let client = Client::new(&pool);

        // Updates are not consumed by this tool
        let SenderPool { runner, handle, .. } = pool;

        let runner_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle,
            _runner_handle: runner_handle,
        })
    }
}

// Implement Deref to allow using TelegramClient as &Client
impl std::ops::Deref for TelegramClient {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Create and connect a Telegram client with an existing, authorized session.
pub async fn get_client(config: &Config) -> Result<TelegramClient> {
    check_session_exists(config)?;
    let session = open_session(config)?;
    let client = TelegramClient::connect(session, config.api_id).await?;
    if !client.is_authorized().await? {
        return Err(Error::AuthorizationRequired);
    }
    Ok(client)
}

/// Create a Telegram client for initialization (no session check).
pub async fn get_client_for_init(config: &Config) -> Result<TelegramClient> {
    let session = open_session(config)?;
    TelegramClient::connect(session, config.api_id).await
}
