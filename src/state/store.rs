//! Durable player records
//!
//! One pretty-printed JSON file per client id. Writes go through a temp file
//! in the same directory and are renamed into place, so a failed write never
//! leaves a half-written record behind.

use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::Player;
use crate::protocol::ClientId;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt player record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to persist player record: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File-backed player store with per-client update serialization
#[derive(Debug)]
pub struct PlayerStore {
    /// Directory holding `<client_id>.json` files
    dir: PathBuf,
    /// One lock per client id, held across read-modify-write
    locks: Mutex<HashMap<ClientId, Arc<tokio::sync::Mutex<()>>>>,
}

impl PlayerStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `id`
    pub fn path_for(&self, id: &ClientId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    /// Load the record for `id`, `None` if it does not exist yet
    pub async fn get(&self, id: &ClientId) -> StoreResult<Option<Player>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the record for `id`
    pub async fn put(&self, id: &ClientId, player: &Player) -> StoreResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.write(id, player).await
    }

    /// Atomically load, modify and persist the record for `id`.
    ///
    /// A missing record is created as the origin and persisted before `f`
    /// runs. Concurrent updates for the same id are applied one at a time.
    pub async fn update<F>(&self, id: &ClientId, f: F) -> StoreResult<Player>
    where
        F: FnOnce(&mut Player),
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut player = match self.get(id).await? {
            Some(player) => player,
            None => {
                let player = Player::default();
                self.write(id, &player).await?;
                tracing::debug!("Created player record for [{}]", id);
                player
            }
        };

        f(&mut player);
        self.write(id, &player).await?;

        Ok(player)
    }

    fn lock_for(&self, id: &ClientId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.clone()).or_default().clone()
    }

    async fn write(&self, id: &ClientId, player: &Player) -> StoreResult<()> {
        let data = to_record_bytes(player)?;
        let dir = self.dir.clone();
        let path = self.path_for(id);

        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            file.write_all(&data)?;
            file.as_file().sync_all()?;
            file.persist(&path)?;
            Ok(())
        })
        .await?
    }
}

/// Serialize a record with single-space indentation
fn to_record_bytes(player: &Player) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(64);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    player.serialize(&mut ser)?;
    Ok(out)
}
