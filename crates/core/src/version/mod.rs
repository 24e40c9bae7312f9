//! Versioned persistence of subtitle files.
//!
//! A save reserves the next version in the ledger, copies the outgoing file to a
//! numbered backup, replaces the active file and only then commits the ledger
//! row. Saves for the same video are serialized.

pub mod ledger;
pub mod storage;

pub use ledger::{Ledger, LedgerEntry, SqliteLedger, StagedEntry};
pub use storage::{FsStorage, SubtitleKey, SubtitleStorage};

use crate::error::{Error, Result, SaveFailure};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{info, trace, warn};

/// Identifier of a saved revision, written `r<N>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(pub u32);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix('r')
            .and_then(|n| n.parse().ok())
            .map(Revision)
            .ok_or_else(|| Error::Remote(format!("unexpected version identifier {s:?}")))
    }
}

/// Everything needed to store a new revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub key: SubtitleKey,
    pub submitter_ip: String,
    pub subtitle: String,
}

impl SaveRequest {
    pub fn validate(&self) -> Result<()> {
        self.key.validate()?;
        if self.submitter_ip.is_empty() {
            return Err(Error::Validation("missing ip".into()));
        }
        if self.subtitle.is_empty() {
            return Err(Error::Validation("missing subtitle".into()));
        }
        Ok(())
    }
}

/// Ledger plus file storage, guarded per video.
pub struct VersionStore<L, S> {
    ledger: L,
    storage: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<L: Ledger, S: SubtitleStorage> VersionStore<L, S> {
    pub fn new(ledger: L, storage: S) -> Self {
        Self {
            ledger,
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store `request.subtitle` as the next revision of its video.
    pub fn save(&self, request: &SaveRequest) -> Result<Revision> {
        request.validate()?;
        let key = &request.key;
        trace!(
            "save platform={} id={} lang={}",
            key.platform,
            key.video_id,
            key.lang
        );
        let lock = self.lock_for(&key.video_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        self.storage
            .prepare(key)
            .map_err(|source| SaveFailure::Prepare { source })?;
        let previous = self
            .storage
            .read_active(key)
            .map_err(|source| SaveFailure::Prepare { source })?;

        let staged = self
            .ledger
            .stage(&key.video_id, &request.submitter_ip, &key.lang, Utc::now())
            .map_err(|source| SaveFailure::Ledger { source })?;
        let version = staged.version();

        if let Err(source) =
            self.storage
                .write_backup(key, version, previous.as_deref().unwrap_or_default())
        {
            warn!("backup r{version} failed, rolling back ledger entry");
            return Err(SaveFailure::Backup { version, source }.into());
        }

        if let Err(source) = self.storage.write_active(key, &request.subtitle) {
            warn!("overwrite for r{version} failed, rolling back ledger entry");
            return Err(SaveFailure::Overwrite { version, source }.into());
        }

        if let Err(source) = staged.commit() {
            let restored = match self.storage.restore_active(key, previous.as_deref()) {
                Ok(()) => true,
                Err(err) => {
                    warn!("could not restore previous subtitle: {err}");
                    false
                }
            };
            return Err(SaveFailure::Commit {
                version,
                restored,
                source,
            }
            .into());
        }

        info!(
            "saved {}/{} {} as r{}",
            key.platform, key.video_id, key.lang, version
        );
        Ok(Revision(version))
    }

    /// Current stored subtitle for `key`.
    pub fn fetch(&self, key: &SubtitleKey) -> Result<String> {
        key.validate()?;
        self.storage.read_active(key)?.ok_or_else(|| {
            Error::NotFound(format!(
                "subtitle {}/{}/{}",
                key.platform, key.video_id, key.lang
            ))
        })
    }

    pub fn last_version(&self, video_id: &str) -> Result<u32> {
        self.ledger.last_version(video_id).map_err(Error::Ledger)
    }

    pub fn history(&self, video_id: &str) -> Result<Vec<LedgerEntry>> {
        self.ledger.entries(video_id).map_err(Error::Ledger)
    }

    fn lock_for(&self, video_id: &str) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(video_id.to_string()).or_default())
    }
}
