//! Fixed-window rate limiting.
//!
//! One algorithm, two kinds of storage:
//!
//! - [`MemoryStore`] backs the gateway. Keys are client identifiers (a hash of
//!   forwarded IP and user agent); a background sweep drops expired windows.
//! - [`FileStore`] backs the `contact-submit` client. Keys are fixed per form and
//!   the state is written to disk so limits survive a restart inside the window.
//!
//! Windows reset unconditionally once `now > reset_time`, so up to twice the
//! nominal rate can pass around a window boundary.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::RateLimitDecision;

/// Per-form key used by the client-side limiter.
pub const CONTACT_FORM_KEY: &str = "contact_form";
pub const CONTACT_LIMIT: u32 = 3;
pub const API_LIMIT: u32 = 30;

pub fn contact_window() -> TimeDelta {
    TimeDelta::hours(1)
}

pub fn api_window() -> TimeDelta {
    TimeDelta::minutes(1)
}

// Rate limit entry - tracks requests per identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.reset_time
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate limit state I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("rate limit state is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("rate limit state lock poisoned")]
    Poisoned,
}

/// Storage seam for [`RateLimiter`]. `update` must apply `f` atomically
/// with respect to other calls on the same key.
pub trait RateLimitStore: Send + Sync {
    fn update<F>(&self, key: &str, f: F) -> Result<RateLimitEntry, StoreError>
    where
        F: FnOnce(Option<RateLimitEntry>) -> RateLimitEntry;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Drop every entry whose window closed before `now`; returns how many went.
    fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, RateLimitEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn update<F>(&self, key: &str, f: F) -> Result<RateLimitEntry, StoreError>
    where
        F: FnOnce(Option<RateLimitEntry>) -> RateLimitEntry,
    {
        let updated = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let next = f(Some(*slot.get()));
                slot.insert(next);
                next
            }
            Entry::Vacant(slot) => *slot.insert(f(None)),
        };
        Ok(updated)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// JSON file of `{ key: entry }`, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl FileStore {
    /// Load state from `path`; a missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, RateLimitEntry>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RateLimitStore for FileStore {
    fn update<F>(&self, key: &str, f: F) -> Result<RateLimitEntry, StoreError>
    where
        F: FnOnce(Option<RateLimitEntry>) -> RateLimitEntry,
    {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let next = f(entries.get(key).copied());

        // memory only follows once the file has the change
        let mut staged = entries.clone();
        staged.insert(key.to_string(), next);
        self.persist(&staged)?;
        *entries = staged;
        Ok(next)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if entries.contains_key(key) {
            let mut staged = entries.clone();
            staged.remove(key);
            self.persist(&staged)?;
            *entries = staged;
        }
        Ok(())
    }

    fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut staged = entries.clone();
        staged.retain(|_, entry| entry.is_live(now));
        let removed = entries.len() - staged.len();
        if removed > 0 {
            self.persist(&staged)?;
            *entries = staged;
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

pub struct RateLimiter<S = MemoryStore> {
    store: S,
    ceiling: u32,
    interval: TimeDelta,
}

impl RateLimiter<MemoryStore> {
    pub fn in_memory(ceiling: u32, interval: TimeDelta) -> Self {
        Self::with_store(MemoryStore::new(), ceiling, interval)
    }

    /// 3 submissions per hour.
    pub fn contact_form() -> Self {
        Self::in_memory(CONTACT_LIMIT, contact_window())
    }

    /// 30 requests per minute.
    pub fn api() -> Self {
        Self::in_memory(API_LIMIT, api_window())
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn with_store(store: S, ceiling: u32, interval: TimeDelta) -> Self {
        Self {
            store,
            ceiling,
            interval,
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn check(&self, identifier: &str) -> Result<RateLimitDecision, StoreError> {
        self.check_at(identifier, Utc::now())
    }

    /// Count one request for `identifier` at `now`.
    pub fn check_at(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        let ceiling = self.ceiling;
        let mut allowed = false;

        let entry = self.store.update(identifier, |current| match current {
            Some(entry) if entry.is_live(now) => {
                if entry.count >= ceiling {
                    entry
                } else {
                    allowed = true;
                    RateLimitEntry {
                        count: entry.count + 1,
                        ..entry
                    }
                }
            }
            // first request, or the window has passed
            _ => {
                allowed = ceiling > 0;
                RateLimitEntry {
                    count: u32::from(allowed),
                    reset_time: now
                        .checked_add_signed(self.interval)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                }
            }
        })?;

        Ok(RateLimitDecision {
            allowed,
            remaining: ceiling.saturating_sub(entry.count),
            reset_time: entry.reset_time,
        })
    }

    pub fn reset(&self, identifier: &str) -> Result<(), StoreError> {
        self.store.remove(identifier)
    }

    pub fn sweep(&self) -> Result<usize, StoreError> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.store.remove_expired(now)
    }

    pub fn tracked(&self) -> usize {
        self.store.len()
    }
}

/// Whole minutes until `reset_time`, rounded up, never less than one.
pub fn minutes_until_reset(reset_time: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (reset_time - now).num_seconds();
    ((seconds + 59) / 60).max(1)
}

/// Opaque key for a client: SHA-256 of forwarded IP and user agent.
pub fn client_identifier(forwarded_ip: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(forwarded_ip.as_bytes());
    hasher.update(b":");
    hasher.update(user_agent.as_bytes());
    format!("{:x}", hasher.finalize())
}
