use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Map size past which a lookup first evicts stale hashes.
pub const CLEANUP_THRESHOLD: usize = 1000;

// Short-window de-duplication of message bodies, keyed by a content hash
pub struct DuplicateGuard {
    seen: DashMap<String, DateTime<Utc>>,
    window: TimeDelta,
}

impl DuplicateGuard {
    pub fn new(window: TimeDelta) -> Self {
        Self {
            seen: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn is_duplicate(&self, content: &str) -> bool {
        self.is_duplicate_at(content, Utc::now())
    }

    /// True if `content` was recorded less than one window before `now`.
    /// Otherwise records `now` for it and returns false. A repeat inside
    /// the window does not refresh the timestamp.
    pub fn is_duplicate_at(&self, content: &str, now: DateTime<Utc>) -> bool {
        if self.seen.len() > CLEANUP_THRESHOLD {
            self.evict_expired(now);
        }

        match self.seen.entry(content_hash(content)) {
            Entry::Occupied(mut seen) => {
                if now - *seen.get() < self.window {
                    return true;
                }
                seen.insert(now);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                false
            }
        }
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        let window = self.window;
        self.seen.retain(|_, last_seen| now - *last_seen < window);
        before.saturating_sub(self.seen.len())
    }
}

/// Polynomial rolling hash (`h * 31 + unit`) over UTF-16 code units,
/// wrapping at 32 bits and rendered in base 36. Cheap, not collision
/// resistant.
pub fn content_hash(content: &str) -> String {
    let hash = content
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    to_base36(hash)
}

fn to_base36(value: i32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut magnitude = i64::from(value).unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        digits.push(DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
