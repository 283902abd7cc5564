//! In-memory broker of short numeric relay codes.
//!
//! Each code is a zero-padded decimal string of a fixed width, bound to an
//! opaque payload until its TTL runs out. The whole draw-check-insert sequence
//! of [`CodeBroker::allocate`] runs under one mutex, so a code is never handed
//! to two callers, and no `.await` happens while the lock is held: a cancelled
//! request either committed its code or left no trace.

use parking_lot::Mutex;
use rand::Rng;
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_CODE_WIDTH: u32 = 5;
pub const MAX_CODE_WIDTH: u32 = 9;

// Random draws before falling back to a linear probe.
const RANDOM_DRAWS: usize = 32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    #[error("all codes are currently in use")]
    KeyspaceExhausted,
    #[error("code not found or expired")]
    NotFoundOrExpired,
}

impl BrokerError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeyspaceExhausted => "keyspace_exhausted",
            Self::NotFoundOrExpired => "not_found_or_expired",
        }
    }
}

/// Opaque bytes bound to a code. `Debug` never prints the contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

struct CodeEntry {
    payload: Payload,
    // `None` when the TTL overflows the clock; such an entry never expires.
    expires_at: Option<Instant>,
}

impl CodeEntry {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Live entries plus an expiry-ordered index over them.
#[derive(Default)]
struct Slots {
    entries: HashMap<u32, CodeEntry>,
    expiries: BTreeSet<(Instant, u32)>,
}

impl Slots {
    fn insert(&mut self, key: u32, entry: CodeEntry) {
        if let Some(expires_at) = entry.expires_at {
            self.expiries.insert((expires_at, key));
        }
        if let Some(previous) = self.entries.insert(key, entry) {
            self.forget(key, &previous);
        }
    }

    fn remove(&mut self, key: u32) {
        if let Some(entry) = self.entries.remove(&key) {
            self.forget(key, &entry);
        }
    }

    fn forget(&mut self, key: u32, entry: &CodeEntry) {
        if let Some(expires_at) = entry.expires_at {
            self.expiries.remove(&(expires_at, key));
        }
    }

    // Pops expired heads only; live entries are never visited.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(&(expires_at, key)) = self.expiries.first() {
            if expires_at > now {
                break;
            }
            self.expiries.pop_first();
            self.entries.remove(&key);
            removed += 1;
        }
        removed
    }
}

pub struct CodeBroker {
    width: usize,
    keyspace: u32,
    slots: Mutex<Slots>,
}

impl fmt::Debug for CodeBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBroker")
            .field("width", &self.width)
            .field("keyspace", &self.keyspace)
            .field("entries", &self.slots.lock().entries.len())
            .finish()
    }
}

impl Default for CodeBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_WIDTH)
    }
}

impl CodeBroker {
    /// Create a broker issuing codes of `width` digits, clamped to `1..=9`.
    #[must_use]
    pub fn new(width: u32) -> Self {
        let width = width.clamp(1, MAX_CODE_WIDTH);
        Self {
            width: width as usize,
            keyspace: 10u32.pow(width),
            slots: Mutex::new(Slots::default()),
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of distinct codes this broker can hand out at once.
    #[must_use]
    pub const fn keyspace(&self) -> u32 {
        self.keyspace
    }

    /// Reserve a free code for `payload`, live for `ttl`.
    ///
    /// # Errors
    /// Returns [`BrokerError::KeyspaceExhausted`] when every code is live.
    pub fn allocate(&self, payload: Payload, ttl: Duration) -> Result<String, BrokerError> {
        self.allocate_at(payload, ttl, Instant::now())
    }

    /// [`CodeBroker::allocate`] with an explicit clock.
    ///
    /// # Errors
    /// Returns [`BrokerError::KeyspaceExhausted`] when every code is live at `now`.
    pub fn allocate_at(
        &self,
        payload: Payload,
        ttl: Duration,
        now: Instant,
    ) -> Result<String, BrokerError> {
        let mut slots = self.slots.lock();

        // Expired entries must not count toward exhaustion.
        slots.purge_expired(now);

        if slots.entries.len() >= self.keyspace as usize {
            warn!(
                keyspace = self.keyspace,
                "code allocation failed: keyspace exhausted"
            );
            return Err(BrokerError::KeyspaceExhausted);
        }

        let code = self.pick_free(&slots.entries);
        slots.insert(
            code,
            CodeEntry {
                payload,
                expires_at: now.checked_add(ttl),
            },
        );
        debug!(live = slots.entries.len(), "code allocated");

        Ok(self.format(code))
    }

    /// Payload for `code` if it exists and has not expired.
    ///
    /// # Errors
    /// Returns [`BrokerError::NotFoundOrExpired`] for unknown, expired or malformed codes.
    pub fn get(&self, code: &str) -> Result<Payload, BrokerError> {
        self.get_at(code, Instant::now())
    }

    /// [`CodeBroker::get`] with an explicit clock. Expired entries are evicted.
    ///
    /// # Errors
    /// Returns [`BrokerError::NotFoundOrExpired`] for unknown, expired or malformed codes.
    pub fn get_at(&self, code: &str, now: Instant) -> Result<Payload, BrokerError> {
        let key = self.parse(code).ok_or(BrokerError::NotFoundOrExpired)?;

        let mut slots = self.slots.lock();
        match slots.entries.get(&key) {
            Some(entry) if entry.is_live(now) => Ok(entry.payload.clone()),
            Some(_) => {
                slots.remove(key);
                Err(BrokerError::NotFoundOrExpired)
            }
            None => Err(BrokerError::NotFoundOrExpired),
        }
    }

    /// Remove `code`. Deleting a missing code is a no-op.
    pub fn delete(&self, code: &str) {
        if let Some(key) = self.parse(code) {
            self.slots.lock().remove(key);
        }
    }

    /// Live codes starting with `prefix`.
    #[must_use]
    pub fn list_by_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.list_by_prefix_at(prefix, Instant::now())
    }

    /// [`CodeBroker::list_by_prefix`] with an explicit clock.
    #[must_use]
    pub fn list_by_prefix_at(&self, prefix: &str, now: Instant) -> BTreeSet<String> {
        let slots = self.slots.lock();
        slots
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(code, _)| self.format(*code))
            .filter(|code| code.starts_with(prefix))
            .collect()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// [`CodeBroker::purge_expired`] with an explicit clock.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        self.slots.lock().purge_expired(now)
    }

    /// Number of live entries. Expired entries are purged first.
    #[must_use]
    pub fn len_live(&self) -> usize {
        let mut slots = self.slots.lock();
        slots.purge_expired(Instant::now());
        slots.entries.len()
    }

    // Caller holds the lock and has checked there is at least one free slot.
    fn pick_free(&self, entries: &HashMap<u32, CodeEntry>) -> u32 {
        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_DRAWS {
            let candidate = rng.gen_range(0..self.keyspace);
            if !entries.contains_key(&candidate) {
                return candidate;
            }
        }

        let start = rng.gen_range(0..self.keyspace);
        (0..self.keyspace)
            .map(|offset| (start + offset) % self.keyspace)
            .find(|candidate| !entries.contains_key(candidate))
            .unwrap_or(start)
    }

    fn format(&self, code: u32) -> String {
        format!("{code:0width$}", width = self.width)
    }

    fn parse(&self, code: &str) -> Option<u32> {
        if code.len() != self.width || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        code.parse().ok()
    }
}

/// Periodically purge expired codes so memory does not grow with abandoned lookups.
pub fn spawn_janitor(broker: Arc<CodeBroker>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = broker.purge_expired();
            if removed > 0 {
                info!(removed, "purged expired codes");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

    #[test]
    fn allocate_returns_fixed_width_digits() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let code = broker.allocate(Payload::from("+15550100"), FIFTEEN_MINUTES)?;
        assert_eq!(code.len(), 5);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
        Ok(())
    }

    #[test]
    fn get_respects_ttl_boundary() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let start = Instant::now();
        let payload = Payload::from(r#"{"contact":"+15550100"}"#);
        let code = broker.allocate_at(payload.clone(), FIFTEEN_MINUTES, start)?;

        let just_before = start + FIFTEEN_MINUTES - Duration::from_millis(1);
        assert_eq!(broker.get_at(&code, just_before)?, payload);

        let just_after = start + FIFTEEN_MINUTES + Duration::from_millis(1);
        assert_eq!(
            broker.get_at(&code, just_after),
            Err(BrokerError::NotFoundOrExpired)
        );
        Ok(())
    }

    #[test]
    fn expired_and_unknown_codes_fail_identically() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let start = Instant::now();
        let code = broker.allocate_at(Payload::from("x"), Duration::from_secs(1), start)?;

        let expired = broker.get_at(&code, start + Duration::from_secs(2));
        let unknown = if code == "99999" { "00000" } else { "99999" };
        let missing = broker.get_at(unknown, start);
        let malformed = broker.get_at("12a45", start);
        let wrong_width = broker.get_at("123", start);

        assert_eq!(expired, Err(BrokerError::NotFoundOrExpired));
        assert_eq!(expired, missing);
        assert_eq!(missing, malformed);
        assert_eq!(malformed, wrong_width);
        Ok(())
    }

    #[test]
    fn repeated_get_within_ttl_returns_payload() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let code = broker.allocate(Payload::from("contact"), FIFTEEN_MINUTES)?;
        for _ in 0..3 {
            assert_eq!(broker.get(&code)?.as_bytes(), b"contact");
        }
        Ok(())
    }

    #[test]
    fn delete_is_idempotent() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let code = broker.allocate(Payload::from("contact"), FIFTEEN_MINUTES)?;

        broker.delete(&code);
        broker.delete(&code);
        broker.delete("not-a-code");

        assert_eq!(broker.get(&code), Err(BrokerError::NotFoundOrExpired));
        Ok(())
    }

    #[test]
    fn exhaustion_fails_without_hanging() -> Result<(), BrokerError> {
        let broker = CodeBroker::new(2);
        let mut codes = HashSet::new();
        for _ in 0..broker.keyspace() {
            codes.insert(broker.allocate(Payload::from("p"), FIFTEEN_MINUTES)?);
        }
        assert_eq!(codes.len(), 100);

        assert_eq!(
            broker.allocate(Payload::from("p"), FIFTEEN_MINUTES),
            Err(BrokerError::KeyspaceExhausted)
        );
        Ok(())
    }

    #[test]
    fn expired_entries_do_not_count_toward_exhaustion() -> Result<(), BrokerError> {
        let broker = CodeBroker::new(1);
        let start = Instant::now();
        for _ in 0..10 {
            broker.allocate_at(Payload::from("p"), Duration::from_secs(5), start)?;
        }
        assert_eq!(
            broker.allocate_at(Payload::from("p"), Duration::from_secs(5), start),
            Err(BrokerError::KeyspaceExhausted)
        );

        let later = start + Duration::from_secs(6);
        broker.allocate_at(Payload::from("p"), Duration::from_secs(5), later)?;
        assert_eq!(broker.list_by_prefix_at("", later).len(), 1);
        Ok(())
    }

    #[test]
    fn deleting_frees_a_slot_in_a_full_keyspace() -> Result<(), BrokerError> {
        let broker = CodeBroker::new(1);
        let mut last = String::new();
        for _ in 0..10 {
            last = broker.allocate(Payload::from("p"), FIFTEEN_MINUTES)?;
        }
        broker.delete(&last);

        assert_eq!(broker.allocate(Payload::from("q"), FIFTEEN_MINUTES)?, last);
        Ok(())
    }

    #[test]
    fn list_by_prefix_only_reports_live_codes() -> Result<(), BrokerError> {
        let broker = CodeBroker::new(2);
        let start = Instant::now();
        let mut short_lived = BTreeSet::new();
        let mut long_lived = BTreeSet::new();
        for i in 0..20 {
            let ttl = if i % 2 == 0 {
                Duration::from_secs(1)
            } else {
                FIFTEEN_MINUTES
            };
            let code = broker.allocate_at(Payload::from("p"), ttl, start)?;
            if i % 2 == 0 {
                short_lived.insert(code);
            } else {
                long_lived.insert(code);
            }
        }

        let later = start + Duration::from_secs(2);
        assert_eq!(broker.list_by_prefix_at("", later), long_lived);

        let prefixed: BTreeSet<String> = long_lived
            .iter()
            .filter(|code| code.starts_with('1'))
            .cloned()
            .collect();
        assert_eq!(broker.list_by_prefix_at("1", later), prefixed);
        Ok(())
    }

    #[test]
    fn purge_removes_only_expired() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let start = Instant::now();
        broker.allocate_at(Payload::from("a"), Duration::from_secs(1), start)?;
        broker.allocate_at(Payload::from("b"), Duration::from_secs(1), start)?;
        let keep = broker.allocate_at(Payload::from("c"), FIFTEEN_MINUTES, start)?;

        assert_eq!(broker.purge_expired_at(start + Duration::from_secs(5)), 2);
        assert_eq!(broker.get_at(&keep, start + Duration::from_secs(5))?.as_bytes(), b"c");
        Ok(())
    }

    #[test]
    fn concurrent_allocations_are_pairwise_distinct() {
        let broker = Arc::new(CodeBroker::new(3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let broker = Arc::clone(&broker);
                thread::spawn(move || {
                    (0..125)
                        .map(|_| broker.allocate(Payload::from("p"), FIFTEEN_MINUTES))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut codes = HashSet::new();
        for handle in handles {
            for result in handle.join().expect("allocator thread panicked") {
                let code = result.expect("keyspace has room for every caller");
                assert!(codes.insert(code), "duplicate code handed out");
            }
        }

        assert_eq!(codes.len(), 1000);
        assert_eq!(
            broker.allocate(Payload::from("p"), FIFTEEN_MINUTES),
            Err(BrokerError::KeyspaceExhausted)
        );
    }

    #[test]
    fn default_keyspace_fills_and_exhausts_quickly() -> Result<(), BrokerError> {
        let broker = CodeBroker::default();
        let started = Instant::now();
        for _ in 0..broker.keyspace() {
            broker.allocate(Payload::from("p"), FIFTEEN_MINUTES)?;
        }
        assert!(
            started.elapsed() < Duration::from_secs(30),
            "filling 100000 codes took {:?}",
            started.elapsed()
        );

        let exhausted_at = Instant::now();
        assert_eq!(
            broker.allocate(Payload::from("p"), FIFTEEN_MINUTES),
            Err(BrokerError::KeyspaceExhausted)
        );
        assert!(exhausted_at.elapsed() < Duration::from_millis(50));
        Ok(())
    }

    #[test]
    fn expiry_index_tracks_evictions_and_deletes() -> Result<(), BrokerError> {
        let broker = CodeBroker::new(2);
        let start = Instant::now();
        let evicted = broker.allocate_at(Payload::from("a"), Duration::from_secs(1), start)?;
        let deleted = broker.allocate_at(Payload::from("b"), Duration::from_secs(1), start)?;
        broker.allocate_at(Payload::from("c"), Duration::from_secs(1), start)?;
        broker.allocate_at(Payload::from("d"), Duration::MAX, start)?;

        let later = start + Duration::from_secs(2);
        assert!(broker.get_at(&evicted, later).is_err());
        broker.delete(&deleted);
        {
            let slots = broker.slots.lock();
            assert_eq!(slots.entries.len(), 2);
            assert_eq!(slots.expiries.len(), 1);
        }

        assert_eq!(broker.purge_expired_at(later), 1);
        let slots = broker.slots.lock();
        assert_eq!(slots.entries.len(), 1);
        assert!(slots.expiries.is_empty());
        Ok(())
    }

    #[test]
    fn width_is_clamped() {
        assert_eq!(CodeBroker::new(0).width(), 1);
        assert_eq!(CodeBroker::new(12).keyspace(), 1_000_000_000);
    }

    #[test]
    fn payload_debug_is_redacted() {
        let rendered = format!("{:?}", Payload::from("+15550100"));
        assert_eq!(rendered, "Payload(9 bytes)");
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_purges_in_background() -> Result<(), BrokerError> {
        let broker = Arc::new(CodeBroker::default());
        broker.allocate(Payload::from("p"), Duration::ZERO)?;

        let handle = spawn_janitor(Arc::clone(&broker), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.abort();

        assert_eq!(broker.slots.lock().entries.len(), 0);
        Ok(())
    }
}
