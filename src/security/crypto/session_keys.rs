// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-key-id session state: derivation, rotation, and the lock discipline
//! that keeps cipher operations out of the critical section.

use std::collections::HashMap;
use std::sync::Mutex;

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

/// Per-(sender-key-id or receiver-specific-key-id) cryptographic session state.
pub struct CipherData {
    pub master_key_id: [u8; 4],
    pub session_id: u32,
    pub session_key: [u8; 32],
    pub session_block_counter: u32,
    pub max_blocks_per_session: u32,
}

impl Drop for CipherData {
    fn drop(&mut self) {
        self.session_key.zeroize();
    }
}

/// `session_key = SHA-256( MK ‖ "SessionKey" ‖ S ‖ sid_le32 )`.
///
/// Hashes a correctly sized 78-byte buffer (`32 + 10 + 32 + 4`).
#[must_use]
pub fn compute_session_key(master_key: &[u8; 32], master_salt: &[u8; 32], session_id: u32) -> [u8; 32] {
    let mut source = [0u8; 78];
    source[..32].copy_from_slice(master_key);
    source[32..42].copy_from_slice(b"SessionKey");
    source[42..74].copy_from_slice(master_salt);
    source[74..78].copy_from_slice(&session_id.to_le_bytes());

    let digest = ring::digest::digest(&ring::digest::SHA256, &source);
    let mut key = [0u8; 32];
    key.copy_from_slice(digest.as_ref());
    key
}

fn random_session_id(rng: &SystemRandom) -> u32 {
    let mut buf = [0u8; 2];
    rng.fill(&mut buf).expect("CSPRNG failure initialising session id");
    u32::from(u16::from_le_bytes(buf))
}

/// Owns every [`CipherData`] the transform has created, exclusively keyed by
/// sender or receiver key id.
///
/// Protected by a single mutex; critical sections never hold it across AEAD
/// calls — callers take a snapshot of the session key and counter under the
/// lock, run the cipher lock-free, then report usage back under the lock.
pub struct SessionKeyStore {
    status: Mutex<HashMap<[u8; 4], CipherData>>,
    rng: SystemRandom,
}

impl Default for SessionKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: Mutex::new(HashMap::new()),
            rng: SystemRandom::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<[u8; 4], CipherData>> {
        match self.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::debug!("[SessionKeyStore::lock] Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Resolves the sender-side `CipherData` for `key_id`, rotating the
    /// session key if the block counter has reached `max_blocks_per_session`.
    /// Returns a snapshot `(session_id, session_key)` taken under the lock.
    pub fn prepare_sender(
        &self,
        key_id: [u8; 4],
        master_key: &[u8; 32],
        master_salt: &[u8; 32],
        max_blocks_per_session: u32,
    ) -> (u32, [u8; 32]) {
        let mut status = self.lock();
        let entry = status.entry(key_id).or_insert_with(|| {
            let sid = random_session_id(&self.rng);
            log::debug!("[SessionKeyStore] first use of key id {:?}, initial session {}", key_id, sid);
            CipherData {
                master_key_id: key_id,
                session_id: sid,
                session_key: [0u8; 32],
                // Force rotation on first use.
                session_block_counter: max_blocks_per_session,
                max_blocks_per_session,
            }
        });
        entry.max_blocks_per_session = max_blocks_per_session;

        if entry.session_block_counter >= entry.max_blocks_per_session {
            entry.session_id += 1;
            entry.session_key = compute_session_key(master_key, master_salt, entry.session_id);
            entry.session_block_counter = 0;
            log::debug!(
                "[SessionKeyStore] rotated session for key id {:?} to session {}",
                key_id,
                entry.session_id
            );
        }

        (entry.session_id, entry.session_key)
    }

    /// Accounts for one encode operation against `key_id`'s block counter.
    pub fn record_usage(&self, key_id: [u8; 4], blocks: u32) {
        if let Some(entry) = self.lock().get_mut(&key_id) {
            entry.session_block_counter = entry.session_block_counter.saturating_add(blocks);
        }
    }

    /// Resolves or creates the receiver-specific `CipherData`. If its
    /// recorded session id differs from `sender_session_id`, recomputes the
    /// receiver-specific session key at that session id.
    pub fn resolve_receiver(
        &self,
        receiver_key_id: [u8; 4],
        master_receiver_specific_key: &[u8; 32],
        master_salt: &[u8; 32],
        sender_session_id: u32,
    ) -> [u8; 32] {
        let mut status = self.lock();
        let entry = status.entry(receiver_key_id).or_insert_with(|| {
            let sid = random_session_id(&self.rng);
            CipherData {
                master_key_id: receiver_key_id,
                session_id: sid,
                session_key: [0u8; 32],
                session_block_counter: 0,
                max_blocks_per_session: u32::MAX,
            }
        });

        if entry.session_id != sender_session_id {
            entry.session_key =
                compute_session_key(master_receiver_specific_key, master_salt, sender_session_id);
            entry.session_id = sender_session_id;
        }
        entry.session_key
    }

    /// Looks up a previously derived sender session key at a specific
    /// session id, re-deriving it deterministically (decode never needs the
    /// counter, only the pure function of key id and session id).
    #[must_use]
    pub fn derive_at(master_key: &[u8; 32], master_salt: &[u8; 32], session_id: u32) -> [u8; 32] {
        compute_session_key(master_key, master_salt, session_id)
    }

    #[must_use]
    pub fn session_id_of(&self, key_id: [u8; 4]) -> Option<u32> {
        self.lock().get(&key_id).map(|e| e.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_session_key_is_pure() {
        let mk = [1u8; 32];
        let salt = [2u8; 32];
        let a = compute_session_key(&mk, &salt, 7);
        let b = compute_session_key(&mk, &salt, 7);
        assert_eq!(a, b);
        let c = compute_session_key(&mk, &salt, 8);
        assert_ne!(a, c);
    }

    #[test]
    fn first_use_forces_rotation() {
        let store = SessionKeyStore::new();
        let mk = [3u8; 32];
        let salt = [4u8; 32];
        let (sid1, key1) = store.prepare_sender([1, 2, 3, 4], &mk, &salt, 100);
        assert_eq!(key1, compute_session_key(&mk, &salt, sid1));
    }

    // Scenario S6 (session rotation).
    #[test]
    fn rotates_after_max_blocks() {
        let store = SessionKeyStore::new();
        let mk = [5u8; 32];
        let salt = [6u8; 32];
        let key_id = [9, 9, 9, 9];
        let (sid1, key1) = store.prepare_sender(key_id, &mk, &salt, 3);
        store.record_usage(key_id, 3);

        let (sid2, key2) = store.prepare_sender(key_id, &mk, &salt, 3);
        assert!(sid2 > sid1);
        assert_ne!(key1, key2);
    }

    #[test]
    fn receiver_session_key_recomputes_on_sid_change() {
        let store = SessionKeyStore::new();
        let mk = [7u8; 32];
        let salt = [8u8; 32];
        let receiver_id = [1, 1, 1, 1];

        let k1 = store.resolve_receiver(receiver_id, &mk, &salt, 5);
        let k2 = store.resolve_receiver(receiver_id, &mk, &salt, 5);
        assert_eq!(k1, k2, "same sid should not recompute");

        let k3 = store.resolve_receiver(receiver_id, &mk, &salt, 6);
        assert_ne!(k1, k3);
        assert_eq!(k3, compute_session_key(&mk, &salt, 6));
    }
}
