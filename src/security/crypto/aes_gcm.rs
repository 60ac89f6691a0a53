// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thin `ring::aead` wrapper: nonce construction, bulk seal/open, and the
//! empty-plaintext GMAC used to bind a ciphertext to one receiver.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::security::{SecurityError, SecurityErrorKind};

/// 96-bit IV: 32-bit session id (big-endian, matching wire order) followed
/// by a 64-bit CSPRNG suffix carried alongside the frame so the receiver can
/// reconstruct the same nonce.
pub fn build_nonce(session_id: u32, iv_suffix: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..4].copy_from_slice(&session_id.to_be_bytes());
    nonce[4..].copy_from_slice(&iv_suffix.to_be_bytes());
    nonce
}

/// Draws a fresh 64-bit IV suffix from the system CSPRNG.
pub fn random_iv_suffix(rng: &SystemRandom) -> u64 {
    let mut buf = [0u8; 8];
    rng.fill(&mut buf).expect("CSPRNG failure drawing IV suffix");
    u64::from_be_bytes(buf)
}

fn bound_key(session_key: &[u8; 32]) -> Result<LessSafeKey, SecurityError> {
    let unbound = UnboundKey::new(&AES_256_GCM, session_key)
        .map_err(|_| SecurityError::invalid_handle("bad AES-256-GCM key length"))?;
    Ok(LessSafeKey::new(unbound))
}

/// Seals `plaintext` in place, appending the 16-byte authentication tag.
/// Returns the combined ciphertext-and-tag buffer.
pub fn seal(
    session_key: &[u8; 32],
    session_id: u32,
    iv_suffix: u64,
    plaintext: &[u8],
) -> Result<Vec<u8>, SecurityError> {
    let key = bound_key(session_key)?;
    let nonce = Nonce::assume_unique_for_key(build_nonce(session_id, iv_suffix));
    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| SecurityError::new(SecurityErrorKind::AuthenticationFailed, "seal failed"))?;
    Ok(in_out)
}

/// Opens a buffer produced by [`seal`] in place, returning the plaintext.
pub fn open(
    session_key: &[u8; 32],
    session_id: u32,
    iv_suffix: u64,
    ciphertext_and_tag: &[u8],
) -> Result<Vec<u8>, SecurityError> {
    let key = bound_key(session_key)?;
    let nonce = Nonce::assume_unique_for_key(build_nonce(session_id, iv_suffix));
    let mut in_out = ciphertext_and_tag.to_vec();
    let plain_len = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| SecurityError::authentication_failed("body tag mismatch"))?
        .len();
    in_out.truncate(plain_len);
    Ok(in_out)
}

/// Computes the receiver-specific MAC: an AEAD seal of an *empty* plaintext
/// with `common_mac` as additional authenticated data. This is the
/// `EVP_EncryptUpdate(ctx, NULL, &outl, data, len)` idiom translated to
/// `ring` — AAD, never plaintext — so the result is exactly the 16-byte tag.
pub fn receiver_mac(
    session_key: &[u8; 32],
    session_id: u32,
    iv_suffix: u64,
    common_mac: &[u8; 16],
) -> Result<[u8; 16], SecurityError> {
    let key = bound_key(session_key)?;
    let nonce = Nonce::assume_unique_for_key(build_nonce(session_id, iv_suffix));
    let mut in_out: Vec<u8> = Vec::new();
    key.seal_in_place_append_tag(nonce, Aad::from(common_mac.as_slice()), &mut in_out)
        .map_err(|_| SecurityError::new(SecurityErrorKind::AuthenticationFailed, "receiver mac seal failed"))?;
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&in_out);
    Ok(tag)
}

/// Verifies a receiver-specific MAC produced by [`receiver_mac`].
pub fn verify_receiver_mac(
    session_key: &[u8; 32],
    session_id: u32,
    iv_suffix: u64,
    common_mac: &[u8; 16],
    candidate: &[u8; 16],
) -> Result<(), SecurityError> {
    let key = bound_key(session_key)?;
    let nonce = Nonce::assume_unique_for_key(build_nonce(session_id, iv_suffix));
    let mut in_out = candidate.to_vec();
    key.open_in_place(nonce, Aad::from(common_mac.as_slice()), &mut in_out)
        .map_err(|_| SecurityError::authentication_failed("receiver mac mismatch"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        [0x42; 32]
    }

    #[test]
    fn seal_then_open_roundtrips() {
        let k = key();
        let ct = seal(&k, 1, 0xAABB_CCDD_EEFF_0011, b"hello rtps").unwrap();
        let pt = open(&k, 1, 0xAABB_CCDD_EEFF_0011, &ct).unwrap();
        assert_eq!(pt, b"hello rtps");
    }

    #[test]
    fn bit_flip_in_body_fails_authentication() {
        let k = key();
        let mut ct = seal(&k, 1, 7, b"payload").unwrap();
        ct[0] ^= 0x01;
        assert!(open(&k, 1, 7, &ct).is_err());
    }

    #[test]
    fn wrong_session_id_fails_authentication() {
        let k = key();
        let ct = seal(&k, 1, 7, b"payload").unwrap();
        assert!(open(&k, 2, 7, &ct).is_err());
    }

    #[test]
    fn receiver_mac_roundtrips_and_rejects_wrong_common_mac() {
        let k = key();
        let common = [0x11u8; 16];
        let mac = receiver_mac(&k, 3, 99, &common).unwrap();
        assert!(verify_receiver_mac(&k, 3, 99, &common, &mac).is_ok());

        let wrong_common = [0x22u8; 16];
        assert!(verify_receiver_mac(&k, 3, 99, &wrong_common, &mac).is_err());
    }
}
