// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! AES-GCM transform orchestrator: ties key material, session-key rotation,
//! AEAD primitives, and wire framing into `encode_*`/`decode_*` operations.

mod aes_gcm;
mod key_material;
mod session_keys;
mod wire;

pub use key_material::{ReceiverKeyMaterial, SenderKeyMaterial};
pub use session_keys::{compute_session_key, CipherData, SessionKeyStore};

use ring::rand::SystemRandom;

use crate::security::SecurityError;

/// `max_blocks_per_session` ceiling and any future transform-wide knobs.
#[derive(Clone, Copy, Debug)]
pub struct SecurityTransformConfig {
    pub max_blocks_per_session: u32,
}

impl Default for SecurityTransformConfig {
    fn default() -> Self {
        Self {
            max_blocks_per_session: 12_000,
        }
    }
}

/// Owns the per-key-id session state and exposes the encode/decode surface.
pub struct CryptoTransform {
    store: SessionKeyStore,
    config: SecurityTransformConfig,
    rng: SystemRandom,
}

impl CryptoTransform {
    #[must_use]
    pub fn new(config: SecurityTransformConfig) -> Self {
        Self {
            store: SessionKeyStore::new(),
            config,
            rng: SystemRandom::new(),
        }
    }

    /// `encode_serialized_payload`: session-keyed AEAD seal of one payload.
    pub fn encode_serialized_payload(
        &self,
        key: &SenderKeyMaterial,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let (session_id, session_key) = self.store.prepare_sender(
            key.sender_key_id,
            &key.master_sender_key,
            &key.master_salt,
            self.config.max_blocks_per_session,
        );
        let iv_suffix = aes_gcm::random_iv_suffix(&self.rng);
        let sealed = aes_gcm::seal(&session_key, session_id, iv_suffix, plaintext)?;
        self.store.record_usage(key.sender_key_id, 1);

        let (body, common_mac) = split_sealed(&sealed, plaintext.len())?;
        let header = wire::FrameHeader {
            transformation_kind: key.transformation_kind,
            transformation_key_id: key.sender_key_id,
            session_id,
            iv_suffix,
            body_len: body.len() as u32,
        };
        Ok(wire::write_payload_frame(&header, body, &common_mac))
    }

    /// `decode` of a payload frame: derives the sender's session key at the
    /// frame's `session_id` and verifies the common MAC while decrypting.
    pub fn decode_serialized_payload(
        &self,
        key: &SenderKeyMaterial,
        frame: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let (header, body, common_mac) = wire::read_payload_frame(frame)?;
        let session_key =
            SessionKeyStore::derive_at(&key.master_sender_key, &key.master_salt, header.session_id);
        open_body(&session_key, header.session_id, header.iv_suffix, body, &common_mac)
    }

    /// `encode_rtps_message`: payload encode plus a receiver-bound MAC per receiver.
    pub fn encode_rtps_message(
        &self,
        key: &SenderKeyMaterial,
        receivers: &[ReceiverKeyMaterial],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let (session_id, session_key) = self.store.prepare_sender(
            key.sender_key_id,
            &key.master_sender_key,
            &key.master_salt,
            self.config.max_blocks_per_session,
        );
        let iv_suffix = aes_gcm::random_iv_suffix(&self.rng);
        let sealed = aes_gcm::seal(&session_key, session_id, iv_suffix, plaintext)?;
        self.store.record_usage(key.sender_key_id, 1);

        let (body, common_mac) = split_sealed(&sealed, plaintext.len())?;
        let header = wire::FrameHeader {
            transformation_kind: key.transformation_kind,
            transformation_key_id: key.sender_key_id,
            session_id,
            iv_suffix,
            body_len: body.len() as u32,
        };
        let mut out = wire::write_payload_frame(&header, body, &common_mac);

        let mut receiver_macs = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            let receiver_key = self.store.resolve_receiver(
                receiver.receiver_specific_key_id,
                &receiver.master_receiver_specific_key,
                &receiver.master_salt,
                session_id,
            );
            let mac = aes_gcm::receiver_mac(&receiver_key, session_id, iv_suffix, &common_mac)?;
            receiver_macs.push((receiver.receiver_specific_key_id, mac));
        }
        wire::append_receiver_macs(&mut out, &receiver_macs);
        Ok(out)
    }

    /// `decode_rtps_message`: finds this receiver's MAC entry, verifies it,
    /// then decrypts the body against the sender's session key.
    pub fn decode_rtps_message(
        &self,
        key: &SenderKeyMaterial,
        receiver: &ReceiverKeyMaterial,
        frame: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let (header, body, common_mac) = wire::read_payload_frame(frame)?;
        let receiver_macs = wire::read_receiver_macs(frame, wire::HEADER_LEN + body.len() + wire::TAG_LEN)?;

        let own_mac = receiver_macs
            .iter()
            .find(|(key_id, _)| *key_id == receiver.receiver_specific_key_id)
            .map(|(_, mac)| *mac)
            .ok_or_else(|| SecurityError::authentication_failed("no receiver mac addressed to this key id"))?;

        let receiver_session_key = SessionKeyStore::derive_at(
            &receiver.master_receiver_specific_key,
            &receiver.master_salt,
            header.session_id,
        );
        aes_gcm::verify_receiver_mac(
            &receiver_session_key,
            header.session_id,
            header.iv_suffix,
            &common_mac,
            &own_mac,
        )?;

        let sender_session_key =
            SessionKeyStore::derive_at(&key.master_sender_key, &key.master_salt, header.session_id);
        open_body(&sender_session_key, header.session_id, header.iv_suffix, body, &common_mac)
    }

    pub fn encode_datawriter_submessage(&self) -> Result<Vec<u8>, SecurityError> {
        Err(SecurityError::not_implemented("encode_datawriter_submessage"))
    }

    pub fn encode_datareader_submessage(&self) -> Result<Vec<u8>, SecurityError> {
        Err(SecurityError::not_implemented("encode_datareader_submessage"))
    }

    pub fn decode_datawriter_submessage(&self) -> Result<Vec<u8>, SecurityError> {
        Err(SecurityError::not_implemented("decode_datawriter_submessage"))
    }

    pub fn decode_datareader_submessage(&self) -> Result<Vec<u8>, SecurityError> {
        Err(SecurityError::not_implemented("decode_datareader_submessage"))
    }

    pub fn preprocess_secure_submsg(&self) -> Result<Vec<u8>, SecurityError> {
        Err(SecurityError::not_implemented("preprocess_secure_submsg"))
    }
}

fn split_sealed(sealed: &[u8], plaintext_len: usize) -> Result<(&[u8], [u8; wire::TAG_LEN]), SecurityError> {
    if sealed.len() != plaintext_len + wire::TAG_LEN {
        return Err(SecurityError::malformed("sealed buffer has unexpected length"));
    }
    let (body, tag) = sealed.split_at(plaintext_len);
    let mut common_mac = [0u8; wire::TAG_LEN];
    common_mac.copy_from_slice(tag);
    Ok((body, common_mac))
}

fn open_body(
    session_key: &[u8; 32],
    session_id: u32,
    iv_suffix: u64,
    body: &[u8],
    common_mac: &[u8; wire::TAG_LEN],
) -> Result<Vec<u8>, SecurityError> {
    let mut ciphertext_and_tag = Vec::with_capacity(body.len() + wire::TAG_LEN);
    ciphertext_and_tag.extend_from_slice(body);
    ciphertext_and_tag.extend_from_slice(common_mac);
    aes_gcm::open(session_key, session_id, iv_suffix, &ciphertext_and_tag)
}
