// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![cfg(feature = "security")]
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::unreadable_literal)] // Test key material bytes

use std::collections::HashSet;

use rtps_reliable_core::security::{ReceiverKeyMaterial, SenderKeyMaterial};
use rtps_reliable_core::{CryptoTransform, SecurityTransformConfig};

fn sender_key() -> SenderKeyMaterial {
    SenderKeyMaterial {
        transformation_kind: [0, 0, 0, 1],
        master_sender_key: [0xAB; 32],
        master_salt: [0xCD; 32],
        sender_key_id: [0x0A, 0x0B, 0x0C, 0x0D],
    }
}

fn receiver_key(id: [u8; 4]) -> ReceiverKeyMaterial {
    ReceiverKeyMaterial {
        master_receiver_specific_key: [0xEF; 32],
        master_salt: [0x12; 32],
        receiver_specific_key_id: id,
    }
}

// Scenario S4.
#[test]
fn payload_frame_has_the_expected_length_and_round_trips() {
    let transform = CryptoTransform::new(SecurityTransformConfig::default());
    let key = sender_key();

    let frame = transform.encode_serialized_payload(&key, b"hello").unwrap();
    assert_eq!(frame.len(), 4 + 4 + 4 + 8 + 4 + 5 + 16);

    let plaintext = transform.decode_serialized_payload(&key, &frame).unwrap();
    assert_eq!(plaintext, b"hello");
}

// Scenario S5.
#[test]
fn message_to_two_receivers_carries_exactly_two_receiver_macs() {
    let transform = CryptoTransform::new(SecurityTransformConfig::default());
    let key = sender_key();
    let receivers = vec![receiver_key([1, 1, 1, 1]), receiver_key([2, 2, 2, 2])];

    let frame = transform.encode_rtps_message(&key, &receivers, b"telemetry").unwrap();

    for receiver in &receivers {
        let plaintext = transform.decode_rtps_message(&key, receiver, &frame).unwrap();
        assert_eq!(plaintext, b"telemetry");
    }
}

// Invariant 6: any single-bit mutation anywhere in the frame fails authentication.
#[test]
fn bit_flips_in_body_common_mac_or_iv_suffix_all_fail_authentication() {
    let transform = CryptoTransform::new(SecurityTransformConfig::default());
    let key = sender_key();
    let base = transform.encode_serialized_payload(&key, b"authenticated").unwrap();

    // Body byte (offset 24 is the first body byte).
    let mut body_flip = base.clone();
    body_flip[24] ^= 0x01;
    assert!(transform.decode_serialized_payload(&key, &body_flip).is_err());

    // Common MAC (last 16 bytes).
    let mut mac_flip = base.clone();
    let last = mac_flip.len() - 1;
    mac_flip[last] ^= 0x01;
    assert!(transform.decode_serialized_payload(&key, &mac_flip).is_err());

    // IV suffix (offset 12..20).
    let mut iv_flip = base;
    iv_flip[12] ^= 0x01;
    assert!(transform.decode_serialized_payload(&key, &iv_flip).is_err());
}

// Invariant 7: a receiver absent from the MAC list is rejected even though
// the sender session key would otherwise decrypt the body.
#[test]
fn receiver_not_addressed_by_the_message_is_rejected() {
    let transform = CryptoTransform::new(SecurityTransformConfig::default());
    let key = sender_key();
    let addressed = receiver_key([9, 9, 9, 9]);
    let frame = transform.encode_rtps_message(&key, &[addressed], b"secret").unwrap();

    let stranger = receiver_key([0xFF, 0xFF, 0xFF, 0xFF]);
    assert!(transform.decode_rtps_message(&key, &stranger, &frame).is_err());
}

// Scenario S6 / invariant 8: after max_blocks_per_session encodes, the next
// encode uses a strictly greater session id and a freshly derived key.
#[test]
fn session_rotates_after_the_configured_block_ceiling() {
    let transform = CryptoTransform::new(SecurityTransformConfig {
        max_blocks_per_session: 4,
    });
    let key = sender_key();

    let mut session_ids = Vec::new();
    let mut frames = Vec::new();
    for _ in 0..5 {
        let frame = transform.encode_serialized_payload(&key, b"x").unwrap();
        session_ids.push(u32::from_le_bytes(frame[8..12].try_into().unwrap()));
        frames.push(frame);
    }

    assert!(session_ids[4] > session_ids[0], "session id must have rotated at least once");

    for frame in &frames {
        assert_eq!(transform.decode_serialized_payload(&key, frame).unwrap(), b"x");
    }
}

// Invariant 9: IV suffixes drawn under the same session key are pairwise distinct.
#[test]
fn iv_suffixes_do_not_repeat_across_many_encodes() {
    let transform = CryptoTransform::new(SecurityTransformConfig::default());
    let key = sender_key();

    let mut seen = HashSet::new();
    for _ in 0..512 {
        let frame = transform.encode_serialized_payload(&key, b"iv-check").unwrap();
        let suffix = u64::from_le_bytes(frame[12..20].try_into().unwrap());
        assert!(seen.insert(suffix), "IV suffix collided within 512 draws");
    }
}
