// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key material consumed by the transform. Trust establishment and key
//! agreement are external collaborators — this crate only consumes
//! already-agreed material.

/// Sender-side key material: `(master sender key, master salt, sender key id)`
/// plus the transformation kind identifier.
#[derive(Clone)]
pub struct SenderKeyMaterial {
    pub transformation_kind: [u8; 4],
    pub master_sender_key: [u8; 32],
    pub master_salt: [u8; 32],
    pub sender_key_id: [u8; 4],
}

/// Receiver-specific key material used to bind a ciphertext to one intended recipient.
#[derive(Clone)]
pub struct ReceiverKeyMaterial {
    pub master_receiver_specific_key: [u8; 32],
    pub master_salt: [u8; 32],
    pub receiver_specific_key_id: [u8; 4],
}

impl Drop for SenderKeyMaterial {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.master_sender_key.zeroize();
        self.master_salt.zeroize();
    }
}

impl Drop for ReceiverKeyMaterial {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.master_receiver_specific_key.zeroize();
        self.master_salt.zeroize();
    }
}
