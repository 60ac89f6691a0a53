// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bit-exact frame encode/decode. `body_length` and `receiver_mac_count` are
//! fixed 4-byte little-endian fields regardless of host pointer width.

use crate::security::SecurityError;

pub const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 4;
pub const TAG_LEN: usize = 16;
const RECEIVER_ENTRY_LEN: usize = 4 + TAG_LEN;

pub struct FrameHeader {
    pub transformation_kind: [u8; 4],
    pub transformation_key_id: [u8; 4],
    pub session_id: u32,
    pub iv_suffix: u64,
    pub body_len: u32,
}

/// Appends the fixed 24-byte header ahead of `body`.
pub fn write_header(out: &mut Vec<u8>, header: &FrameHeader) {
    out.extend_from_slice(&header.transformation_kind);
    out.extend_from_slice(&header.transformation_key_id);
    out.extend_from_slice(&header.session_id.to_le_bytes());
    out.extend_from_slice(&header.iv_suffix.to_le_bytes());
    out.extend_from_slice(&header.body_len.to_le_bytes());
}

/// Parses the fixed header, returning it plus the offset where the body begins.
pub fn read_header(frame: &[u8]) -> Result<FrameHeader, SecurityError> {
    if frame.len() < HEADER_LEN {
        return Err(SecurityError::malformed("frame shorter than fixed header"));
    }
    let mut transformation_kind = [0u8; 4];
    transformation_kind.copy_from_slice(&frame[0..4]);
    let mut transformation_key_id = [0u8; 4];
    transformation_key_id.copy_from_slice(&frame[4..8]);
    let session_id = u32::from_le_bytes(frame[8..12].try_into().unwrap());
    let iv_suffix = u64::from_le_bytes(frame[12..20].try_into().unwrap());
    let body_len = u32::from_le_bytes(frame[20..24].try_into().unwrap());
    Ok(FrameHeader {
        transformation_kind,
        transformation_key_id,
        session_id,
        iv_suffix,
        body_len,
    })
}

/// Assembles a secure-payload frame: header ‖ body ‖ common_mac.
pub fn write_payload_frame(header: &FrameHeader, body: &[u8], common_mac: &[u8; TAG_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + TAG_LEN);
    write_header(&mut out, header);
    out.extend_from_slice(body);
    out.extend_from_slice(common_mac);
    out
}

/// Splits a secure-payload frame into its header, body, and common MAC.
pub fn read_payload_frame(frame: &[u8]) -> Result<(FrameHeader, &[u8], [u8; TAG_LEN]), SecurityError> {
    let header = read_header(frame)?;
    let body_start = HEADER_LEN;
    let body_end = body_start
        .checked_add(header.body_len as usize)
        .ok_or_else(|| SecurityError::malformed("body_length overflow"))?;
    let mac_end = body_end
        .checked_add(TAG_LEN)
        .ok_or_else(|| SecurityError::malformed("frame length overflow"))?;
    if frame.len() < mac_end {
        return Err(SecurityError::malformed("frame truncated before common_mac"));
    }
    let body = &frame[body_start..body_end];
    let mut common_mac = [0u8; TAG_LEN];
    common_mac.copy_from_slice(&frame[body_end..mac_end]);
    Ok((header, body, common_mac))
}

/// Appends `receiver_mac_count(4, LE) ‖ { key_id(4) ‖ mac(16) }*` to a payload frame.
pub fn append_receiver_macs(out: &mut Vec<u8>, receiver_macs: &[([u8; 4], [u8; TAG_LEN])]) {
    out.extend_from_slice(&(receiver_macs.len() as u32).to_le_bytes());
    for (key_id, mac) in receiver_macs {
        out.extend_from_slice(key_id);
        out.extend_from_slice(mac);
    }
}

/// Reads the receiver-MAC tail that follows a payload frame's common MAC.
pub fn read_receiver_macs(frame: &[u8], offset: usize) -> Result<Vec<([u8; 4], [u8; TAG_LEN])>, SecurityError> {
    if frame.len() < offset + 4 {
        return Err(SecurityError::malformed("frame truncated before receiver_mac_count"));
    }
    let count = u32::from_le_bytes(frame[offset..offset + 4].try_into().unwrap()) as usize;
    let mut cursor = offset + 4;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        if frame.len() < cursor + RECEIVER_ENTRY_LEN {
            return Err(SecurityError::malformed("frame truncated inside receiver mac list"));
        }
        let mut key_id = [0u8; 4];
        key_id.copy_from_slice(&frame[cursor..cursor + 4]);
        let mut mac = [0u8; TAG_LEN];
        mac.copy_from_slice(&frame[cursor + 4..cursor + RECEIVER_ENTRY_LEN]);
        entries.push((key_id, mac));
        cursor += RECEIVER_ENTRY_LEN;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_frame_roundtrips() {
        let header = FrameHeader {
            transformation_kind: [0, 0, 0, 1],
            transformation_key_id: [0x0A, 0x0B, 0x0C, 0x0D],
            session_id: 7,
            iv_suffix: 0x1122_3344_5566_7788,
            body_len: 5,
        };
        let body = b"hello";
        let mac = [0x99u8; TAG_LEN];
        let frame = write_payload_frame(&header, body, &mac);

        // S4: 4+4+4+8+4+5+16.
        assert_eq!(frame.len(), 4 + 4 + 4 + 8 + 4 + 5 + 16);

        let (parsed_header, parsed_body, parsed_mac) = read_payload_frame(&frame).unwrap();
        assert_eq!(parsed_header.session_id, 7);
        assert_eq!(parsed_body, body);
        assert_eq!(parsed_mac, mac);
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let header = FrameHeader {
            transformation_kind: [0; 4],
            transformation_key_id: [0; 4],
            session_id: 1,
            iv_suffix: 2,
            body_len: 10,
        };
        let frame = write_payload_frame(&header, &[0u8; 10], &[0u8; TAG_LEN]);
        let truncated = &frame[..frame.len() - 1];
        assert!(read_payload_frame(truncated).is_err());
    }

    #[test]
    fn receiver_mac_list_roundtrips() {
        let mut out = Vec::new();
        let entries = vec![([1, 2, 3, 4], [5u8; TAG_LEN]), ([6, 7, 8, 9], [10u8; TAG_LEN])];
        append_receiver_macs(&mut out, &entries);
        let parsed = read_receiver_macs(&out, 0).unwrap();
        assert_eq!(parsed, entries);
    }
}
