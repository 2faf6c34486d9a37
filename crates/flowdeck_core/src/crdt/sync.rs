//! Y-sync frame encoding for room traffic.
//!
//! Frames follow the y-protocols layout so the coordination endpoint can be
//! any stock y-websocket / Hocuspocus style relay:
//!
//! ```text
//! varUint(0)  sync frame, followed by one or more sub-messages:
//!     varUint(0) SyncStep1  varByteArray(state vector)
//!     varUint(1) SyncStep2  varByteArray(missing updates)
//!     varUint(2) Update     varByteArray(incremental update)
//! varUint(1)  awareness frame, followed by varByteArray(awareness payload)
//! ```
//!
//! Byte arrays are `varUint(length)` followed by the raw bytes.

use crate::error::{FlowdeckError, Result};

/// Top-level frame type tags.
mod frame_type {
    pub const SYNC: u64 = 0;
    pub const AWARENESS: u64 = 1;
}

/// Sync sub-message tags.
mod sync_type {
    pub const STEP1: u64 = 0;
    pub const STEP2: u64 = 1;
    pub const UPDATE: u64 = 2;
}

/// Append a 7-bit-per-byte varUint.
fn write_var_uint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Read a varUint, returning the value and the bytes consumed.
fn read_var_uint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift > 63 {
            return None;
        }
        value |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_var_uint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn read_var_bytes(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    let (len, prefix) = read_var_uint(data)?;
    let end = prefix.checked_add(len as usize)?;
    if data.len() < end {
        return None;
    }
    Some((data[prefix..end].to_vec(), end))
}

/// One sync sub-message.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    /// Sender's state vector; the receiver answers with what is missing
    SyncStep1(Vec<u8>),
    /// Updates the receiver of a SyncStep1 was missing
    SyncStep2(Vec<u8>),
    /// A live incremental update
    Update(Vec<u8>),
}

impl SyncMessage {
    fn tag(&self) -> u64 {
        match self {
            SyncMessage::SyncStep1(_) => sync_type::STEP1,
            SyncMessage::SyncStep2(_) => sync_type::STEP2,
            SyncMessage::Update(_) => sync_type::UPDATE,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            SyncMessage::SyncStep1(bytes)
            | SyncMessage::SyncStep2(bytes)
            | SyncMessage::Update(bytes) => bytes,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SyncMessage::SyncStep1(_) => "SyncStep1",
            SyncMessage::SyncStep2(_) => "SyncStep2",
            SyncMessage::Update(_) => "Update",
        }
    }

    /// Encode as a standalone sync frame.
    pub fn encode(&self) -> Vec<u8> {
        Self::encode_all(std::slice::from_ref(self))
    }

    /// Encode several sub-messages into one combined sync frame.
    pub fn encode_all(messages: &[SyncMessage]) -> Vec<u8> {
        let capacity = messages.iter().map(|m| m.payload().len() + 6).sum::<usize>() + 1;
        let mut buf = Vec::with_capacity(capacity);
        write_var_uint(&mut buf, frame_type::SYNC);
        for message in messages {
            log::debug!(
                "[Y-sync] Encoding {}, {} bytes",
                message.name(),
                message.payload().len()
            );
            write_var_uint(&mut buf, message.tag());
            write_var_bytes(&mut buf, message.payload());
        }
        buf
    }

    /// Decode every sub-message of a sync frame.
    ///
    /// Returns an empty list for empty input and for non-sync frames.
    pub fn decode_all(data: &[u8]) -> Result<Vec<SyncMessage>> {
        match Frame::decode(data)? {
            Some(Frame::Sync(messages)) => Ok(messages),
            _ => Ok(Vec::new()),
        }
    }
}

/// A decoded room frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Sync(Vec<SyncMessage>),
    Awareness(Vec<u8>),
}

impl Frame {
    /// Encode an awareness payload as a frame.
    pub fn encode_awareness(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(payload.len() + 6);
        write_var_uint(&mut buf, frame_type::AWARENESS);
        write_var_bytes(&mut buf, payload);
        buf
    }

    /// Decode a frame. Returns `None` for empty input or an unknown frame type.
    pub fn decode(data: &[u8]) -> Result<Option<Frame>> {
        if data.is_empty() {
            return Ok(None);
        }
        let Some((kind, mut offset)) = read_var_uint(data) else {
            return Err(FlowdeckError::SyncProtocol(
                "Truncated frame type".to_string(),
            ));
        };

        match kind {
            frame_type::SYNC => {
                let mut messages = Vec::new();
                while offset < data.len() {
                    let rest = &data[offset..];
                    let (tag, tag_len) = read_var_uint(rest).ok_or_else(|| {
                        FlowdeckError::SyncProtocol("Truncated sync message type".to_string())
                    })?;
                    let (payload, payload_len) =
                        read_var_bytes(&rest[tag_len..]).ok_or_else(|| {
                            FlowdeckError::SyncProtocol("Truncated sync payload".to_string())
                        })?;
                    let message = match tag {
                        sync_type::STEP1 => SyncMessage::SyncStep1(payload),
                        sync_type::STEP2 => SyncMessage::SyncStep2(payload),
                        sync_type::UPDATE => SyncMessage::Update(payload),
                        other => {
                            return Err(FlowdeckError::SyncProtocol(format!(
                                "Unknown sync type: {}",
                                other
                            )));
                        }
                    };
                    messages.push(message);
                    offset += tag_len + payload_len;
                }
                log::debug!("[Y-sync] Decoded {} sync sub-message(s)", messages.len());
                Ok(Some(Frame::Sync(messages)))
            }
            frame_type::AWARENESS => {
                let (payload, _) = read_var_bytes(&data[offset..]).ok_or_else(|| {
                    FlowdeckError::SyncProtocol("Truncated awareness payload".to_string())
                })?;
                Ok(Some(Frame::Awareness(payload)))
            }
            other => {
                log::debug!("[Y-sync] Ignoring frame type {}", other);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_uint_multi_byte() {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
        assert_eq!(read_var_uint(&buf), Some((300, 2)));
        assert_eq!(read_var_uint(&[0x80]), None);
    }

    #[test]
    fn test_sync_step1_wire_layout() {
        let encoded = SyncMessage::SyncStep1(vec![7, 8]).encode();
        assert_eq!(encoded, vec![0, 0, 2, 7, 8]);
    }

    #[test]
    fn test_combined_frame_decodes_in_order() {
        let frame = SyncMessage::encode_all(&[
            SyncMessage::SyncStep2(vec![1, 2, 3]),
            SyncMessage::SyncStep1(vec![4]),
        ]);
        let messages = SyncMessage::decode_all(&frame).unwrap();
        assert_eq!(
            messages,
            vec![
                SyncMessage::SyncStep2(vec![1, 2, 3]),
                SyncMessage::SyncStep1(vec![4]),
            ]
        );
    }

    #[test]
    fn test_awareness_frame_is_not_sync() {
        let frame = Frame::encode_awareness(b"{}");
        assert_eq!(
            Frame::decode(&frame).unwrap(),
            Some(Frame::Awareness(b"{}".to_vec()))
        );
        assert!(SyncMessage::decode_all(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_and_unknown_frames() {
        assert!(Frame::decode(&[]).unwrap().is_none());
        assert!(Frame::decode(&[0, 2, 5, 1]).is_err());
        assert!(Frame::decode(&[0, 9, 0]).is_err());
        assert!(Frame::decode(&[2, 0]).unwrap().is_none());
    }
}
