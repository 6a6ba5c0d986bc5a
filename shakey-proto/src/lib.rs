//! Shakey wire protocol - binding messages and UART framing
//!
//! A binding update is a JSON object sent over the Nordic UART service in
//! packets of at most [`ble::MAX_PACKET_SIZE`] bytes. There is no length
//! prefix and no sequence number: the receiver treats its buffer as a
//! complete message as soon as it (ignoring trailing whitespace) ends with
//! `}`. A packet that ends in `}` before the real end therefore splits the
//! message early and the receiver discards both halves. [`split_into_fragments`]
//! never cuts there unless a run of `}` longer than a packet leaves no choice.

pub mod ble;

use serde::{Deserialize, Serialize};

/// Binding name the peripheral acts on
pub const SHAKE_ACTION: &str = "ShakeAction";

/// Smallest packet size that can carry any UTF-8 character whole
pub const MIN_PACKET_SIZE: usize = 4;

/// Default cap on a pending (not yet framed) message
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024;

/// A single named binding
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyBinding {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<String>,
}

/// Binding update message: `{"key_bindings": [{"name": .., "keys": ..}]}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingMessage {
    #[serde(default)]
    pub key_bindings: Vec<KeyBinding>,
}

impl BindingMessage {
    /// Message carrying a single `ShakeAction` binding
    pub fn shake_action(keys: impl Into<String>) -> Self {
        Self {
            key_bindings: vec![KeyBinding {
                name: SHAKE_ACTION.to_string(),
                keys: Some(keys.into()),
            }],
        }
    }

    /// Keys of the last `ShakeAction` entry that carries any
    pub fn shake_action_keys(&self) -> Option<&str> {
        self.key_bindings
            .iter()
            .filter(|b| b.name == SHAKE_ACTION)
            .filter_map(|b| b.keys.as_deref())
            .next_back()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FragmentError {
    #[error("packet size {0} is too small to carry a UTF-8 character")]
    PacketTooSmall(usize),
}

/// Split a serialized message into packets of at most `max_size` bytes.
///
/// Packets are cut on character boundaries so each one decodes as UTF-8 on
/// its own, and a packet other than the last is shortened rather than end in
/// `}`. An empty payload yields no packets.
pub fn split_into_fragments(payload: &str, max_size: usize) -> Result<Vec<Vec<u8>>, FragmentError> {
    if max_size < MIN_PACKET_SIZE {
        return Err(FragmentError::PacketTooSmall(max_size));
    }

    let mut fragments = Vec::with_capacity(payload.len().div_ceil(max_size));
    let mut rest = payload;
    while !rest.is_empty() {
        let mut end = rest.len().min(max_size);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end < rest.len() {
            end = cut_before_brace(&rest[..end]).unwrap_or(end);
        }
        let (head, tail) = rest.split_at(end);
        fragments.push(head.as_bytes().to_vec());
        rest = tail;
    }
    Ok(fragments)
}

/// Longest prefix of `head` that does not end in `}` once trailing whitespace
/// is ignored, or `None` if there is no such non-empty prefix
fn cut_before_brace(head: &str) -> Option<usize> {
    let mut head = head;
    while head.trim_end().ends_with('}') {
        head = &head[..head.trim_end().len() - 1];
    }
    (!head.is_empty()).then_some(head.len())
}

#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    #[error("fragment is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("pending message of {len} bytes exceeds limit of {max} bytes")]
    Overflow { len: usize, max: usize },
    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Accumulates UART packets until they form a complete message
#[derive(Debug)]
pub struct Reassembler {
    buffer: String,
    max_len: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_LEN)
    }
}

impl Reassembler {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: String::new(),
            max_len,
        }
    }

    /// Text received so far for the current message
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Feed one packet.
    ///
    /// Returns `Ok(Some(_))` when the packet completed a message,
    /// `Ok(None)` while more packets are needed. On an invalid UTF-8 packet
    /// the packet is dropped and the buffer kept; on overflow or a JSON error
    /// the pending message is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<BindingMessage>, ReassemblyError> {
        let text = std::str::from_utf8(chunk)?;

        let len = self.buffer.len() + text.len();
        if len > self.max_len {
            self.buffer.clear();
            return Err(ReassemblyError::Overflow {
                len,
                max: self.max_len,
            });
        }

        self.buffer.push_str(text);
        if !self.buffer.trim_end().ends_with('}') {
            return Ok(None);
        }

        let complete = std::mem::take(&mut self.buffer);
        Ok(Some(BindingMessage::from_json(&complete)?))
    }
}
