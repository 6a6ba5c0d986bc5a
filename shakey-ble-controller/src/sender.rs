//! Sending key bindings over a [`UartLink`]

use shakey_proto::{BindingMessage, DEFAULT_MAX_MESSAGE_LEN, FragmentError, split_into_fragments};
use std::time::Duration;

use crate::config::HostConfig;
use crate::link::{LinkError, UartLink};

/// Outcome of [`BindingSender::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connected {
    /// The link was already up
    Already,
    /// A new connection was made
    Established,
}

/// A binding the device has been sent in full
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub text: String,
    pub fragments: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("connection failed: {0}")]
pub struct ConnectionError(#[from] pub LinkError);

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to encode binding: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("binding is {len} bytes encoded, the device accepts at most {max}")]
    TooLong { len: usize, max: usize },
    #[error(transparent)]
    Fragment(#[from] FragmentError),
    #[error(transparent)]
    Connect(#[from] ConnectionError),
    #[error("fragment {n} of {total} failed: {source}", n = .index + 1)]
    Write {
        index: usize,
        total: usize,
        #[source]
        source: LinkError,
    },
}

/// Serializes bindings and writes them to the device in paced fragments
pub struct BindingSender<L> {
    link: L,
    packet_size: usize,
    pacing: Duration,
    max_message_len: usize,
}

impl<L: UartLink> BindingSender<L> {
    pub fn new(link: L, packet_size: usize, pacing: Duration) -> Self {
        Self {
            link,
            packet_size,
            pacing,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }

    pub fn from_config(link: L, config: &HostConfig) -> Self {
        Self::new(link, config.max_packet_size, config.pacing())
            .with_max_message_len(config.max_message_len)
    }

    /// Largest encoded message the device will reassemble
    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Connect unless already connected
    pub async fn connect(&mut self) -> Result<Connected, ConnectionError> {
        if self.link.is_connected().await {
            return Ok(Connected::Already);
        }
        log::debug!("Attempting to connect to BLE device...");
        self.link.connect().await?;
        log::info!("Connected to BLE device");
        Ok(Connected::Established)
    }

    /// Send `text` as the device's shake binding.
    ///
    /// Rejected without touching the link if the encoded message is longer
    /// than the device's reassembly limit. Reconnects first if the link has
    /// dropped. Every fragment is followed by the pacing delay. The first
    /// failed write aborts the send; the device drops whatever partial
    /// message it was holding on its next disconnect.
    pub async fn send_binding(&mut self, text: &str) -> Result<Sent, SendError> {
        let json = BindingMessage::shake_action(text).to_json()?;
        log::debug!("Prepared data to send: {}", json);
        if json.len() > self.max_message_len {
            return Err(SendError::TooLong {
                len: json.len(),
                max: self.max_message_len,
            });
        }

        let fragments = split_into_fragments(&json, self.packet_size)?;
        self.connect().await?;

        let total = fragments.len();
        for (index, fragment) in fragments.iter().enumerate() {
            if let Err(source) = self.link.write(fragment).await {
                log::error!("Failed to send chunk {}/{}: {}", index + 1, total, source);
                return Err(SendError::Write {
                    index,
                    total,
                    source,
                });
            }
            log::trace!("Sent chunk {}/{}", index + 1, total);
            tokio::time::sleep(self.pacing).await;
        }

        log::info!("Sent binding '{}' in {} fragments", text, total);
        Ok(Sent {
            text: text.to_string(),
            fragments: total,
        })
    }
}
