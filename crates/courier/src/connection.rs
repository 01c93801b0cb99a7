// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed JSON framing.
//!
//! Used for both the control plane (requests/responses) and the data plane
//! (samples). Each frame is a 4-byte big-endian length followed by a JSON body.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Default upper bound for a single frame (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A framed connection over an async byte stream.
pub struct Connection<S = TcpStream> {
    stream: S,
    max_frame_size: usize,
    read_buffer: Vec<u8>,
}

impl Connection<TcpStream> {
    /// Connect to `addr` (`host:port`).
    pub async fn connect(addr: &str, max_frame_size: usize) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, max_frame_size))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already established stream.
    pub fn new(stream: S, max_frame_size: usize) -> Self {
        Self {
            stream,
            max_frame_size,
            read_buffer: Vec::with_capacity(4096),
        }
    }

    /// Read one frame and decode it.
    ///
    /// Returns `Ok(None)` if the peer closed the connection between frames;
    /// a close inside a frame is [`ConnectionError::Truncated`].
    /// A [`ConnectionError::Decode`] leaves the stream aligned on the next frame.
    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ConnectionError> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = self.stream.read(&mut len_buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ConnectionError::Truncated);
            }
            filled += n;
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 {
            return Err(ConnectionError::EmptyFrame);
        }
        if len > self.max_frame_size {
            return Err(ConnectionError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        self.read_buffer.clear();
        self.read_buffer.resize(len, 0);
        self.stream
            .read_exact(&mut self.read_buffer)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ConnectionError::Truncated,
                _ => ConnectionError::Io(e),
            })?;

        serde_json::from_slice(&self.read_buffer)
            .map(Some)
            .map_err(ConnectionError::Decode)
    }

    /// Encode and write one frame.
    pub async fn write_frame<T: Serialize>(&mut self, msg: &T) -> Result<(), ConnectionError> {
        let json = serde_json::to_vec(msg).map_err(ConnectionError::Encode)?;
        if json.len() > self.max_frame_size {
            return Err(ConnectionError::FrameTooLarge {
                len: json.len(),
                max: self.max_frame_size,
            });
        }

        let len = json.len() as u32;
        self.stream.write_all(&len.to_be_bytes()).await?;
        self.stream.write_all(&json).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shutdown the write half.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.stream.shutdown().await.map_err(ConnectionError::Io)
    }
}

/// Connection error types.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: empty frame")]
    EmptyFrame,

    #[error("Protocol error: connection closed mid-frame")]
    Truncated,

    #[error("Protocol error: frame too large: {len} > {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("Protocol error: invalid JSON: {0}")]
    Decode(serde_json::Error),

    #[error("Protocol error: serialize error: {0}")]
    Encode(serde_json::Error),
}

impl ConnectionError {
    /// Whether the stream is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
