//! Zero-byte frame splitting
//!
//! A frame is everything up to and including a `0x00` byte. At end of
//! stream, leftover bytes without a delimiter form one last frame; an empty
//! leftover produces nothing.

use std::io;

use bytes::{Bytes, BytesMut};

/// Frame delimiter
pub const DELIMITER: u8 = 0x00;

/// Pending input grew past the configured frame limit without a delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTooLarge {
    pub pending: usize,
    pub limit: usize,
}

impl std::fmt::Display for FrameTooLarge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame exceeds {} bytes without a delimiter ({} pending)",
            self.limit, self.pending
        )
    }
}

impl std::error::Error for FrameTooLarge {}

impl From<FrameTooLarge> for io::Error {
    fn from(e: FrameTooLarge) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

/// Incremental splitter over bytes read from one connection
#[derive(Debug)]
pub struct FrameSplitter {
    buf: BytesMut,
    /// Prefix of `buf` already known to hold no delimiter
    scanned: usize,
    /// 0 = unlimited
    max_frame_size: usize,
}

impl FrameSplitter {
    /// Create a splitter with the given pending-bytes limit (0 = unlimited)
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            max_frame_size,
        }
    }

    /// Raw input buffer; read more bytes into it, then call `next_frame`
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Number of bytes waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame, delimiter included
    ///
    /// Only the bytes not inspected by a previous call are scanned.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameTooLarge> {
        match self.buf[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        {
            Some(offset) => {
                let end = self.scanned + offset + 1;
                self.scanned = 0;
                Ok(Some(self.buf.split_to(end).freeze()))
            }
            None => {
                self.scanned = self.buf.len();
                if self.max_frame_size > 0 && self.buf.len() > self.max_frame_size {
                    return Err(FrameTooLarge {
                        pending: self.buf.len(),
                        limit: self.max_frame_size,
                    });
                }
                Ok(None)
            }
        }
    }

    /// End of stream: hand out the undelimited remainder, if any
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scanned = 0;
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }
}
