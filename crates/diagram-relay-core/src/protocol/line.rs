//! Line-delimited framing for the editor channel.
//!
//! Rules:
//! - One JSON value per `\n`-terminated line; a trailing `\r` is stripped.
//! - Partial lines stay buffered until their delimiter arrives.
//! - A bad line is reported once and skipped; the buffer position always
//!   advances past its delimiter, so later lines are unaffected.
//! - A pending fragment that grows past `max_line_bytes` is reported once and
//!   discarded up to and including the next delimiter.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{RelayError, Result};
use crate::protocol::rpc::RpcMessage;

pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Incremental decoder over an accumulating byte buffer.
#[derive(Debug)]
pub struct LineDecoder {
    buf: BytesMut,
    max_line_bytes: usize,
    /// Bytes already searched for a delimiter.
    scanned: usize,
    /// Inside an overlong line that has already been reported.
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            max_line_bytes: max_line_bytes.max(1),
            scanned: 0,
            discarding: false,
        }
    }

    /// Append bytes from one read.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Direct access for `AsyncReadExt::read_buf`. Callers must only append.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Bytes currently held back waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete line without its delimiter.
    ///
    /// `None` means more input is needed. `Some(Err(_))` is a framing error for
    /// one line only; keep calling.
    pub fn next_frame(&mut self) -> Option<Result<Bytes>> {
        loop {
            if let Some(rel) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
                let idx = self.scanned + rel;
                let mut line = self.buf.split_to(idx + 1);
                self.scanned = 0;

                line.truncate(idx);
                if line.last() == Some(&b'\r') {
                    line.truncate(idx - 1);
                }

                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if line.len() > self.max_line_bytes {
                    return Some(Err(RelayError::FrameTooLarge {
                        len: line.len(),
                        max: self.max_line_bytes,
                    }));
                }
                return Some(Ok(line.freeze()));
            }

            self.scanned = self.buf.len();

            if self.buf.len() > self.max_line_bytes {
                let len = self.buf.len();
                self.buf.clear();
                self.scanned = 0;
                if !self.discarding {
                    self.discarding = true;
                    return Some(Err(RelayError::FrameTooLarge {
                        len,
                        max: self.max_line_bytes,
                    }));
                }
            }
            return None;
        }
    }

    /// Next decoded message. Same contract as [`LineDecoder::next_frame`].
    pub fn next_message(&mut self) -> Option<Result<RpcMessage>> {
        self.next_frame()
            .map(|frame| frame.and_then(|line| RpcMessage::from_slice(&line)))
    }
}

/// Encode one message as exactly one `\n`-terminated line.
pub fn encode_line(msg: &RpcMessage) -> Result<Bytes> {
    let json = msg.to_json()?;
    let mut out = BytesMut::with_capacity(json.len() + 1);
    out.put_slice(&json);
    out.put_u8(b'\n');
    Ok(out.freeze())
}
