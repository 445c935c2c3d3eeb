//! Tokio codec for newline-delimited JSON messages

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Default upper bound for a single line (1 MiB)
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Codec that decodes one `T` per `\n`-terminated line and encodes any
/// serializable value as a single line.
///
/// Compact `serde_json` output never contains a raw newline, so every encoded
/// message occupies exactly one line and is written with a single buffer
/// append.
#[derive(Debug)]
pub struct JsonLinesCodec<T> {
    /// Longest line accepted before giving up
    max_length: usize,
    /// How far into the buffer we already searched for a newline
    next_index: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonLinesCodec<T> {
    /// Create a new codec with the default line limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a new codec accepting lines of at most `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            _item: PhantomData,
        }
    }

    /// Maximum accepted line length
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl<T> Default for JsonLinesCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> Decoder for JsonLinesCodec<T> {
    type Item = T;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if src.len() > self.max_length {
                    return Err(ProtocolError::LineTooLong {
                        size: src.len(),
                        max: self.max_length,
                    });
                }
                // Need more data
                self.next_index = src.len();
                return Ok(None);
            };

            let line_end = self.next_index + offset;
            self.next_index = 0;

            if line_end > self.max_length {
                return Err(ProtocolError::LineTooLong {
                    size: line_end,
                    max: self.max_length,
                });
            }

            let line = src.split_to(line_end + 1);
            let mut payload = &line[..line_end];
            if payload.last() == Some(&b'\r') {
                payload = &payload[..payload.len() - 1];
            }

            // Blank keep-alive lines carry nothing
            if payload.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let item = serde_json::from_slice(payload)?;
            return Ok(Some(item));
        }
    }
}

impl<T, U: Serialize> Encoder<U> for JsonLinesCodec<T> {
    type Error = ProtocolError;

    fn encode(&mut self, item: U, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;

        if payload.len() > self.max_length {
            return Err(ProtocolError::LineTooLong {
                size: payload.len(),
                max: self.max_length,
            });
        }

        dst.reserve(payload.len() + 1);
        dst.put_slice(&payload);
        dst.put_u8(b'\n');

        Ok(())
    }
}
