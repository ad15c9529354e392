//! Streaming decoder for `multipart/form-data` bodies.
//!
//! The decoder turns an arbitrarily chunked byte stream into a flat sequence of
//! [`Message`] items:
//!
//! ```plain
//! Header(part 1), Payload(Chunk), Payload(Chunk), Payload(Eof),
//! Header(part 2), Payload(Eof),
//! ...
//! ```
//!
//! Part content is handed out as soon as it is known not to be the start of a
//! delimiter, so memory usage is bounded by the read buffer and never by the size
//! of a part.
//!
//! # State Machine
//!
//! - `Preamble`: skip everything before the first `--boundary`
//! - `BoundaryTail`: the bytes after a boundary decide between the next part and the end
//! - `Headers`: decode the part header section with [`PartHeaderDecoder`]
//! - `Body`: scan the part content for `\r\n--boundary`
//! - `End`: the closing delimiter was read, the epilogue is discarded

use bytes::{Buf, Bytes, BytesMut};
use memchr::{memchr, memmem, memrchr};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::part_header_decoder::PartHeaderDecoder;
use crate::ensure;
use crate::protocol::{Message, ParseError, PartHeader, PayloadItem};

/// How many bytes may precede the first boundary before the body is rejected.
const MAX_PREAMBLE_BYTES: usize = 8 * 1024;

/// Transport padding allowed between a boundary and its line break.
const MAX_BOUNDARY_PADDING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    BoundaryTail,
    Headers,
    Body,
    End,
}

/// A [`Decoder`] splitting a multipart body into part headers and part content.
#[derive(Debug)]
pub struct MultipartDecoder {
    state: State,
    /// `\r\n--{boundary}`, the delimiter that closes a part
    delimiter: Bytes,
    header_decoder: PartHeaderDecoder,
}

impl MultipartDecoder {
    /// Creates a decoder for the given boundary, without the leading dashes.
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = BytesMut::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self { state: State::Preamble, delimiter: delimiter.freeze(), header_decoder: PartHeaderDecoder }
    }

    /// Whether the closing delimiter has been decoded.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == State::End
    }

    /// `--{boundary}`, the first delimiter may come without the preceding line break
    fn dash_boundary(&self) -> &[u8] {
        &self.delimiter[2..]
    }

    fn decode_preamble(&mut self, src: &mut BytesMut) -> Result<bool, ParseError> {
        let dash_boundary_len = self.dash_boundary().len();
        match memmem::find(src, self.dash_boundary()) {
            Some(index) => {
                if index > 0 {
                    trace!(size = index, "skip multipart preamble");
                }
                src.advance(index + dash_boundary_len);
                self.state = State::BoundaryTail;
                Ok(true)
            }
            None => {
                ensure!(src.len() <= MAX_PREAMBLE_BYTES, ParseError::invalid_boundary("boundary not found in body"));
                Ok(false)
            }
        }
    }

    fn decode_boundary_tail(&mut self, src: &mut BytesMut) -> Result<bool, ParseError> {
        if src.len() < 2 {
            return Ok(false);
        }

        if src.starts_with(b"--") {
            src.advance(2);
            self.state = State::End;
            return Ok(true);
        }

        let padding = src.iter().take_while(|b| **b == b' ' || **b == b'\t').count();
        ensure!(padding <= MAX_BOUNDARY_PADDING, ParseError::invalid_boundary("too much padding after boundary"));

        if src.len() < padding + 2 {
            return Ok(false);
        }

        ensure!(&src[padding..padding + 2] == b"\r\n", ParseError::invalid_boundary("boundary is not followed by a line break"));

        src.advance(padding + 2);
        self.state = State::Headers;
        Ok(true)
    }

    fn decode_body(&mut self, src: &mut BytesMut) -> Option<PayloadItem> {
        let delimiter_len = self.delimiter.len();

        match memmem::find(src, &self.delimiter) {
            Some(0) => {
                // two more bytes tell a real delimiter from content that merely looks like one
                if src.len() < delimiter_len + 2 {
                    return None;
                }

                if is_delimiter_end(&src[delimiter_len..delimiter_len + 2]) {
                    // keep the leading line break out, the tail starts right after the boundary
                    src.advance(delimiter_len);
                    self.state = State::BoundaryTail;
                    return Some(PayloadItem::Eof);
                }

                // the boundary can't contain a line break, so no delimiter starts inside these bytes
                Some(PayloadItem::Chunk(src.split_to(delimiter_len).freeze()))
            }

            Some(index) => Some(PayloadItem::Chunk(src.split_to(index).freeze())),

            None => {
                // only a suffix starting with the last `\r` can grow into a delimiter
                let tail_start = src.len().saturating_sub(delimiter_len - 1);
                let safe_len = memrchr(b'\r', &src[tail_start..]).map_or(src.len(), |index| tail_start + index);

                if safe_len == 0 {
                    return None;
                }

                Some(PayloadItem::Chunk(src.split_to(safe_len).freeze()))
            }
        }
    }
}

/// A delimiter is followed by `--`, a line break or transport padding.
fn is_delimiter_end(bytes: &[u8]) -> bool {
    bytes == b"--" || bytes == b"\r\n" || memchr(bytes[0], b" \t").is_some()
}

impl Decoder for MultipartDecoder {
    type Item = Message<PartHeader>;
    type Error = ParseError;

    /// Attempts to decode the next item from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: a part header section was decoded
    /// - `Ok(Some(Message::Payload(_)))`: a chunk of part content, or the end of the part
    /// - `Ok(None)`: need more data to proceed, or the body is finished
    /// - `Err(_)`: the body is not valid multipart
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let progressed = match self.state {
                State::Preamble => self.decode_preamble(src)?,

                State::BoundaryTail => self.decode_boundary_tail(src)?,

                State::Headers => match self.header_decoder.decode(src)? {
                    Some(header) => {
                        trace!(name = header.name(), filename = header.filename(), "decoded part header");
                        self.state = State::Body;
                        return Ok(Some(Message::Header(header)));
                    }
                    None => false,
                },

                State::Body => return Ok(self.decode_body(src).map(Message::Payload)),

                State::End => {
                    // epilogue, ignored
                    src.clear();
                    return Ok(None);
                }
            };

            if !progressed {
                return Ok(None);
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None if self.state == State::End => Ok(None),
            None => Err(ParseError::Incomplete),
        }
    }
}
