//! Decoder for the header section of a single multipart part.
//!
//! The header section starts right after the CRLF that follows a boundary and ends
//! with an empty line. It is parsed with `httparse::parse_headers` and converted into
//! a [`PartHeader`].
//!
//! # Limits
//!
//! - Maximum number of headers per part: 32
//! - Maximum header section size: 8KB

use bytes::BytesMut;
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::{Error, Status};
use memchr::memmem;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PartHeader};

/// Maximum number of headers allowed in a part
pub(crate) const MAX_PART_HEADER_NUM: usize = 32;

/// Maximum size in bytes allowed for the header section of a part
pub(crate) const MAX_PART_HEADER_BYTES: usize = 8 * 1024;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Decodes one part header section into a [`PartHeader`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PartHeaderDecoder;

impl Decoder for PartHeaderDecoder {
    type Item = PartHeader;
    type Error = ParseError;

    /// # Returns
    ///
    /// - `Ok(Some(header))` if the header section is complete, the section is removed from `src`
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if the section is malformed or exceeds the limits
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // a part without any header line can't carry a content-disposition
        if src.starts_with(b"\r\n") {
            return Err(ParseError::invalid_part_header("missing content-disposition"));
        }

        let Some(end) = memmem::find(src, HEADER_END) else {
            ensure!(src.len() <= MAX_PART_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_PART_HEADER_BYTES));
            return Ok(None);
        };

        let header_len = end + HEADER_END.len();
        ensure!(header_len <= MAX_PART_HEADER_BYTES, ParseError::too_large_header(header_len, MAX_PART_HEADER_BYTES));

        let header_bytes = src.split_to(header_len).freeze();
        trace!(header_len, "parsed part header size");

        let mut parsed = [httparse::EMPTY_HEADER; MAX_PART_HEADER_NUM];
        let parsed = match httparse::parse_headers(&header_bytes, &mut parsed) {
            Ok(Status::Complete((_, parsed))) => parsed,
            Ok(Status::Partial) => return Err(ParseError::invalid_part_header("truncated part header")),
            Err(Error::TooManyHeaders) => return Err(ParseError::too_many_headers(MAX_PART_HEADER_NUM)),
            Err(e) => return Err(ParseError::invalid_part_header(e)),
        };

        let mut headers = HeaderMap::with_capacity(parsed.len());
        for header in parsed.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_part_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_part_header)?;
            headers.append(name, value);
        }

        PartHeader::try_from(headers).map(Some)
    }
}
