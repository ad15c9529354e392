//! Multipart codec implementation.
//!
//! This module turns raw `multipart/form-data` bytes into structured items:
//!
//! - [`MultipartDecoder`]: the body level state machine, boundary scanning and part splitting
//! - [`PartHeaderDecoder`]: the header section of a single part
//! - [`multipart_boundary`]: extracts the boundary from the request's `Content-Type`
//!
//! Both decoders implement [`tokio_util::codec::Decoder`] so they can be driven by
//! `FramedRead` over any `AsyncRead`.

mod boundary;
mod multipart_decoder;
mod part_header_decoder;

pub use boundary::multipart_boundary;
pub use multipart_decoder::MultipartDecoder;
pub use part_header_decoder::PartHeaderDecoder;
