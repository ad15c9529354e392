//! A streaming `multipart/form-data` upload middleware
//!
//! This crate sits in front of a request handler, decodes multipart request bodies as
//! they arrive, writes file parts straight to the local disk and hands the handler a
//! structured result of plain fields and stored files.
//!
//! # Features
//!
//! - Boundary scanning across arbitrary chunk boundaries, file content is never buffered
//! - Files written to a fixed or per request destination, created on demand
//! - Unique or caller defined file names
//! - Repeated field names collected in arrival order
//! - Size and count limits
//! - Files of a failed request removed, partial or complete
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use micro_multer::handler::{Handler, make_handler};
//! use micro_multer::protocol::BoxError;
//! use micro_multer::{Multer, MulterBody, MultipartRequestExt, Wrapper};
//!
//! async fn upload(req: Request<MulterBody<Full<Bytes>>>) -> Result<Response<String>, BoxError> {
//!     let result = req.parse_result().ok_or("multer did not run")?;
//!     Ok(Response::new(serde_json::to_string(result)?))
//! }
//!
//! # async fn run(req: Request<Full<Bytes>>) -> Result<(), BoxError> {
//! let multer = Multer::builder()
//!     .dest("./temp")
//!     .rename(|field_name, original_name| format!("{field_name}{original_name}"))
//!     .build()?;
//!
//! let handler = multer.wrap(make_handler(upload));
//! let _response = handler.call(req).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: the multipart decoder, a `tokio_util` [`Decoder`](tokio_util::codec::Decoder)
//! - [`multipart`]: part by part access to a request body
//! - [`storage`]: destination directories, file names and file writing
//! - [`accumulator`]: merges parts into a [`protocol::ParseResult`]
//! - [`protocol`]: result and error types
//! - [`handler`]: the handler trait the middleware wraps
//!
//! # Error Handling
//!
//! Every request level failure is a [`protocol::MulterError`], with one variant per stage:
//!
//! - [`protocol::ParseError`]: the body is not valid multipart, or a limit was exceeded
//! - [`protocol::DestinationError`]: the destination could not be resolved or created
//! - [`protocol::WriteError`]: a file could not be written
//!
//! [`protocol::MulterError::status_code`] maps them to a response status. The wrapped
//! handler is never called for a failed request.
//!
//! # Limitations
//!
//! - Maximum part header size: 8KB
//! - Maximum number of headers per part: 32
//! - Local disk storage only

pub mod accumulator;
pub mod codec;
pub mod handler;
pub mod multipart;
pub mod protocol;
pub mod storage;

mod body;
mod config;
mod multer;
mod wrapper;

pub use body::MulterBody;
pub use config::{ArrayPolicy, Limits, MulterConfig, MulterConfigBuilder};
pub use multer::{Multer, MulterHandler, RequestState};
pub use protocol::MultipartRequestExt;
pub use wrapper::Wrapper;

mod utils;
pub(crate) use utils::ensure;

#[cfg(test)]
mod test_util;
