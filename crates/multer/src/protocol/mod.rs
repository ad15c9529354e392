//! Core multipart protocol types.
//!
//! - **Decoder items** ([`message`]): [`Message`] and [`PayloadItem`], what the
//!   [`crate::codec::MultipartDecoder`] produces
//! - **Part headers** ([`part`]): [`PartHeader`], the parsed `Content-Disposition` and friends
//! - **Results** ([`upload`]): [`UploadedFile`], [`OneOrMany`] and [`ParseResult`], what
//!   handlers receive
//! - **Errors** ([`error`]): [`MulterError`] and one error type per failing stage

mod message;
pub use message::Message;
pub use message::PayloadItem;

mod part;
pub use part::PartHeader;

mod upload;
pub use upload::FieldValue;
pub use upload::FileValue;
pub use upload::MultipartRequestExt;
pub use upload::OneOrMany;
pub use upload::ParseResult;
pub use upload::UploadedFile;

mod error;
pub use error::BoxError;
pub use error::ConfigError;
pub use error::DestinationError;
pub use error::MulterError;
pub use error::ParseError;
pub use error::WriteError;
