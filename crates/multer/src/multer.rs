//! The upload middleware.
//!
//! [`Multer`] parses a `multipart/form-data` request before the next handler sees it:
//!
//! 1. the boundary is taken from `Content-Type`, other requests pass through
//! 2. parts are decoded one by one from the body stream
//! 3. every file part is written to the resolved destination while it is decoded
//! 4. fields and file metadata are collected into a [`ParseResult`]
//! 5. the result is attached to the request extensions and the next handler is called
//!
//! Any failure ends the request with a [`MulterError`], the next handler is not called.
//! Files already stored for the failed request are removed.

use std::sync::Arc;

use async_trait::async_trait;
use http::request::Parts;
use http::{Request, Response};
use http_body::Body;
use tokio::io::AsyncRead;
use tracing::{debug, error, trace};

use crate::accumulator::PartAccumulator;
use crate::body::MulterBody;
use crate::codec::multipart_boundary;
use crate::config::{MulterConfig, MulterConfigBuilder};
use crate::handler::Handler;
use crate::multipart::{FilePart, MultipartStream, Part, body_reader};
use crate::protocol::{BoxError, MulterError, ParseResult, UploadedFile};
use crate::storage::{FileWriter, StoredFilesGuard, extension};
use crate::wrapper::Wrapper;

/// Progress of one request through the middleware, reported in trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Init,
    Decoding,
    ResolvingDest,
    Writing,
    Recorded,
    Finalized,
    ParseFailed,
    DestFailed,
    WriteFailed,
}

impl From<&MulterError> for RequestState {
    fn from(e: &MulterError) -> Self {
        match e {
            MulterError::Parse { .. } => RequestState::ParseFailed,
            MulterError::Destination { .. } => RequestState::DestFailed,
            MulterError::Write { .. } => RequestState::WriteFailed,
        }
    }
}

/// Multipart upload middleware, cheap to clone and shared by all requests.
#[derive(Debug, Clone)]
pub struct Multer {
    config: Arc<MulterConfig>,
}

impl Multer {
    pub fn builder() -> MulterConfigBuilder {
        MulterConfig::builder()
    }

    pub(crate) fn new(config: MulterConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    pub fn config(&self) -> &MulterConfig {
        &self.config
    }

    /// Parses a request, returning it with the [`ParseResult`] in its extensions.
    ///
    /// A multipart body is consumed, any other request keeps its body and gets an
    /// empty result.
    pub async fn process<B>(&self, req: Request<B>) -> Result<Request<MulterBody<B>>, MulterError>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let (mut parts, body) = req.into_parts();
        trace!(state = ?RequestState::Init, method = %parts.method, uri = %parts.uri, "multer start");

        let boundary = match multipart_boundary(&parts.headers) {
            Ok(Some(boundary)) => boundary,
            Ok(None) => {
                trace!("not a multipart request, pass through");
                parts.extensions.insert(ParseResult::default());
                return Ok(Request::from_parts(parts, MulterBody::passthrough(body)));
            }
            Err(e) => {
                let e = MulterError::from(e);
                error!(state = ?RequestState::from(&e), cause = %e, "invalid multipart content type");
                return Err(e);
            }
        };

        match self.parse(&parts, &boundary, body).await {
            Ok(result) => {
                parts.extensions.insert(result);
                Ok(Request::from_parts(parts, MulterBody::consumed()))
            }
            Err(e) => {
                error!(state = ?RequestState::from(&e), cause = %e, "multipart request failed");
                Err(e)
            }
        }
    }

    async fn parse<B>(&self, req: &Parts, boundary: &str, body: B) -> Result<ParseResult, MulterError>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let config = &self.config;
        let writer = FileWriter::new(config.limits().file_size);
        let mut multipart = MultipartStream::new(body_reader(body), boundary, *config.limits());
        let mut accumulator = PartAccumulator::new(config.array_policy());
        let mut stored = StoredFilesGuard::default();

        trace!(state = ?RequestState::Decoding, boundary, "decoding multipart body");
        while let Some(part) = multipart.next_part().await? {
            match part {
                Part::Field(field) => {
                    if field.value().is_empty() && !config.include_empty_fields() {
                        trace!(name = field.name(), "skip empty field");
                        continue;
                    }
                    let (name, value) = field.into_inner();
                    accumulator.add_field(name, value);
                }
                Part::File(file) => {
                    if file.filename().is_empty() {
                        debug!(name = file.name(), "skip file part without filename");
                        continue;
                    }
                    let uploaded = self.store(req, file, &writer).await?;
                    stored.push(uploaded.path());
                    accumulator.add_file(uploaded);
                }
            }
        }

        debug!(
            state = ?RequestState::Finalized,
            fields = accumulator.field_count(),
            files = accumulator.file_count(),
            "multipart body parsed"
        );
        stored.disarm();
        Ok(accumulator.finish())
    }

    async fn store<R>(&self, req: &Parts, mut file: FilePart<'_, R>, writer: &FileWriter) -> Result<UploadedFile, MulterError>
    where
        R: AsyncRead + Unpin,
    {
        trace!(state = ?RequestState::ResolvingDest, name = file.name(), "resolving destination");
        let destination = self.config.destination().resolve(req).await?;
        let name = self.config.naming().file_name(file.name(), file.filename())?;
        let path = destination.join(&name);

        trace!(state = ?RequestState::Writing, path = %path.display(), "writing file");
        let written = writer.write(&path, &mut file).await?;

        let header = file.header();
        let uploaded = UploadedFile {
            field_name: header.name().to_string(),
            original_name: file.filename().to_string(),
            name,
            encoding: header.encoding().to_string(),
            mime_type: header.mime_type(),
            extension: extension(file.filename()).unwrap_or_default().to_string(),
            destination,
            path,
            size: written.size,
            truncated: written.truncated,
        };

        debug!(
            state = ?RequestState::Recorded,
            field = uploaded.field_name(),
            path = %uploaded.path().display(),
            size = uploaded.size(),
            "file uploaded"
        );
        Ok(uploaded)
    }
}

impl<H> Wrapper<H> for Multer {
    type Out = MulterHandler<H>;

    fn wrap(&self, handler: H) -> Self::Out {
        MulterHandler { multer: self.clone(), handler }
    }
}

/// A handler parsing multipart requests before passing them to `H`.
#[derive(Debug)]
pub struct MulterHandler<H> {
    multer: Multer,
    handler: H,
}

#[async_trait]
impl<H, B> Handler<B> for MulterHandler<H>
where
    H: Handler<MulterBody<B>>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type RespBody = H::RespBody;
    type Error = BoxError;

    async fn call(&self, req: Request<B>) -> Result<Response<Self::RespBody>, Self::Error> {
        let req = self.multer.process(req).await?;
        self.handler.call(req).await.map_err(Into::into)
    }
}
