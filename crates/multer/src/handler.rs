//! The continuation a [`crate::Multer`] hands requests to.
//!
//! A [`Handler`] answers one request. [`make_handler`] turns an async closure into
//! a handler, the middleware itself is a handler wrapping another one.

use std::future::Future;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::BoxError;

/// Answers a request with a response.
///
/// [`crate::MulterHandler`] implements it for the wrapped chain and calls the inner
/// handler with a [`crate::MulterBody`] request only after parsing succeeded.
#[async_trait]
pub trait Handler<ReqBody>: Send + Sync {
    type RespBody: Body;
    type Error: Into<BoxError>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// A [`Handler`] backed by an async closure.
///
/// This is usually the application endpoint sitting behind the middleware, receiving
/// `Request<MulterBody<B>>` and reading the upload through
/// [`MultipartRequestExt::parse_result`](crate::MultipartRequestExt::parse_result).
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<ReqBody, RespBody, Err, F, Fut> Handler<ReqBody> for HandlerFn<F>
where
    RespBody: Body,
    ReqBody: Send + 'static,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Err: Into<BoxError>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

/// Wraps an async closure into a [`HandlerFn`], ready to be passed to
/// [`Wrapper::wrap`](crate::Wrapper::wrap) on a [`crate::Multer`].
///
/// ```no_run
/// # use bytes::Bytes;
/// # use http::{Request, Response};
/// # use http_body_util::Full;
/// # use micro_multer::handler::make_handler;
/// # use micro_multer::protocol::BoxError;
/// # use micro_multer::{Multer, MulterBody, MultipartRequestExt, Wrapper};
/// # fn build(multer: Multer) {
/// let _handler = multer.wrap(make_handler(|req: Request<MulterBody<Full<Bytes>>>| async move {
///     let files = req.parse_result().map_or(0, |result| result.files.len());
///     Ok::<_, BoxError>(Response::new(format!("{files} file fields")))
/// }));
/// # }
/// ```
pub fn make_handler<F, ReqBody, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<BoxError>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Ret,
{
    HandlerFn { f }
}
