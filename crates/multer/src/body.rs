use std::pin::Pin;
use std::task::{Context, Poll};

use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;

pin_project! {
    /// The body a wrapped handler receives.
    ///
    /// A multipart body is read completely by the middleware, the handler sees an
    /// empty body and finds the decoded parts in the request extensions. Any other
    /// body is passed through unread.
    #[derive(Debug)]
    pub struct MulterBody<B> {
        #[pin]
        inner: Option<B>,
    }
}

impl<B> MulterBody<B> {
    pub(crate) fn consumed() -> Self {
        Self { inner: None }
    }

    pub(crate) fn passthrough(body: B) -> Self {
        Self { inner: Some(body) }
    }

    /// Whether the original body was read by the middleware.
    pub fn is_consumed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn into_inner(self) -> Option<B> {
        self.inner
    }
}

impl<B: Body> Body for MulterBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project().inner.as_pin_mut() {
            Some(body) => body.poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.as_ref().is_none_or(Body::is_end_stream)
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Some(body) => body.size_hint(),
            None => SizeHint::with_exact(0),
        }
    }
}
