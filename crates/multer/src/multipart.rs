//! Part level view over a multipart body.
//!
//! [`MultipartStream`] drives a [`MultipartDecoder`] over any [`AsyncRead`] and hands
//! out one [`Part`] at a time. Field values are small and collected in memory, file
//! content is exposed as a [`FilePart`] stream that reads straight from the decoder.
//!
//! ```plain
//! body ──► StreamReader ──► FramedRead<_, MultipartDecoder> ──► next_part()
//!                                                               ├─ Part::Field(name, value)
//!                                                               └─ Part::File(header, Stream<Bytes>)
//! ```

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{info, trace};

use crate::codec::MultipartDecoder;
use crate::config::Limits;
use crate::ensure;
use crate::protocol::{BoxError, Message, ParseError, PartHeader, PayloadItem};

/// An [`AsyncRead`] over the data frames of a request body.
pub type BodyReader<D> = StreamReader<BoxStream<'static, io::Result<D>>, D>;

/// Adapts a request body to [`AsyncRead`], body errors surface as [`io::Error`].
pub fn body_reader<B>(body: B) -> BodyReader<B::Data>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let stream = TryStreamExt::map_err(BodyExt::into_data_stream(body), |e| io::Error::other(e.into())).boxed();
    StreamReader::new(stream)
}

/// One decoded part.
#[derive(Debug)]
pub enum Part<'a, R> {
    Field(FieldPart),
    File(FilePart<'a, R>),
}

/// A part without filename, its value is read completely.
#[derive(Debug)]
pub struct FieldPart {
    header: PartHeader,
    value: String,
}

impl FieldPart {
    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn header(&self) -> &PartHeader {
        &self.header
    }

    /// Returns `(name, value)`.
    pub fn into_inner(self) -> (String, String) {
        (self.header.name().to_string(), self.value)
    }
}

/// A part with a filename, its content is streamed from the body.
///
/// The content must be consumed before the next part can be read. Parts that are
/// dropped half way are skipped by [`MultipartStream::next_part`].
#[derive(Debug)]
pub struct FilePart<'a, R> {
    header: PartHeader,
    multipart: &'a mut MultipartStream<R>,
    done: bool,
}

impl<R> FilePart<'_, R> {
    pub fn name(&self) -> &str {
        self.header.name()
    }

    /// The client supplied filename, may be empty.
    pub fn filename(&self) -> &str {
        self.header.filename().unwrap_or_default()
    }

    pub fn header(&self) -> &PartHeader {
        &self.header
    }
}

impl<R: AsyncRead + Unpin> Stream for FilePart<'_, R> {
    type Item = Result<Bytes, ParseError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        let item = ready!(this.multipart.framed.poll_next_unpin(cx));

        let result = match item {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => return Poll::Ready(Some(Ok(bytes))),
            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                this.multipart.in_part = false;
                None
            }
            Some(Ok(Message::Header(_))) => Some(Err(ParseError::invalid_body("received header inside part content"))),
            Some(Err(e)) => Some(Err(e)),
            None => Some(Err(ParseError::Incomplete)),
        };

        this.done = true;
        Poll::Ready(result)
    }
}

/// Reads the parts of a multipart body in order.
#[derive(Debug)]
pub struct MultipartStream<R> {
    framed: FramedRead<R, MultipartDecoder>,
    limits: Limits,
    in_part: bool,
    parts: usize,
    fields: usize,
    files: usize,
}

impl<R: AsyncRead + Unpin> MultipartStream<R> {
    pub fn new(reader: R, boundary: &str, limits: Limits) -> Self {
        Self {
            framed: FramedRead::new(reader, MultipartDecoder::new(boundary)),
            limits,
            in_part: false,
            parts: 0,
            fields: 0,
            files: 0,
        }
    }

    /// Returns the next part, or `None` once the closing boundary was read.
    ///
    /// Content left unread from the previous file part is skipped first.
    pub async fn next_part(&mut self) -> Result<Option<Part<'_, R>>, ParseError> {
        if self.in_part {
            self.skip_part().await?;
        }

        let header = match self.framed.next().await {
            Some(Ok(Message::Header(header))) => header,
            Some(Ok(Message::Payload(_))) => return Err(ParseError::invalid_body("received content before part header")),
            Some(Err(e)) => return Err(e),
            None if self.framed.decoder().is_finished() => return Ok(None),
            None => return Err(ParseError::Incomplete),
        };

        self.parts += 1;
        check_count("parts", self.parts, self.limits.parts)?;
        ensure!(
            header.name().len() <= self.limits.field_name_size,
            ParseError::limit_exceeded("field_name_size", self.limits.field_name_size as u64)
        );

        if header.is_file() {
            self.files += 1;
            check_count("files", self.files, self.limits.files)?;
            self.in_part = true;
            return Ok(Some(Part::File(FilePart { header, multipart: self, done: false })));
        }

        self.fields += 1;
        check_count("fields", self.fields, self.limits.fields)?;
        let value = self.read_field(&header).await?;
        Ok(Some(Part::Field(FieldPart { header, value })))
    }

    async fn read_field(&mut self, header: &PartHeader) -> Result<String, ParseError> {
        let limit = self.limits.field_size;
        let mut value = BytesMut::new();

        loop {
            match self.framed.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    ensure!(value.len() + bytes.len() <= limit, ParseError::limit_exceeded("field_size", limit as u64));
                    value.extend_from_slice(&bytes);
                }
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("received header inside field value")),
                Some(Err(e)) => return Err(e),
                None => return Err(ParseError::Incomplete),
            }
        }

        String::from_utf8(value.to_vec()).map_err(|e| ParseError::invalid_field(header.name(), e))
    }

    async fn skip_part(&mut self) -> Result<(), ParseError> {
        let mut size: usize = 0;
        loop {
            match self.framed.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => size += bytes.remaining(),
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("received header inside part content")),
                Some(Err(e)) => return Err(e),
                None => return Err(ParseError::Incomplete),
            }
        }

        self.in_part = false;
        if size > 0 {
            info!(size, "skip unread part content");
        } else {
            trace!("skip part");
        }
        Ok(())
    }
}

fn check_count(limit: &'static str, current: usize, max: Option<usize>) -> Result<(), ParseError> {
    match max {
        Some(max) if current > max => Err(ParseError::limit_exceeded(limit, max as u64)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MultipartBuilder;
    use http_body_util::{Full, StreamBody};
    use http_body::Frame;
    use futures::stream;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn stream_of(body: Bytes, limits: Limits) -> MultipartStream<BodyReader<Bytes>> {
        MultipartStream::new(body_reader(Full::new(body)), BOUNDARY, limits)
    }

    async fn collect(file: &mut FilePart<'_, BodyReader<Bytes>>) -> Vec<u8> {
        let mut content = vec![];
        while let Some(chunk) = file.next().await {
            content.extend_from_slice(&chunk.unwrap());
        }
        content
    }

    #[tokio::test]
    async fn fields_and_files_in_order() {
        let body = MultipartBuilder::new(BOUNDARY)
            .field("title", "hello")
            .file("small0", "small0.dat", "text/plain", b"abc")
            .field("title", "world")
            .build();
        let mut multipart = stream_of(body, Limits::default());

        match multipart.next_part().await.unwrap().unwrap() {
            Part::Field(field) => assert_eq!(field.into_inner(), ("title".to_string(), "hello".to_string())),
            Part::File(_) => panic!("expect field"),
        }

        match multipart.next_part().await.unwrap().unwrap() {
            Part::File(mut file) => {
                assert_eq!(file.name(), "small0");
                assert_eq!(file.filename(), "small0.dat");
                assert_eq!(collect(&mut file).await, b"abc");
            }
            Part::Field(_) => panic!("expect file"),
        }

        match multipart.next_part().await.unwrap().unwrap() {
            Part::Field(field) => assert_eq!(field.value(), "world"),
            Part::File(_) => panic!("expect field"),
        }

        assert!(multipart.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unread_file_is_skipped() {
        let body = MultipartBuilder::new(BOUNDARY)
            .file("a", "a.bin", "application/octet-stream", &[7u8; 64 * 1024])
            .field("after", "yes")
            .build();
        let mut multipart = stream_of(body, Limits::default());

        assert!(matches!(multipart.next_part().await.unwrap(), Some(Part::File(_))));
        match multipart.next_part().await.unwrap().unwrap() {
            Part::Field(field) => assert_eq!(field.value(), "yes"),
            Part::File(_) => panic!("expect field"),
        }
        assert!(multipart.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chunked_body() {
        let body = MultipartBuilder::new(BOUNDARY)
            .file("a", "a.txt", "text/plain", b"0123456789\r\n--X-BOUNDAR")
            .build();
        let frames = body.chunks(3).map(|chunk| Ok::<_, io::Error>(Frame::data(Bytes::copy_from_slice(chunk)))).collect::<Vec<_>>();
        let reader = body_reader(StreamBody::new(stream::iter(frames)));
        let mut multipart = MultipartStream::new(reader, BOUNDARY, Limits::default());

        let Some(Part::File(mut file)) = multipart.next_part().await.unwrap() else {
            panic!("expect file");
        };
        let mut content = vec![];
        while let Some(chunk) = file.next().await {
            content.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(content, b"0123456789\r\n--X-BOUNDAR");
        assert!(multipart.next_part().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_body() {
        let mut body = MultipartBuilder::new(BOUNDARY).file("a", "a.txt", "text/plain", b"abcdef").build().to_vec();
        body.truncate(body.len() - 10);
        let mut multipart = stream_of(Bytes::from(body), Limits::default());

        let Some(Part::File(mut file)) = multipart.next_part().await.unwrap() else {
            panic!("expect file");
        };
        let mut result = Ok(());
        while let Some(chunk) = file.next().await {
            if let Err(e) = chunk {
                result = Err(e);
            }
        }
        assert!(matches!(result, Err(ParseError::Incomplete)));
    }

    #[tokio::test]
    async fn body_error_surfaces_as_io() {
        let frames = vec![
            Ok(Frame::data(Bytes::from_static(b"--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"a\"; filename=\"a\"\r\n\r\nab"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client gone")),
        ];
        let reader = body_reader(StreamBody::new(stream::iter(frames)));
        let mut multipart = MultipartStream::new(reader, BOUNDARY, Limits::default());

        let Some(Part::File(mut file)) = multipart.next_part().await.unwrap() else {
            panic!("expect file");
        };
        assert_eq!(file.next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert!(matches!(file.next().await, Some(Err(ParseError::Io { .. }))));
        assert!(file.next().await.is_none());
    }

    #[tokio::test]
    async fn field_too_large() {
        let body = MultipartBuilder::new(BOUNDARY).field("a", "0123456789").build();
        let mut multipart = stream_of(body, Limits { field_size: 4, ..Limits::default() });

        let result = multipart.next_part().await;
        assert!(matches!(result, Err(ParseError::LimitExceeded { limit: "field_size", max: 4 })));
    }

    #[tokio::test]
    async fn field_name_too_long() {
        let body = MultipartBuilder::new(BOUNDARY).field("a_very_long_name", "v").build();
        let mut multipart = stream_of(body, Limits { field_name_size: 4, ..Limits::default() });

        let result = multipart.next_part().await;
        assert!(matches!(result, Err(ParseError::LimitExceeded { limit: "field_name_size", .. })));
    }

    #[tokio::test]
    async fn too_many_files() {
        let body = MultipartBuilder::new(BOUNDARY)
            .file("a", "a.txt", "text/plain", b"1")
            .file("a", "b.txt", "text/plain", b"2")
            .build();
        let mut multipart = stream_of(body, Limits { files: Some(1), ..Limits::default() });

        assert!(matches!(multipart.next_part().await.unwrap(), Some(Part::File(_))));
        let result = multipart.next_part().await;
        assert!(matches!(result, Err(ParseError::LimitExceeded { limit: "files", max: 1 })));
    }

    #[tokio::test]
    async fn too_many_parts() {
        let body = MultipartBuilder::new(BOUNDARY).field("a", "1").field("b", "2").field("c", "3").build();
        let mut multipart = stream_of(body, Limits { parts: Some(2), ..Limits::default() });

        assert!(multipart.next_part().await.unwrap().is_some());
        assert!(multipart.next_part().await.unwrap().is_some());
        assert!(matches!(multipart.next_part().await, Err(ParseError::LimitExceeded { limit: "parts", .. })));
    }

    #[tokio::test]
    async fn invalid_utf8_field() {
        let body = MultipartBuilder::new(BOUNDARY).field_bytes("a", &[0xff, 0xfe]).build();
        let mut multipart = stream_of(body, Limits::default());

        let result = multipart.next_part().await;
        assert!(matches!(result, Err(ParseError::InvalidField { .. })));
    }

    #[tokio::test]
    async fn empty_body() {
        let mut multipart = stream_of(Bytes::new(), Limits::default());
        assert!(matches!(multipart.next_part().await, Err(ParseError::Incomplete)));
    }
}
