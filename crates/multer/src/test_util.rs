use std::path::{Component, Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use http::Request;
use http::header::CONTENT_TYPE;
use http_body_util::Full;

/// Builds `multipart/form-data` bodies for tests.
pub(crate) struct MultipartBuilder {
    boundary: String,
    body: BytesMut,
}

impl MultipartBuilder {
    pub(crate) fn new(boundary: &str) -> Self {
        Self { boundary: boundary.to_string(), body: BytesMut::new() }
    }

    pub(crate) fn field(self, name: &str, value: &str) -> Self {
        self.field_bytes(name, value.as_bytes())
    }

    pub(crate) fn field_bytes(mut self, name: &str, value: &[u8]) -> Self {
        self.start_part();
        self.body.put_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        self.body.put_slice(value);
        self
    }

    pub(crate) fn file(mut self, name: &str, filename: &str, content_type: &str, content: &[u8]) -> Self {
        self.start_part();
        self.body.put_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n")
                .as_bytes(),
        );
        self.body.put_slice(content);
        self
    }

    fn start_part(&mut self) {
        if !self.body.is_empty() {
            self.body.put_slice(b"\r\n");
        }
        self.body.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
    }

    pub(crate) fn build(mut self) -> Bytes {
        if !self.body.is_empty() {
            self.body.put_slice(b"\r\n");
        }
        self.body.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body.freeze()
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// A `POST` request to `uri` carrying the built body.
    pub(crate) fn request(self, uri: &str) -> Request<Full<Bytes>> {
        let content_type = self.content_type();
        Request::post(uri).header(CONTENT_TYPE, content_type).body(Full::new(self.build())).unwrap()
    }
}

/// Spells an absolute `path` relative to the current working directory, going up to
/// the root with `..`.
pub(crate) fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut relative =
        cwd.components().filter(|c| matches!(c, Component::Normal(_))).map(|_| Component::ParentDir).collect::<PathBuf>();
    relative.extend(path.components().filter(|c| matches!(c, Component::Normal(_))));
    assert!(relative.is_relative());
    relative
}
