use bytes::{BufMut, Bytes, BytesMut};

pub const BOUNDARY: &str = "----BencherFormBoundary7MA4YWxkTrZu0gW";

#[derive(Debug, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    body: TestBody,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, body: TestBody) -> Self {
        Self { name, group, body }
    }

    pub fn small(name: &'static str, body: TestBody) -> Self {
        Self::new(name, TestGroup::Small, body)
    }

    pub fn normal(name: &'static str, body: TestBody) -> Self {
        Self::new(name, TestGroup::Normal, body)
    }

    pub fn large(name: &'static str, body: TestBody) -> Self {
        Self::new(name, TestGroup::Large, body)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn body(&self) -> &TestBody {
        &self.body
    }
}

/// A generated `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct TestBody {
    content: Bytes,
    parts: usize,
}

impl TestBody {
    /// `fields` short text fields followed by `files` files of `file_size` bytes each.
    ///
    /// File content contains line breaks and dashes so the decoder sees delimiter lookalikes.
    pub fn generate(fields: usize, files: usize, file_size: usize) -> Self {
        let mut content = BytesMut::with_capacity(fields * 128 + files * (file_size + 192));

        for i in 0..fields {
            content.put_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            content.put_slice(format!("Content-Disposition: form-data; name=\"field{i}\"\r\n\r\n").as_bytes());
            content.put_slice(format!("value of field {i}\r\n").as_bytes());
        }

        let pattern = b"lorem ipsum dolor sit amet\r\n--not-a-boundary\r\n";
        for i in 0..files {
            content.put_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            content.put_slice(format!("Content-Disposition: form-data; name=\"file{i}\"; filename=\"file{i}.bin\"\r\n").as_bytes());
            content.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            content.extend(pattern.iter().copied().cycle().take(file_size));
            content.put_slice(b"\r\n");
        }

        content.put_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Self { content: content.freeze(), parts: fields + files }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn parts(&self) -> usize {
        self.parts
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}
