use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::slice;

use http::Request;
use serde::Serialize;

/// Metadata of a file part that has been written to disk.
///
/// The file itself is owned by the caller once the request is handed over, it is
/// never removed by this crate after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    #[serde(rename = "fieldname")]
    pub(crate) field_name: String,
    #[serde(rename = "originalname")]
    pub(crate) original_name: String,
    pub(crate) name: String,
    pub(crate) encoding: String,
    #[serde(rename = "mimetype")]
    pub(crate) mime_type: String,
    pub(crate) destination: PathBuf,
    pub(crate) path: PathBuf,
    pub(crate) extension: String,
    pub(crate) size: u64,
    pub(crate) truncated: bool,
}

impl UploadedFile {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// The filename sent by the client.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// The name the file was stored under inside [`Self::destination`].
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extension of the original filename without the dot, empty if none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the content was cut at the configured file size limit.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// A value that was seen once, or several times in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

pub type FieldValue = OneOrMany<String>;
pub type FileValue = OneOrMany<UploadedFile>;

impl<T> OneOrMany<T> {
    /// Appends a value, turning a single value into a sequence.
    pub(crate) fn push(&mut self, value: T) {
        *self = match std::mem::replace(self, OneOrMany::Many(Vec::new())) {
            OneOrMany::One(first) => OneOrMany::Many(vec![first, value]),
            OneOrMany::Many(mut values) => {
                values.push(value);
                OneOrMany::Many(values)
            }
        };
    }

    #[inline]
    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(value) => slice::from_ref(value),
            OneOrMany::Many(values) => values,
        }
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

/// Everything decoded from one multipart request.
///
/// Fields and files live in independent namespaces, a name may appear in both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    #[serde(rename = "body")]
    pub fields: HashMap<String, FieldValue>,
    pub files: HashMap<String, FileValue>,
}

impl ParseResult {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn file(&self, name: &str) -> Option<&FileValue> {
        self.files.get(name)
    }
}

/// Access to the [`ParseResult`] the middleware attached to a request.
pub trait MultipartRequestExt {
    fn parse_result(&self) -> Option<&ParseResult>;
}

impl<B> MultipartRequestExt for Request<B> {
    fn parse_result(&self) -> Option<&ParseResult> {
        self.extensions().get::<ParseResult>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_order() {
        let mut value = OneOrMany::One("a".to_string());
        assert!(!value.is_many());
        assert_eq!(value.len(), 1);

        value.push("b".to_string());
        value.push("c".to_string());
        assert!(value.is_many());
        assert_eq!(value.as_slice(), ["a", "b", "c"]);
        assert_eq!(value.first().map(String::as_str), Some("a"));
    }

    #[test]
    fn serialize_untagged() {
        let one = OneOrMany::One("x".to_string());
        let many = OneOrMany::Many(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(serde_json::to_string(&one).unwrap(), r#""x""#);
        assert_eq!(serde_json::to_string(&many).unwrap(), r#"["x","y"]"#);
    }

    #[test]
    fn serialize_with_original_names() {
        let file = UploadedFile {
            field_name: "small0".into(),
            original_name: "small0.dat".into(),
            name: "small0small0.dat".into(),
            encoding: "7bit".into(),
            mime_type: "application/octet-stream".into(),
            destination: PathBuf::from("temp"),
            path: PathBuf::from("temp/small0small0.dat"),
            extension: "dat".into(),
            size: 3,
            truncated: false,
        };
        let mut result = ParseResult::default();
        result.files.insert("small0".into(), OneOrMany::One(file));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["body"], serde_json::json!({}));
        assert_eq!(json["files"]["small0"]["name"], "small0small0.dat");
        assert_eq!(json["files"]["small0"]["fieldname"], "small0");
        assert_eq!(json["files"]["small0"]["originalname"], "small0.dat");
        assert_eq!(json["files"]["small0"]["size"], 3);
    }
}
