//! Headers of a single multipart part.
//!
//! A part is described by its `Content-Disposition` header, which must be of type
//! `form-data` and carry a `name` parameter. The presence of a `filename` parameter
//! turns the part into a file part, see [RFC 7578](https://datatracker.ietf.org/doc/html/rfc7578#section-4.2).
//! Some clients only send the [RFC 5987](https://datatracker.ietf.org/doc/html/rfc5987) form
//! `filename*`, which is used when `filename` is absent.

use http::header::CONTENT_DISPOSITION;
use http::{HeaderMap, HeaderName};
use mime::Mime;
use percent_encoding::percent_decode_str;

use crate::protocol::ParseError;

const CONTENT_TRANSFER_ENCODING: HeaderName = HeaderName::from_static("content-transfer-encoding");

const DEFAULT_ENCODING: &str = "7bit";

/// The parsed header section of one part.
#[derive(Debug, Clone)]
pub struct PartHeader {
    name: String,
    filename: Option<String>,
    content_type: Option<Mime>,
    headers: HeaderMap,
}

impl PartHeader {
    /// The form field name from `Content-Disposition`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client supplied filename, reduced to its last path component.
    ///
    /// `None` means this is a plain field part.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    pub fn content_type(&self) -> Option<&Mime> {
        self.content_type.as_ref()
    }

    /// The part's mime type as reported to handlers, `application/octet-stream` if absent.
    pub fn mime_type(&self) -> String {
        self.content_type
            .as_ref()
            .map_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string(), ToString::to_string)
    }

    /// The declared `Content-Transfer-Encoding`, `7bit` if absent.
    pub fn encoding(&self) -> &str {
        self.headers
            .get(CONTENT_TRANSFER_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map_or(DEFAULT_ENCODING, str::trim)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl TryFrom<HeaderMap> for PartHeader {
    type Error = ParseError;

    fn try_from(headers: HeaderMap) -> Result<Self, Self::Error> {
        let disposition = headers
            .get(CONTENT_DISPOSITION)
            .ok_or_else(|| ParseError::invalid_part_header("missing content-disposition"))?;

        // browsers send raw utf-8 filenames, which `HeaderValue::to_str` would reject
        let disposition = std::str::from_utf8(disposition.as_bytes())
            .map_err(|e| ParseError::invalid_part_header(format!("content-disposition is not utf8: {e}")))?;

        let ContentDisposition { name, filename, filename_ext } = ContentDisposition::parse(disposition)?;
        let filename = filename.or(filename_ext);
        let name = name.ok_or_else(|| ParseError::invalid_part_header("content-disposition has no name"))?;

        let content_type = headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<Mime>().ok());

        Ok(Self { name, filename: filename.map(|f| basename(&f).to_string()), content_type, headers })
    }
}

/// The `form-data` parameters this crate cares about.
#[derive(Debug, Default, PartialEq, Eq)]
struct ContentDisposition {
    name: Option<String>,
    filename: Option<String>,
    filename_ext: Option<String>,
}

impl ContentDisposition {
    fn parse(value: &str) -> Result<Self, ParseError> {
        let (disposition_type, mut rest) = value.split_once(';').unwrap_or((value, ""));
        if !disposition_type.trim().eq_ignore_ascii_case("form-data") {
            return Err(ParseError::invalid_part_header(format!("content-disposition type is not form-data: {value}")));
        }

        let mut result = ContentDisposition::default();
        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
            if rest.is_empty() {
                return Ok(result);
            }

            let (key, after_key) = rest
                .split_once('=')
                .ok_or_else(|| ParseError::invalid_part_header(format!("malformed content-disposition param: {rest}")))?;
            let (param_value, after_value) = read_param_value(after_key.trim_start())?;
            rest = after_value;

            match key.trim().to_ascii_lowercase().as_str() {
                "name" => result.name = Some(param_value),
                "filename" => result.filename = Some(param_value),
                "filename*" => result.filename_ext = Some(decode_ext_value(&param_value)?),
                _ => {}
            }
        }
    }
}

/// Reads a token or a quoted string, returning the value and the unread rest.
fn read_param_value(input: &str) -> Result<(String, &str), ParseError> {
    let Some(quoted) = input.strip_prefix('"') else {
        let end = input.find(';').unwrap_or(input.len());
        return Ok((input[..end].trim_end().to_string(), &input[end..]));
    };

    let mut value = String::with_capacity(quoted.len());
    let mut chars = quoted.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((value, &quoted[index + 1..])),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c => value.push(c),
        }
    }

    Err(ParseError::invalid_part_header("unterminated quoted string in content-disposition"))
}

/// Decodes an RFC 5987 `charset'language'percent-encoded` value.
fn decode_ext_value(value: &str) -> Result<String, ParseError> {
    let mut pieces = value.splitn(3, '\'');
    let (Some(charset), Some(_language), Some(encoded)) = (pieces.next(), pieces.next(), pieces.next()) else {
        return Err(ParseError::invalid_part_header(format!("malformed extended value: {value}")));
    };

    let bytes = percent_decode_str(encoded).collect::<Vec<u8>>();
    if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes).map_err(|e| ParseError::invalid_part_header(format!("extended value is not utf8: {e}")))
    } else if charset.eq_ignore_ascii_case("iso-8859-1") {
        Ok(bytes.into_iter().map(char::from).collect())
    } else {
        Err(ParseError::invalid_part_header(format!("unsupported charset in extended value: {charset}")))
    }
}

/// Old browsers send the full client side path, keep only the file name.
fn basename(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}
