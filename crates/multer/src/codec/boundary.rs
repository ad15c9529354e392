//! Boundary extraction from the request's `Content-Type` header.

use http::HeaderMap;
use http::header::CONTENT_TYPE;
use mime::Mime;

use crate::ensure;
use crate::protocol::ParseError;

/// RFC 2046 limits a boundary to 70 characters.
const MAX_BOUNDARY_LEN: usize = 70;

/// Returns the multipart boundary of a request.
///
/// - `Ok(None)`: the request is not multipart and should pass through untouched
/// - `Ok(Some(boundary))`: the request is multipart with a usable boundary
/// - `Err(_)`: the request claims to be multipart but the header is unusable
pub fn multipart_boundary(headers: &HeaderMap) -> Result<Option<String>, ParseError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(None);
    };

    let Ok(value) = value.to_str() else {
        return Ok(None);
    };

    let mime = match value.parse::<Mime>() {
        Ok(mime) => mime,
        Err(e) if is_multipart_prefix(value) => return Err(ParseError::invalid_content_type(e)),
        Err(_) => return Ok(None),
    };

    if mime.type_() != mime::MULTIPART {
        return Ok(None);
    }

    let boundary = mime.get_param(mime::BOUNDARY).ok_or(ParseError::MissingBoundary)?;
    let boundary = boundary.as_str();

    ensure!(!boundary.is_empty(), ParseError::invalid_boundary("boundary is empty"));
    ensure!(boundary.len() <= MAX_BOUNDARY_LEN, ParseError::invalid_boundary(format!("boundary longer than {MAX_BOUNDARY_LEN}")));
    ensure!(
        !boundary.bytes().any(|b| b == b'\r' || b == b'\n'),
        ParseError::invalid_boundary("boundary contains a line break")
    );

    Ok(Some(boundary.to_string()))
}

fn is_multipart_prefix(value: &str) -> bool {
    value.get(..10).is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/"))
}
