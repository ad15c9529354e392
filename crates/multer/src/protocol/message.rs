use bytes::Bytes;

/// One item produced by the multipart decoder.
///
/// Every part starts with exactly one `Header`, followed by zero or more
/// `Payload(Chunk)` items and a closing `Payload(Eof)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    /// The parsed headers of the next part
    Header(T),
    /// A chunk of the current part's content or its end marker
    Payload(PayloadItem),
}

/// Represents an item in a part's content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A chunk of content
    Chunk(Bytes),
    /// Marks the end of the current part
    Eof,
}

impl<T> Message<T> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// Converts the message into a PayloadItem if it contains payload data
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl PayloadItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
