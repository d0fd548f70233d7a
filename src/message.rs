//! Carrier backed by ordered message-queue record headers.

use opentelemetry::propagation::{Extractor, Injector};

/// A single record header as message-queue clients model it: a string key
/// with a byte value.
///
/// Implemented for byte-valued and string-valued pair shapes so carriers over
/// either convert at the string/byte boundary instead of duplicating logic.
pub trait MessageHeader {
    /// The header key.
    fn key(&self) -> &str;

    /// The header value bytes.
    fn value(&self) -> &[u8];

    /// Replace the header value in place.
    fn set_value(&mut self, value: Vec<u8>);

    /// Build a new header pair.
    fn from_pair(key: &str, value: Vec<u8>) -> Self
    where
        Self: Sized;
}

/// Owned record header in the shape Kafka-style clients use.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    /// Header key.
    pub key: String,
    /// Header value bytes.
    pub value: Vec<u8>,
}

impl MessageHeader for RecordHeader {
    fn key(&self) -> &str {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn set_value(&mut self, value: Vec<u8>) {
        self.value = value;
    }

    fn from_pair(key: &str, value: Vec<u8>) -> Self {
        RecordHeader {
            key: key.to_owned(),
            value,
        }
    }
}

impl MessageHeader for (String, Vec<u8>) {
    fn key(&self) -> &str {
        &self.0
    }

    fn value(&self) -> &[u8] {
        &self.1
    }

    fn set_value(&mut self, value: Vec<u8>) {
        self.1 = value;
    }

    fn from_pair(key: &str, value: Vec<u8>) -> Self {
        (key.to_owned(), value)
    }
}

impl MessageHeader for (String, String) {
    fn key(&self) -> &str {
        &self.0
    }

    fn value(&self) -> &[u8] {
        self.1.as_bytes()
    }

    fn set_value(&mut self, value: Vec<u8>) {
        self.1 = String::from_utf8_lossy(&value).into_owned();
    }

    fn from_pair(key: &str, value: Vec<u8>) -> Self {
        (key.to_owned(), String::from_utf8_lossy(&value).into_owned())
    }
}

/// Carrier over an ordered list of record headers.
///
/// Duplicate keys are legal in record headers, so `get` returns the first
/// match and later pairs with the same key are shadowed, never merged.
/// `set` overwrites the value of the first matching pair in place, otherwise
/// appends; existing pairs are never removed or reordered. `keys` reports
/// every pair in sequence order, duplicates included.
///
/// Key comparison is exact: record-header keys are case-sensitive.
#[derive(Clone, Debug, Default)]
pub struct HeaderCarrier<T> {
    headers: Vec<T>,
}

impl<T: MessageHeader> HeaderCarrier<T> {
    /// Carrier over the headers of one record.
    pub fn new(headers: Vec<T>) -> Self {
        HeaderCarrier { headers }
    }

    /// The headers, including any pairs appended by injection.
    pub fn headers(&self) -> &[T] {
        &self.headers
    }

    /// Consume the carrier and return the headers for attaching to a record.
    pub fn into_headers(self) -> Vec<T> {
        self.headers
    }
}

impl<T: MessageHeader> Extractor for HeaderCarrier<T> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.key() == key)
            .and_then(|header| std::str::from_utf8(header.value()).ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.iter().map(|header| header.key()).collect()
    }
}

impl<T: MessageHeader> Injector for HeaderCarrier<T> {
    fn set(&mut self, key: &str, value: String) {
        match self.headers.iter_mut().find(|header| header.key() == key) {
            Some(header) => header.set_value(value.into_bytes()),
            None => self.headers.push(T::from_pair(key, value.into_bytes())),
        }
    }
}
