use bytes::Bytes;

/// Cached HTTP response stored under a request key.
///
/// Headers are kept as an ordered list so a read-back reproduces exactly
/// what was written, including the `sw-cache-expires` header stamped by
/// the gateway.
#[derive(Clone, Debug)]
pub struct StoredResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StoredResponse {
    /// Case-insensitive header lookup. Returns the first matching value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
