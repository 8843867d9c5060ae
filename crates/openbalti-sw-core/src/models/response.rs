use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A response as stored in and served from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
    /// Final URL after redirects, when the response came from the network
    #[serde(default)]
    pub url: Option<String>,
}

impl Response {
    pub fn new(status: u16, status_text: &str, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: status_text.to_string(),
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body,
            url: None,
        }
    }

    pub fn html(status: u16, status_text: &str, body: &str) -> Self {
        Self::new(status, status_text, "text/html; charset=utf-8", body.as_bytes().to_vec())
    }

    pub fn text(status: u16, status_text: &str, body: &str) -> Self {
        Self::new(status, status_text, "text/plain; charset=utf-8", body.as_bytes().to_vec())
    }

    pub fn json<T: Serialize>(
        status: u16,
        status_text: &str,
        value: &T,
    ) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status, status_text, "application/json", body))
    }

    /// 2xx, the only responses that are ever cached.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json_body<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
