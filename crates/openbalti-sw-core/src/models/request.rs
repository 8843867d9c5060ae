use reqwest::Method;
use url::Url;

/// How the request was initiated. Only `Navigate` matters to routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// What the response will be used for, as reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
}

impl Destination {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Some(Destination::Document),
            "script" => Some(Destination::Script),
            "style" => Some(Destination::Style),
            "image" => Some(Destination::Image),
            "font" => Some(Destination::Font),
            "manifest" => Some(Destination::Manifest),
            "" | "empty" => Some(Destination::Empty),
            _ => None,
        }
    }
}

/// Whether the outbound fetch may be answered from an HTTP cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    Reload,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub cache_mode: CacheMode,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            cache_mode: CacheMode::default(),
            headers: Vec::new(),
        }
    }

    /// A full page load.
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            destination: Destination::Document,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Skip any HTTP cache between the worker and the origin.
    pub fn bypass_cache(mut self) -> Self {
        self.cache_mode = CacheMode::Reload;
        self
    }

    /// Cache entries are keyed by URL without its fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_drops_fragment() {
        let url = Url::parse("https://openbalti.com/words/khar#etymology").unwrap();
        let request = Request::get(url);
        assert_eq!(request.cache_key(), "https://openbalti.com/words/khar");
    }

    #[test]
    fn test_cache_key_keeps_query() {
        let url = Url::parse("https://openbalti.com/api/words?q=khar").unwrap();
        assert_eq!(
            Request::get(url).cache_key(),
            "https://openbalti.com/api/words?q=khar"
        );
    }

    #[test]
    fn test_navigate_sets_mode_and_destination() {
        let request = Request::navigate(Url::parse("https://openbalti.com/forum").unwrap());
        assert_eq!(request.mode, RequestMode::Navigate);
        assert_eq!(request.destination, Destination::Document);
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn test_is_http() {
        let https = Request::get(Url::parse("https://openbalti.com/").unwrap());
        let ext = Request::get(Url::parse("chrome-extension://abc/script.js").unwrap());
        assert!(https.is_http());
        assert!(!ext.is_http());
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse("Script"), Some(Destination::Script));
        assert_eq!(Destination::parse(""), Some(Destination::Empty));
        assert_eq!(Destination::parse("video"), None);
    }
}
