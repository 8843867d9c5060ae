//! Request classification.
//!
//! `classify` is a pure function of the request and the worker config. The
//! order is fixed and the first match wins:
//!
//! 1. navigation (full page load)
//! 2. path under the API prefix
//! 3. static asset, by file extension or by reported destination
//! 4. everything else

use reqwest::Method;

use crate::config::WorkerConfig;
use crate::models::{Destination, Request, RequestMode};

/// File extensions served cache-first
const STATIC_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif", "woff",
    "woff2", "ttf", "otf", "eot",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Navigation,
    Api,
    StaticAsset,
    Other,
}

/// Only GET requests over http(s) are intercepted; everything else goes
/// straight to the network.
pub fn should_intercept(request: &Request) -> bool {
    request.method == Method::GET && request.is_http()
}

pub fn classify(request: &Request, config: &WorkerConfig) -> RouteKind {
    if request.mode == RequestMode::Navigate {
        RouteKind::Navigation
    } else if request.path().starts_with(&config.api_prefix) {
        RouteKind::Api
    } else if has_static_extension(request.path()) || is_static_destination(request.destination) {
        RouteKind::StaticAsset
    } else {
        RouteKind::Other
    }
}

fn has_static_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_EXTENSIONS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

fn is_static_destination(destination: Destination) -> bool {
    matches!(
        destination,
        Destination::Script | Destination::Style | Destination::Image | Destination::Font
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn config() -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://openbalti.com").unwrap())
    }

    fn get(path: &str) -> Request {
        Request::get(config().resolve(path).unwrap())
    }

    #[test]
    fn test_navigation_wins_over_everything() {
        let config = config();
        let request = Request::navigate(config.resolve("/api/words").unwrap());
        assert_eq!(classify(&request, &config), RouteKind::Navigation);

        let request = Request::navigate(config.resolve("/logo.png").unwrap());
        assert_eq!(classify(&request, &config), RouteKind::Navigation);
    }

    #[test]
    fn test_api_prefix() {
        let config = config();
        assert_eq!(classify(&get("/api/words?q=khar"), &config), RouteKind::Api);
        // API wins over a static-looking extension
        assert_eq!(classify(&get("/api/export.js"), &config), RouteKind::Api);
        assert_eq!(classify(&get("/apiary"), &config), RouteKind::Other);
    }

    #[test]
    fn test_static_by_extension() {
        let config = config();
        for path in [
            "/_next/static/chunks/main.js",
            "/styles/app.CSS",
            "/logo.png",
            "/favicon.ico",
            "/fonts/noto.woff2",
        ] {
            assert_eq!(classify(&get(path), &config), RouteKind::StaticAsset, "{}", path);
        }
    }

    #[test]
    fn test_static_by_destination() {
        let config = config();
        let request = get("/_next/image?url=%2Flogo").with_destination(Destination::Image);
        assert_eq!(classify(&request, &config), RouteKind::StaticAsset);

        let request = get("/words").with_destination(Destination::Manifest);
        assert_eq!(classify(&request, &config), RouteKind::Other);
    }

    #[test]
    fn test_extension_needs_a_file_name() {
        let config = config();
        assert_eq!(classify(&get("/.png"), &config), RouteKind::Other);
        assert_eq!(classify(&get("/words.png/"), &config), RouteKind::Other);
        assert_eq!(classify(&get("/manifest.json"), &config), RouteKind::Other);
    }

    #[test]
    fn test_should_intercept() {
        assert!(should_intercept(&get("/")));
        assert!(!should_intercept(&get("/api/words").with_method(Method::POST)));
        let ext = Request::get(Url::parse("chrome-extension://abc/main.js").unwrap());
        assert!(!should_intercept(&ext));
    }
}
