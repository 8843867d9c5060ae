//! Caching strategies for intercepted requests.
//!
//! Every handler returns a `Response`; failures are converted to a cached
//! copy or an offline payload and never escape. Cache writes only happen for
//! 2xx network responses and a failed write is logged, not propagated.

use tracing::{debug, warn};

use crate::cache::{CacheStorage, CachedEntry};
use crate::config::{CacheRole, WorkerConfig};
use crate::models::{Request, Response};
use crate::network::Network;
use crate::offline;
use crate::router::{classify, RouteKind};

/// Everything a strategy needs, borrowed from the worker.
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub config: &'a WorkerConfig,
    pub storage: &'a dyn CacheStorage,
    pub network: &'a dyn Network,
}

impl FetchContext<'_> {
    /// Best-effort write into the namespace for `role`.
    async fn store(&self, role: CacheRole, key: &str, response: &Response) {
        if !response.is_ok() {
            return;
        }
        let cache = self.config.cache_name(role);
        match self.storage.put(cache, key, response).await {
            Ok(()) => debug!(cache, key, "Cached response"),
            Err(e) => warn!(cache, key, error = %e, "Failed to cache response"),
        }
    }

    /// Cache lookup across all namespaces; read errors count as a miss.
    async fn lookup(&self, key: &str) -> Option<CachedEntry> {
        match self.storage.match_any(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key, error = %e, "Cache lookup failed");
                None
            }
        }
    }
}

/// Route the request and run the matching strategy.
pub async fn handle(ctx: FetchContext<'_>, request: &Request) -> Response {
    let route = classify(request, ctx.config);
    debug!(url = %request.url, ?route, "Handling fetch");
    match route {
        RouteKind::Navigation => handle_navigation(ctx, request).await,
        RouteKind::Api => handle_api(ctx, request).await,
        RouteKind::StaticAsset => handle_static(ctx, request).await,
        RouteKind::Other => handle_other(ctx, request).await,
    }
}

/// Network first; then the exact page, then the cached root page, then the
/// offline page.
pub async fn handle_navigation(ctx: FetchContext<'_>, request: &Request) -> Response {
    let key = request.cache_key();
    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(CacheRole::Dynamic, &key, &response).await;
            response
        }
        Err(e) => {
            debug!(url = %key, error = %e, "Navigation failed, trying cache");
            if let Some(entry) = ctx.lookup(&key).await {
                return entry.response;
            }
            if let Ok(root) = ctx.config.resolve("/") {
                if let Some(entry) = ctx.lookup(root.as_str()).await {
                    debug!(url = %key, "Serving cached root page");
                    return entry.response;
                }
            }
            offline::offline_page()
        }
    }
}

/// Network first; then the cached response; then a JSON offline error.
pub async fn handle_api(ctx: FetchContext<'_>, request: &Request) -> Response {
    let key = request.cache_key();
    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(CacheRole::Api, &key, &response).await;
            response
        }
        Err(e) => {
            debug!(url = %key, error = %e, "API request failed, trying cache");
            match ctx.lookup(&key).await {
                Some(entry) => entry.response,
                None => offline::offline_api(),
            }
        }
    }
}

/// Cache first; the network is only touched on a miss.
pub async fn handle_static(ctx: FetchContext<'_>, request: &Request) -> Response {
    let key = request.cache_key();
    if let Some(entry) = ctx.lookup(&key).await {
        debug!(url = %key, "Static cache hit");
        return entry.response;
    }
    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(CacheRole::Static, &key, &response).await;
            response
        }
        Err(e) => {
            debug!(url = %key, error = %e, "Static asset unavailable");
            offline::offline_generic()
        }
    }
}

/// Network first with a plain cache fallback.
pub async fn handle_other(ctx: FetchContext<'_>, request: &Request) -> Response {
    let key = request.cache_key();
    match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store(CacheRole::Dynamic, &key, &response).await;
            response
        }
        Err(e) => {
            debug!(url = %key, error = %e, "Request failed, trying cache");
            match ctx.lookup(&key).await {
                Some(entry) => entry.response,
                None => offline::offline_generic(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::network::MockNetwork;
    use url::Url;

    const ORIGIN: &str = "https://openbalti.com";

    struct Fixture {
        config: WorkerConfig,
        storage: MemoryCacheStorage,
        network: MockNetwork,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: WorkerConfig::new(Url::parse(ORIGIN).unwrap()),
                storage: MemoryCacheStorage::new(),
                network: MockNetwork::new(),
            }
        }

        fn ctx(&self) -> FetchContext<'_> {
            FetchContext {
                config: &self.config,
                storage: &self.storage,
                network: &self.network,
            }
        }

        fn url(&self, path: &str) -> Url {
            self.config.resolve(path).unwrap()
        }
    }

    #[tokio::test]
    async fn test_navigation_caches_successful_pages() {
        let fx = Fixture::new();
        let url = fx.url("/words/khar");
        fx.network.respond(url.as_str(), Response::html(200, "OK", "<h1>khar</h1>"));

        let response = handle(fx.ctx(), &Request::navigate(url.clone())).await;
        assert_eq!(response.status, 200);

        let cached = fx
            .storage
            .match_in(&fx.config.dynamic_cache, url.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.response.text_body(), "<h1>khar</h1>");
    }

    #[tokio::test]
    async fn test_navigation_does_not_cache_errors() {
        let fx = Fixture::new();
        let url = fx.url("/words/missing");
        fx.network.respond(url.as_str(), Response::html(404, "Not Found", "nope"));

        let response = handle(fx.ctx(), &Request::navigate(url.clone())).await;
        assert_eq!(response.status, 404);
        assert!(fx.storage.match_any(url.as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_navigation_fallback_chain() {
        let fx = Fixture::new();
        let page = fx.url("/forum");
        let root = fx.url("/");

        // Nothing cached: offline page
        let response = handle(fx.ctx(), &Request::navigate(page.clone())).await;
        assert_eq!(response.status, 503);
        assert!(response.text_body().contains("OpenBalti Dictionary"));

        // Root cached: root page
        fx.storage
            .put(&fx.config.static_cache, root.as_str(), &Response::html(200, "OK", "home"))
            .await
            .unwrap();
        let response = handle(fx.ctx(), &Request::navigate(page.clone())).await;
        assert_eq!(response.text_body(), "home");

        // Exact page cached: exact page
        fx.storage
            .put(&fx.config.dynamic_cache, page.as_str(), &Response::html(200, "OK", "forum"))
            .await
            .unwrap();
        let response = handle(fx.ctx(), &Request::navigate(page)).await;
        assert_eq!(response.text_body(), "forum");
    }

    #[tokio::test]
    async fn test_api_falls_back_to_cache_then_json_error() {
        let fx = Fixture::new();
        let url = fx.url("/api/words?q=khar");
        let words = Response::json(200, "OK", &serde_json::json!(["khar"])).unwrap();
        fx.network.respond(url.as_str(), words);

        let first = handle(fx.ctx(), &Request::get(url.clone())).await;
        assert_eq!(first.status, 200);
        assert!(fx
            .storage
            .match_in(&fx.config.api_cache, url.as_str())
            .await
            .unwrap()
            .is_some());

        fx.network.go_offline();
        let second = handle(fx.ctx(), &Request::get(url)).await;
        assert_eq!(second.body, first.body);

        let other = handle(fx.ctx(), &Request::get(fx.url("/api/forum/threads"))).await;
        assert_eq!(other.status, 503);
        assert_eq!(other.json_body::<serde_json::Value>().unwrap()["offline"], true);
    }

    #[tokio::test]
    async fn test_static_is_cache_first() {
        let fx = Fixture::new();
        let url = fx.url("/logo.png");
        fx.network.respond_text(url.as_str(), 200, "png-bytes");

        let first = handle(fx.ctx(), &Request::get(url.clone())).await;
        assert_eq!(first.text_body(), "png-bytes");
        assert_eq!(fx.network.call_count(url.as_str()), 1);

        let second = handle(fx.ctx(), &Request::get(url.clone())).await;
        assert_eq!(second.text_body(), "png-bytes");
        assert_eq!(fx.network.call_count(url.as_str()), 1);
    }

    #[tokio::test]
    async fn test_static_miss_while_offline() {
        let fx = Fixture::new();
        let response = handle(fx.ctx(), &Request::get(fx.url("/app.css"))).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.text_body(), "Offline");
    }

    #[tokio::test]
    async fn test_other_falls_back_to_cache() {
        let fx = Fixture::new();
        let url = fx.url("/manifest.json");
        fx.network.respond_text(url.as_str(), 200, "{}");

        handle(fx.ctx(), &Request::get(url.clone())).await;
        fx.network.go_offline();

        let response = handle(fx.ctx(), &Request::get(url)).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.text_body(), "{}");

        let missing = handle(fx.ctx(), &Request::get(fx.url("/robots.txt"))).await;
        assert_eq!(missing.status, 503);
    }
}
