use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::models::{Request, Response};

use super::Network;

#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail,
}

/// Scripted network. URLs without a route fail as if offline.
#[derive(Debug, Default)]
pub struct MockNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) -> &Self {
        lock(&self.routes).insert(url.to_string(), Route::Respond(response));
        self
    }

    pub fn respond_text(&self, url: &str, status: u16, body: &str) -> &Self {
        self.respond(url, Response::text(status, "", body))
    }

    pub fn fail(&self, url: &str) -> &Self {
        lock(&self.routes).insert(url.to_string(), Route::Fail);
        self
    }

    /// Make every URL fail from now on.
    pub fn go_offline(&self) {
        let mut routes = lock(&self.routes);
        for route in routes.values_mut() {
            *route = Route::Fail;
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|c| *c == url).count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }
}

// Ignores poisoning
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let url = request.cache_key();
        lock(&self.calls).push(url.clone());
        let route = lock(&self.routes).get(&url).cloned();
        match route {
            Some(Route::Respond(mut response)) => {
                response.url = Some(url);
                Ok(response)
            }
            Some(Route::Fail) | None => Err(NetworkError::Offline),
        }
    }
}
