use crate::error::CacheError;

use super::CacheStorage;

/// Summary of one namespace for display.
#[derive(Debug, Clone)]
pub struct NamespaceReport {
    pub name: String,
    pub entries: usize,
    pub bytes: usize,
    /// Age of the most recently written entry, e.g. "5m ago"
    pub last_updated: Option<String>,
    /// Whether the namespace belongs to the running version
    pub current: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CacheReport {
    pub namespaces: Vec<NamespaceReport>,
}

impl CacheReport {
    /// Walk every namespace in `storage`. `valid` names the namespaces of the
    /// current version.
    pub async fn collect<S: CacheStorage + ?Sized>(
        storage: &S,
        valid: &[&str],
    ) -> Result<Self, CacheError> {
        let mut namespaces = Vec::new();
        for name in storage.keys().await? {
            let entries = storage.entries(&name).await?;
            let newest = entries.iter().max_by_key(|e| e.cached_at);
            namespaces.push(NamespaceReport {
                current: valid.contains(&name.as_str()),
                entries: entries.len(),
                bytes: entries.iter().map(|e| e.response.body.len()).sum(),
                last_updated: newest.map(|e| e.age_display()),
                name,
            });
        }
        Ok(Self { namespaces })
    }

    pub fn total_entries(&self) -> usize {
        self.namespaces.iter().map(|n| n.entries).sum()
    }

    /// Namespaces left over from other versions
    pub fn stale(&self) -> impl Iterator<Item = &NamespaceReport> {
        self.namespaces.iter().filter(|n| !n.current)
    }

    pub fn last_updated(&self) -> String {
        self.namespaces
            .iter()
            .filter(|n| n.current)
            .find_map(|n| n.last_updated.clone())
            .unwrap_or_else(|| "never".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::models::Response;

    #[tokio::test]
    async fn test_collect_marks_current_and_stale() {
        let storage = MemoryCacheStorage::new();
        let key = "https://openbalti.com/";
        storage
            .put("openbalti-static-v3.0.0", key, &Response::text(200, "OK", "old"))
            .await
            .unwrap();
        storage
            .put("openbalti-static-v4.0.0", key, &Response::text(200, "OK", "new!"))
            .await
            .unwrap();

        let report = CacheReport::collect(&storage, &["openbalti-static-v4.0.0"])
            .await
            .unwrap();
        assert_eq!(report.namespaces.len(), 2);
        assert_eq!(report.total_entries(), 2);
        assert_eq!(report.stale().count(), 1);
        assert_eq!(report.namespaces[1].bytes, 4);
        assert_eq!(report.last_updated(), "just now");
    }

    #[test]
    fn test_last_updated_empty() {
        assert_eq!(CacheReport::default().last_updated(), "never");
    }
}
