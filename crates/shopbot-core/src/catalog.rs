//! Read-only, periodically refreshed view of purchasable items.
//!
//! Readers take an `Arc` snapshot; a refresh builds a new list and swaps the
//! pointer, so no reader ever observes a half-written catalog. A failed refresh
//! leaves the previous snapshot in place.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::{
    domain::{CatalogItem, Style},
    ports::ProductSource,
    Result,
};

pub const MAX_SEARCH_RESULTS: usize = 10;

pub struct CatalogCache {
    source: Arc<dyn ProductSource>,
    limit: usize,
    items: RwLock<Arc<Vec<CatalogItem>>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn ProductSource>, limit: usize) -> Self {
        Self {
            source,
            limit,
            items: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Reload from the product source. Returns the new item count.
    pub async fn refresh(&self) -> Result<usize> {
        match self.source.fetch_active(self.limit).await {
            Ok(items) => {
                let n = items.len();
                *self.items.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(items);
                info!(items = n, "catalog loaded");
                Ok(n)
            }
            Err(e) => {
                warn!(error = %e, "catalog refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Current snapshot.
    pub fn all(&self) -> Arc<Vec<CatalogItem>> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    pub fn first(&self, n: usize) -> Vec<CatalogItem> {
        self.all().iter().take(n).cloned().collect()
    }

    pub fn find(&self, id: &str) -> Option<CatalogItem> {
        self.all().iter().find(|p| p.id == id).cloned()
    }

    /// First item whose name contains `fragment`, ignoring case.
    pub fn find_by_name_fragment(&self, fragment: &str) -> Option<CatalogItem> {
        let needle = fragment.to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.all()
            .iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
    }

    /// Item the customer appears to name in free text.
    ///
    /// A full product name inside the text wins (longest name first). Otherwise
    /// each word is tried as a name fragment; numbers and words shorter than
    /// three letters are skipped.
    pub fn find_mentioned(&self, text: &str) -> Option<CatalogItem> {
        let lowered = text.to_lowercase();
        let items = self.all();
        let full = items
            .iter()
            .filter(|p| !p.name.is_empty() && lowered.contains(&p.name.to_lowercase()))
            .max_by_key(|p| p.name.chars().count());
        if let Some(item) = full {
            return Some(item.clone());
        }

        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().count() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
            .find_map(|w| self.find_by_name_fragment(w))
    }

    /// Case-insensitive substring match on name, category and description.
    /// At most [`MAX_SEARCH_RESULTS`], in catalog order.
    pub fn search(&self, text: &str) -> Vec<CatalogItem> {
        let q = text.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        self.all()
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&q)
                    || contains_lower(p.category.as_deref(), &q)
                    || contains_lower(p.description.as_deref(), &q)
            })
            .take(MAX_SEARCH_RESULTS)
            .cloned()
            .collect()
    }

    /// Items whose category or description mention the style.
    pub fn by_style(&self, style: Style, limit: usize) -> Vec<CatalogItem> {
        let keys = [style.as_str(), style.label()];
        self.all()
            .iter()
            .filter(|p| {
                keys.iter().any(|k| {
                    contains_lower(p.description.as_deref(), k)
                        || contains_lower(p.category.as_deref(), k)
                })
            })
            .take(limit)
            .cloned()
            .collect()
    }
}

fn contains_lower(field: Option<&str>, needle_lower: &str) -> bool {
    field
        .map(|f| f.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::item, Error};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakySource {
        fail: AtomicBool,
        items: Vec<CatalogItem>,
    }

    #[async_trait]
    impl ProductSource for FlakySource {
        async fn fetch_active(&self, limit: usize) -> Result<Vec<CatalogItem>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Storage("db down".into()));
            }
            Ok(self.items.iter().take(limit).cloned().collect())
        }
    }

    fn cache_with(items: Vec<CatalogItem>) -> (Arc<FlakySource>, CatalogCache) {
        let src = Arc::new(FlakySource {
            fail: AtomicBool::new(false),
            items,
        });
        let cache = CatalogCache::new(src.clone(), 100);
        (src, cache)
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let (src, cache) = cache_with(vec![item("1", "Camiseta Negra", 35_000)]);
        assert_eq!(cache.refresh().await.unwrap(), 1);

        src.fail.store(true, Ordering::SeqCst);
        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.all()[0].name, "Camiseta Negra");
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot_across_refresh() {
        let (_src, cache) = cache_with(vec![item("1", "Gorra", 45_000)]);
        cache.refresh().await.unwrap();
        let before = cache.all();
        cache.refresh().await.unwrap();
        assert_eq!(before.len(), 1);
        assert!(!Arc::ptr_eq(&before, &cache.all()));
    }

    #[tokio::test]
    async fn search_matches_name_category_and_description() {
        let mut hoodie = item("2", "Buzo Gris", 80_000);
        hoodie.category = Some("Buzos".into());
        let mut cap = item("3", "Gorra", 45_000);
        cap.description = Some("Gorra urbana negra".into());
        let (_src, cache) = cache_with(vec![item("1", "Camiseta Negra", 35_000), hoodie, cap]);
        cache.refresh().await.unwrap();

        let ids = |v: Vec<CatalogItem>| v.into_iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(cache.search("NEGRA")), vec!["1", "3"]);
        assert_eq!(ids(cache.search("buzos")), vec!["2"]);
        assert!(cache.search("zapatos").is_empty());
        assert!(cache.search("   ").is_empty());
    }

    #[tokio::test]
    async fn search_caps_results_at_ten_in_catalog_order() {
        let items = (0..15)
            .map(|i| item(&i.to_string(), &format!("Camiseta {i}"), 30_000))
            .collect();
        let (_src, cache) = cache_with(items);
        cache.refresh().await.unwrap();

        let hits = cache.search("camiseta");
        assert_eq!(hits.len(), MAX_SEARCH_RESULTS);
        assert_eq!(hits[0].id, "0");
        assert_eq!(hits[9].id, "9");
    }

    #[tokio::test]
    async fn empty_catalog_is_not_an_error() {
        let (_src, cache) = cache_with(vec![]);
        assert_eq!(cache.refresh().await.unwrap(), 0);
        assert!(cache.search("camiseta").is_empty());
        assert!(cache.by_style(Style::Urban, 8).is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn mentioned_item_prefers_full_name_then_words() {
        let (_src, cache) = cache_with(vec![
            item("1", "Camiseta Blanca", 30_000),
            item("2", "Camiseta Negra", 35_000),
            item("3", "Gorra", 45_000),
        ]);
        cache.refresh().await.unwrap();

        let id = |t: &str| cache.find_mentioned(t).map(|i| i.id);
        assert_eq!(id("quiero la camiseta negra, 2").as_deref(), Some("2"));
        assert_eq!(id("una camiseta").as_deref(), Some("1"));
        assert_eq!(id("la gorra!").as_deref(), Some("3"));
        assert_eq!(id("la 2"), None);
        assert_eq!(id("zapatos"), None);
    }

    #[tokio::test]
    async fn style_filter_reads_description_and_category() {
        let mut a = item("1", "Jogger", 70_000);
        a.description = Some("Estilo URBANO".into());
        let mut b = item("2", "Camisa", 90_000);
        b.category = Some("Clásico".into());
        let (_src, cache) = cache_with(vec![a, b, item("3", "Medias", 10_000)]);
        cache.refresh().await.unwrap();

        assert_eq!(cache.by_style(Style::Urban, 8)[0].id, "1");
        assert_eq!(cache.by_style(Style::Classic, 8)[0].id, "2");
    }
}
