use super::model::ModelInfo;
use crate::error::AiError;
use arc_swap::ArcSwap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a fetched catalog is trusted before the next lookup refetches.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Default)]
struct CatalogSnapshot {
    models: Vec<ModelInfo>,
    synced_at: Option<Instant>,
}

/// Per-provider model catalog: configured entries, a TTL cache, and a live
/// fetch, consulted in that order.
///
/// The cache is only ever replaced as a whole via [`ArcSwap`], so readers see
/// either the previous snapshot or the next one, never a half-written list.
/// Configured entries win over live entries with the same id on every path.
#[derive(Debug)]
pub struct ModelCatalog {
    provider: String,
    static_models: Vec<ModelInfo>,
    ttl: Duration,
    cache: ArcSwap<CatalogSnapshot>,
}

impl ModelCatalog {
    pub fn new(provider: &str, static_models: Vec<ModelInfo>, ttl: Duration) -> Self {
        let static_models = static_models
            .into_iter()
            .map(|model| own_model(provider, model))
            .collect();
        Self {
            provider: provider.to_string(),
            static_models,
            ttl,
            cache: ArcSwap::from_pointee(CatalogSnapshot::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.cache.load().is_fresh(self.ttl)
    }

    /// Current cache contents, fresh or not.
    pub fn cached(&self) -> Vec<ModelInfo> {
        self.cache.load().models.clone()
    }

    /// Forget the cached catalog; the next lookup fetches.
    pub fn invalidate(&self) {
        self.cache.store(Arc::new(CatalogSnapshot::default()));
    }

    /// Look `name` up by id or alias.
    ///
    /// Configured entries answer first and never expire; then a fresh cache;
    /// then one live fetch, which replaces the cache wholesale.
    pub async fn model_info<F, Fut>(&self, name: &str, fetch: F) -> Result<ModelInfo, AiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ModelInfo>, AiError>>,
    {
        if let Some(model) = self.static_models.iter().find(|m| m.answers_to(name)) {
            return Ok(model.clone());
        }

        let snapshot = self.cache.load_full();
        if snapshot.is_fresh(self.ttl)
            && let Some(model) = snapshot.find(name)
        {
            return Ok(model.clone());
        }

        let refreshed = self.refresh(fetch().await?);
        refreshed
            .find(name)
            .cloned()
            .ok_or_else(|| AiError::model_not_found(&self.provider, name))
    }

    /// The catalog, optionally reduced to free models.
    ///
    /// A fresh, non-empty cache is served unless `force_fresh` is set. The
    /// full list is always what gets cached; the free view is derived per call.
    pub async fn models<F, Fut>(
        &self,
        only_free: bool,
        force_fresh: bool,
        fetch: F,
    ) -> Result<Vec<ModelInfo>, AiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ModelInfo>, AiError>>,
    {
        let snapshot = self.cache.load_full();
        if !force_fresh && snapshot.is_fresh(self.ttl) && !snapshot.models.is_empty() {
            return Ok(view(&snapshot.models, only_free));
        }

        let refreshed = self.refresh(fetch().await?);
        Ok(view(&refreshed.models, only_free))
    }

    fn refresh(&self, fetched: Vec<ModelInfo>) -> Arc<CatalogSnapshot> {
        let mut models: Vec<ModelInfo> = fetched
            .into_iter()
            .map(|model| own_model(&self.provider, model))
            .collect();

        for configured in &self.static_models {
            match models.iter_mut().find(|m| m.id == configured.id) {
                Some(live) => *live = configured.clone(),
                None => models.push(configured.clone()),
            }
        }

        tracing::info!(
            provider = %self.provider,
            models = models.len(),
            "Model catalog refreshed"
        );

        let snapshot = Arc::new(CatalogSnapshot {
            models,
            synced_at: Some(Instant::now()),
        });
        self.cache.store(Arc::clone(&snapshot));
        snapshot
    }
}

impl CatalogSnapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.synced_at.is_some_and(|at| at.elapsed() < ttl)
    }

    fn find(&self, name: &str) -> Option<&ModelInfo> {
        self.models.iter().find(|m| m.answers_to(name))
    }
}

fn own_model(provider: &str, mut model: ModelInfo) -> ModelInfo {
    if model.provider.is_empty() {
        provider.clone_into(&mut model.provider);
    }
    model
}

fn view(models: &[ModelInfo], only_free: bool) -> Vec<ModelInfo> {
    models
        .iter()
        .filter(|m| !only_free || m.is_free())
        .cloned()
        .collect()
}
