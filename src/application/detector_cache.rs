use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::application::ports::{DetectorLoaderPort, DetectorPort};
use crate::domain::{
    errors::{DomainError, DomainResult},
    model::{ModelConfiguration, ModelInfo, ModelStatus},
};

/// A loaded detector together with what it was loaded from.
pub struct CachedDetector {
    detector: Arc<dyn DetectorPort>,
    config: ModelConfiguration,
    loaded_at: OffsetDateTime,
    device: String,
}

impl CachedDetector {
    pub fn detector(&self) -> Arc<dyn DetectorPort> {
        self.detector.clone()
    }

    pub fn config(&self) -> &ModelConfiguration {
        &self.config
    }

    pub fn loaded_at(&self) -> OffsetDateTime {
        self.loaded_at
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo::loaded(&self.config, &self.device, self.loaded_at)
    }
}

impl std::fmt::Debug for CachedDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDetector")
            .field("model_name", &self.config.model_name)
            .field("model_path", &self.config.model_path)
            .field("device", &self.device)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

type LoadGate = Arc<tokio::sync::Mutex<()>>;

/// Active configuration and loaded detectors, always read and written together.
struct CacheState {
    active: ModelConfiguration,
    entries: HashMap<String, Arc<CachedDetector>>,
}

impl CacheState {
    fn active_entry(&self) -> Option<Arc<CachedDetector>> {
        self.entries
            .get(&self.active.model_name)
            .filter(|c| c.config.same_model(&self.active))
            .cloned()
    }
}

/// Owns the loaded detectors, keyed by model name.
///
/// Only the active model is ever cached. `state` is held just long enough to
/// clone an `Arc` or to publish a load; loads run on the blocking pool with no
/// lock held. First loads of a model are collapsed by a per-name gate, and
/// reloads are serialized by `reloading` so two of them can never interleave
/// their publications. Holders of a replaced `Arc` keep using it until they
/// drop it.
pub struct DetectorCache {
    loader: Arc<dyn DetectorLoaderPort>,
    state: RwLock<CacheState>,
    gates: Mutex<HashMap<String, LoadGate>>,
    reloading: tokio::sync::Mutex<()>,
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::Internal("detector cache lock poisoned".into())
}

impl DetectorCache {
    pub fn new(loader: Arc<dyn DetectorLoaderPort>, active: ModelConfiguration) -> Self {
        Self {
            loader,
            state: RwLock::new(CacheState { active, entries: HashMap::new() }),
            gates: Mutex::new(HashMap::new()),
            reloading: tokio::sync::Mutex::new(()),
        }
    }

    /// Configuration requests are validated against.
    pub fn active_config(&self) -> DomainResult<ModelConfiguration> {
        Ok(self.read()?.active.clone())
    }

    pub fn loaded_models(&self) -> DomainResult<Vec<String>> {
        let mut names: Vec<String> = self.read()?.entries.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Returns the detector of the model active at call time, loading it on
    /// first use. If a reload replaces the active model while this load is in
    /// flight, the stale load is dropped and the new active detector returned.
    pub async fn acquire(&self) -> DomainResult<Arc<CachedDetector>> {
        loop {
            let target = {
                let state = self.read()?;
                if let Some(hit) = state.active_entry() {
                    return Ok(hit);
                }
                state.active.clone()
            };

            let gate = self.gate(&target.model_name)?;
            let _guard = gate.lock().await;
            {
                let state = self.read()?;
                if !state.active.same_model(&target) {
                    continue;
                }
                // Another caller may have finished the load while we waited.
                if let Some(hit) = state.active_entry() {
                    return Ok(hit);
                }
            }

            let loaded = self.load(target.clone()).await?;
            {
                let mut state = self.write()?;
                if state.active.same_model(&target) {
                    let entry = match state.active_entry() {
                        Some(published) => published,
                        None => {
                            state.entries.insert(target.model_name.clone(), loaded.clone());
                            loaded
                        }
                    };
                    return Ok(entry);
                }
            }
            debug!(model = %target.model_name, "El modelo activo cambió durante la carga, reintentando");
        }
    }

    /// Loads `config` from scratch and swaps it in as the active model. On
    /// failure the cache and the active configuration are left as they were.
    pub async fn reload(&self, config: ModelConfiguration) -> DomainResult<Arc<CachedDetector>> {
        let _serial = self.reloading.lock().await;

        let cached = match self.load(config.clone()).await {
            Ok(c) => c,
            Err(e) => {
                warn!(model = %config.model_name, error = %e, "Recarga fallida, se mantiene el detector anterior");
                return Err(e);
            }
        };

        let previous = {
            let mut state = self.write()?;
            let previous = std::mem::replace(&mut state.active, config.clone());
            state.entries.insert(config.model_name.clone(), cached.clone());
            if previous.model_name != config.model_name {
                state.entries.remove(&previous.model_name);
            }
            previous
        };
        if previous.model_name != config.model_name {
            self.gates.lock().map_err(poisoned)?.remove(&previous.model_name);
        }

        info!(
            model = %config.model_name,
            path = %config.model_path,
            device = %cached.device,
            "Detector recargado"
        );
        Ok(cached)
    }

    pub fn status(&self) -> DomainResult<ModelStatus> {
        let state = self.read()?;
        let entry = state.active_entry();
        Ok(ModelStatus {
            model_loaded: entry.is_some(),
            model_info: match &entry {
                Some(c) => c.info(),
                None => ModelInfo::not_loaded(&state.active),
            },
            model_config: state.active.clone(),
        })
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, CacheState>> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, CacheState>> {
        self.state.write().map_err(poisoned)
    }

    fn gate(&self, model_name: &str) -> DomainResult<LoadGate> {
        let mut gates = self.gates.lock().map_err(poisoned)?;
        Ok(gates.entry(model_name.to_string()).or_default().clone())
    }

    async fn load(&self, config: ModelConfiguration) -> DomainResult<Arc<CachedDetector>> {
        let loader = self.loader.clone();
        let started = Instant::now();
        info!(model = %config.model_name, path = %config.model_path, "Cargando detector");

        let (loaded, config) = tokio::task::spawn_blocking(move || {
            loader.load(&config).map(|loaded| (loaded, config))
        })
        .await
        .map_err(|e| DomainError::ModelLoadFailed(format!("load task failed: {e}")))??;

        info!(
            model = %config.model_name,
            device = %loaded.device,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Detector cargado"
        );
        Ok(Arc::new(CachedDetector {
            detector: loaded.detector,
            config,
            loaded_at: OffsetDateTime::now_utc(),
            device: loaded.device,
        }))
    }
}
