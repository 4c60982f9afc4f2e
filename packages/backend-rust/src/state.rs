use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bkt_algo::{FitResult, KcId, LearnerId, ParameterSet};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::Config;
use crate::db::{MasteryRepository, MemoryStore, SubmissionHistory};

/// One published set of population parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelGeneration {
    /// 0 = configured defaults, incremented by every successful refit
    pub generation: u64,
    pub params: ParameterSet,
    pub fitted_at: DateTime<Utc>,
    pub fit: Option<FitResult>,
}

/// Copy-on-write holder for the current population parameters.
///
/// Readers clone the inner `Arc` and never block a refit for longer than the pointer swap.
#[derive(Debug)]
pub struct ModelRegistry {
    current: RwLock<Arc<ModelGeneration>>,
}

impl ModelRegistry {
    pub fn new(defaults: ParameterSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(ModelGeneration {
                generation: 0,
                params: defaults,
                fitted_at: Utc::now(),
                fit: None,
            })),
        }
    }

    pub fn current(&self) -> Arc<ModelGeneration> {
        Arc::clone(&*self.current.read())
    }

    pub fn params(&self) -> ParameterSet {
        self.current.read().params
    }

    pub fn publish(&self, fit: FitResult) -> Arc<ModelGeneration> {
        let mut guard = self.current.write();
        let next = Arc::new(ModelGeneration {
            generation: guard.generation + 1,
            params: fit.params,
            fitted_at: Utc::now(),
            fit: Some(fit),
        });
        *guard = Arc::clone(&next);
        next
    }
}

/// Per-(learner, KC) mutexes serializing read-modify-write of one mastery row.
///
/// Entries are dropped again by [`PairLocks::release`] once no caller holds them,
/// so the map only tracks pairs with a write in flight.
#[derive(Default)]
pub struct PairLocks {
    locks: Mutex<HashMap<(LearnerId, KcId), Arc<Mutex<()>>>>,
}

impl PairLocks {
    pub fn lock_for(&self, learner_id: LearnerId, kc_id: KcId) -> Arc<Mutex<()>> {
        let mut guard = self.locks.lock();
        Arc::clone(guard.entry((learner_id, kc_id)).or_default())
    }

    /// Hand back a handle from [`PairLocks::lock_for`]; the entry is pruned when
    /// the map and this handle are its only owners.
    pub fn release(&self, learner_id: LearnerId, kc_id: KcId, lock: Arc<Mutex<()>>) {
        let mut guard = self.locks.lock();
        // map + `lock`; other holders clone only while this mutex is held
        if Arc::strong_count(&lock) == 2 {
            guard.remove(&(learner_id, kc_id));
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

#[derive(Clone)]
pub struct AppContext {
    started_at: Instant,
    config: Arc<Config>,
    mastery: Arc<dyn MasteryRepository>,
    history: Arc<dyn SubmissionHistory>,
    models: Arc<ModelRegistry>,
    pair_locks: Arc<PairLocks>,
}

impl AppContext {
    pub fn new(
        config: Config,
        mastery: Arc<dyn MasteryRepository>,
        history: Arc<dyn SubmissionHistory>,
    ) -> Self {
        let models = Arc::new(ModelRegistry::new(config.default_params));
        Self {
            started_at: Instant::now(),
            config: Arc::new(config),
            mastery,
            history,
            models,
            pair_locks: Arc::new(PairLocks::default()),
        }
    }

    /// Context backed by a single fresh `MemoryStore`
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mastery(&self) -> Arc<dyn MasteryRepository> {
        Arc::clone(&self.mastery)
    }

    pub fn history(&self) -> Arc<dyn SubmissionHistory> {
        Arc::clone(&self.history)
    }

    pub fn models(&self) -> Arc<ModelRegistry> {
        Arc::clone(&self.models)
    }

    pub fn pair_locks(&self) -> &PairLocks {
        &self.pair_locks
    }
}
