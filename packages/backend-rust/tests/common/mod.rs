#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bkt_algo::{KcId, LearnerId, ObservationSequence};
use bkt_backend::config::Config;
use bkt_backend::db::{MasteryRecord, MemoryStore, MasteryRepository, StoreError, Submission, SubmissionHistory};
use bkt_backend::state::AppContext;

pub fn create_test_context() -> AppContext {
    AppContext::in_memory(Config::default())
}

pub fn create_context_with(config: Config) -> AppContext {
    AppContext::in_memory(config)
}

/// Every call fails, for error propagation tests
pub struct FailingStore;

impl MasteryRepository for FailingStore {
    fn load(&self, _: LearnerId, _: KcId) -> Result<Option<MasteryRecord>, StoreError> {
        Err(StoreError::Unavailable("mastery offline".to_string()))
    }

    fn save(&self, _: &MasteryRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("mastery offline".to_string()))
    }

    fn delete(&self, _: LearnerId, _: KcId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("mastery offline".to_string()))
    }

    fn list_for_learner(&self, _: LearnerId) -> Result<Vec<MasteryRecord>, StoreError> {
        Err(StoreError::Unavailable("mastery offline".to_string()))
    }
}

impl SubmissionHistory for FailingStore {
    fn append(&self, _: Submission) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("history offline".to_string()))
    }

    fn sequences(&self, _: Option<KcId>) -> Result<Vec<ObservationSequence>, StoreError> {
        Err(StoreError::Unavailable("history offline".to_string()))
    }

    fn count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("history offline".to_string()))
    }
}

pub fn create_failing_context() -> AppContext {
    let store = Arc::new(FailingStore);
    AppContext::new(Config::default(), store.clone(), store)
}

/// `MemoryStore` whose writes can be switched off one side at a time
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_save: AtomicBool,
    pub fail_append: AtomicBool,
}

impl FlakyStore {
    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }
}

impl MasteryRepository for FlakyStore {
    fn load(&self, learner_id: LearnerId, kc_id: KcId) -> Result<Option<MasteryRecord>, StoreError> {
        self.inner.load(learner_id, kc_id)
    }

    fn save(&self, record: &MasteryRecord) -> Result<(), StoreError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mastery write rejected".to_string()));
        }
        self.inner.save(record)
    }

    fn delete(&self, learner_id: LearnerId, kc_id: KcId) -> Result<(), StoreError> {
        self.inner.delete(learner_id, kc_id)
    }

    fn list_for_learner(&self, learner_id: LearnerId) -> Result<Vec<MasteryRecord>, StoreError> {
        self.inner.list_for_learner(learner_id)
    }
}

impl SubmissionHistory for FlakyStore {
    fn append(&self, submission: Submission) -> Result<(), StoreError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("history write rejected".to_string()));
        }
        self.inner.append(submission)
    }

    fn sequences(&self, kc_id: Option<KcId>) -> Result<Vec<ObservationSequence>, StoreError> {
        self.inner.sequences(kc_id)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }
}

pub fn create_flaky_context() -> (AppContext, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let ctx = AppContext::new(Config::default(), store.clone(), store.clone());
    (ctx, store)
}
