pub mod memory;

use bkt_algo::{KcId, LearnerId, MasteryEstimate, ObservationSequence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One graded answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub learner_id: LearnerId,
    pub kc_id: KcId,
    pub is_correct: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Persisted mastery row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    #[serde(flatten)]
    pub estimate: MasteryEstimate,
    /// Model generation whose parameters this pair was created with
    pub generation: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasteryRecord {
    pub fn learner_id(&self) -> LearnerId {
        self.estimate.learner_id
    }

    pub fn kc_id(&self) -> KcId {
        self.estimate.kc_id
    }
}

pub trait MasteryRepository: Send + Sync {
    fn load(&self, learner_id: LearnerId, kc_id: KcId) -> Result<Option<MasteryRecord>, StoreError>;

    /// Insert or replace the row for the record's pair
    fn save(&self, record: &MasteryRecord) -> Result<(), StoreError>;

    fn delete(&self, learner_id: LearnerId, kc_id: KcId) -> Result<(), StoreError>;

    /// All rows of one learner, ordered by KC id
    fn list_for_learner(&self, learner_id: LearnerId) -> Result<Vec<MasteryRecord>, StoreError>;
}

pub trait SubmissionHistory: Send + Sync {
    fn append(&self, submission: Submission) -> Result<(), StoreError>;

    /// One sequence per (learner, KC) pair in chronological order.
    /// `kc_id = None` returns every KC.
    fn sequences(&self, kc_id: Option<KcId>) -> Result<Vec<ObservationSequence>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}
