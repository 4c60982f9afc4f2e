use std::collections::{BTreeMap, HashMap};

use bkt_algo::{KcId, LearnerId, ObservationSequence};
use parking_lot::RwLock;

use super::{MasteryRecord, MasteryRepository, StoreError, Submission, SubmissionHistory};

/// In-process store backing both repositories
#[derive(Default)]
pub struct MemoryStore {
    mastery: RwLock<HashMap<(LearnerId, KcId), MasteryRecord>>,
    submissions: RwLock<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mastery_len(&self) -> usize {
        self.mastery.read().len()
    }
}

impl MasteryRepository for MemoryStore {
    fn load(&self, learner_id: LearnerId, kc_id: KcId) -> Result<Option<MasteryRecord>, StoreError> {
        Ok(self.mastery.read().get(&(learner_id, kc_id)).cloned())
    }

    fn save(&self, record: &MasteryRecord) -> Result<(), StoreError> {
        self.mastery
            .write()
            .insert((record.learner_id(), record.kc_id()), record.clone());
        Ok(())
    }

    fn delete(&self, learner_id: LearnerId, kc_id: KcId) -> Result<(), StoreError> {
        self.mastery.write().remove(&(learner_id, kc_id));
        Ok(())
    }

    fn list_for_learner(&self, learner_id: LearnerId) -> Result<Vec<MasteryRecord>, StoreError> {
        let guard = self.mastery.read();
        let mut records: Vec<MasteryRecord> = guard
            .values()
            .filter(|r| r.learner_id() == learner_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.kc_id());
        Ok(records)
    }
}

impl SubmissionHistory for MemoryStore {
    fn append(&self, submission: Submission) -> Result<(), StoreError> {
        self.submissions.write().push(submission);
        Ok(())
    }

    fn sequences(&self, kc_id: Option<KcId>) -> Result<Vec<ObservationSequence>, StoreError> {
        let guard = self.submissions.read();

        let mut grouped: BTreeMap<(LearnerId, KcId), Vec<&Submission>> = BTreeMap::new();
        for submission in guard.iter() {
            if kc_id.is_some_and(|kc| kc != submission.kc_id) {
                continue;
            }
            grouped
                .entry((submission.learner_id, submission.kc_id))
                .or_default()
                .push(submission);
        }

        Ok(grouped
            .into_values()
            .map(|mut rows| {
                // stable: equal timestamps keep append order
                rows.sort_by_key(|s| s.created_at);
                rows.into_iter().map(|s| s.is_correct).collect()
            })
            .collect())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.submissions.read().len())
    }
}
