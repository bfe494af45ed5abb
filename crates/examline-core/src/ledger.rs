//! In-memory answer store.
//!
//! The ledger is the single source of truth for what gets submitted. It holds
//! at most one choice per question and stops accepting writes once frozen.

use std::collections::HashMap;

use crate::ids::EntityId;
use crate::model::AnswerEntry;

#[derive(Debug, Clone, Default)]
pub struct AnswerLedger {
    /// Question order used for snapshots.
    order: Vec<EntityId>,
    answers: HashMap<EntityId, EntityId>,
    frozen: bool,
}

impl AnswerLedger {
    pub fn new(order: Vec<EntityId>) -> Self {
        Self {
            order,
            answers: HashMap::new(),
            frozen: false,
        }
    }

    /// Store `choice_id` for `question_id`, replacing any earlier choice.
    ///
    /// Returns `false` without touching the ledger once it is frozen.
    pub fn record(&mut self, question_id: EntityId, choice_id: EntityId) -> bool {
        if self.frozen {
            tracing::debug!(%question_id, "ledger frozen, ignoring answer");
            return false;
        }
        self.answers.insert(question_id, choice_id);
        true
    }

    pub fn get(&self, question_id: &EntityId) -> Option<&EntityId> {
        self.answers.get(question_id)
    }

    /// Number of distinct answered questions.
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Share of questions answered, 0..=100, for progress displays.
    pub fn completion_percent(&self) -> u32 {
        if self.order.is_empty() {
            return 0;
        }
        ((self.answers.len() as f64 / self.order.len() as f64) * 100.0).round() as u32
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stop accepting writes and return the snapshot to submit.
    pub fn freeze(&mut self) -> Vec<AnswerEntry> {
        self.frozen = true;
        self.snapshot()
    }

    /// Current answers in question order.
    ///
    /// Answers to ids missing from the order list are appended after the
    /// ordered ones so nothing recorded is ever dropped.
    pub fn snapshot(&self) -> Vec<AnswerEntry> {
        let mut entries: Vec<AnswerEntry> = self
            .order
            .iter()
            .filter_map(|q| {
                self.answers.get(q).map(|c| AnswerEntry {
                    question_id: q.clone(),
                    choice_id: c.clone(),
                })
            })
            .collect();

        if entries.len() < self.answers.len() {
            let mut extra: Vec<AnswerEntry> = self
                .answers
                .iter()
                .filter(|(q, _)| !self.order.contains(q))
                .map(|(q, c)| AnswerEntry {
                    question_id: q.clone(),
                    choice_id: c.clone(),
                })
                .collect();
            extra.sort_by(|a, b| a.question_id.key().cmp(&b.question_id.key()));
            entries.extend(extra);
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().map(|&i| EntityId::from(i)).collect()
    }

    #[test]
    fn later_record_overwrites_earlier() {
        let mut ledger = AnswerLedger::new(ids(&[1, 2]));
        assert!(ledger.record(1.into(), 10.into()));
        assert!(ledger.record(1.into(), 11.into()));

        assert_eq!(ledger.answered_count(), 1);
        assert_eq!(ledger.get(&1.into()), Some(&EntityId::from(11)));
        assert_eq!(ledger.get(&2.into()), None);
    }

    #[test]
    fn frozen_ledger_ignores_writes() {
        let mut ledger = AnswerLedger::new(ids(&[1, 2]));
        ledger.record(1.into(), 10.into());
        let snapshot = ledger.freeze();

        assert!(!ledger.record(1.into(), 11.into()));
        assert!(!ledger.record(2.into(), 20.into()));
        assert!(ledger.is_frozen());
        assert_eq!(ledger.snapshot(), snapshot);
        assert_eq!(ledger.get(&1.into()), Some(&EntityId::from(10)));
    }

    #[test]
    fn snapshot_follows_question_order() {
        let mut ledger = AnswerLedger::new(ids(&[3, 1, 2]));
        ledger.record(2.into(), 20.into());
        ledger.record(3.into(), 30.into());
        ledger.record(1.into(), 10.into());

        let order: Vec<EntityId> = ledger.snapshot().into_iter().map(|e| e.question_id).collect();
        assert_eq!(order, ids(&[3, 1, 2]));
    }

    #[test]
    fn completion_percent_rounds() {
        let mut ledger = AnswerLedger::new(ids(&[1, 2, 3]));
        assert_eq!(ledger.completion_percent(), 0);
        ledger.record(1.into(), 10.into());
        assert_eq!(ledger.completion_percent(), 33);
        ledger.record(2.into(), 20.into());
        assert_eq!(ledger.completion_percent(), 67);
    }
}
