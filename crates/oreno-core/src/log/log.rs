use super::record::TurnRecord;
use crate::error::LogError;

/// Append-only, chronologically ordered sequence of turn records.
///
/// The log itself is not synchronized; the controller keeps it behind the
/// same `RwLock` as its running flag.
#[derive(Debug, Clone, Default)]
pub struct InteractionLog {
    records: Vec<TurnRecord>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TurnRecord) {
        self.records.push(record);
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn at(&self, index: usize) -> Result<TurnRecord, LogError> {
        self.records
            .get(index)
            .cloned()
            .ok_or(LogError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })
    }

    /// Drop everything from `new_len` on. Only used by view mirrors that
    /// observed the source log shrink; the controller never calls it.
    pub fn truncate(&mut self, new_len: usize) {
        self.records.truncate(new_len);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TurnRecord> {
        self.records.iter()
    }
}
