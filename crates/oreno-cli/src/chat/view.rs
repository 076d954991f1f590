use oreno_core::{InteractionLog, Transcript, TurnRecord};

/// What changed in the transcript since the previous poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ViewUpdate {
    /// The source shrank below what was already shown; the mirror now ends at `len`.
    Truncated { len: usize },
    Appended { index: usize, record: TurnRecord },
    /// A record already shown no longer matches its snapshot.
    Changed { index: usize, record: TurnRecord },
}

/// Snapshot mirror of a [`Transcript`], diffed once per frame so only new or
/// changed records get rendered.
pub(super) struct TranscriptView {
    mirror: InteractionLog,
}

impl TranscriptView {
    pub(super) fn new() -> Self {
        Self {
            mirror: InteractionLog::new(),
        }
    }

    /// Diff `source` against the mirror. Only records past the mirror are
    /// read, plus the last one shown; a full rescan happens only when that
    /// record no longer matches.
    pub(super) fn sync(&mut self, source: &impl Transcript) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        let count = source.turn_count();

        if count < self.mirror.count() {
            self.mirror.truncate(count);
            updates.push(ViewUpdate::Truncated { len: count });
        }

        let shown = self.mirror.count();
        let from = match shown.checked_sub(1) {
            Some(last) if !self.matches(source, last) => 0,
            _ => shown,
        };

        for index in from..count {
            // Each read takes the source lock on its own; a failed read means
            // the source moved under us, so pick it up next frame.
            let Ok(record) = source.turn_at(index) else {
                break;
            };
            if index < self.mirror.count() {
                if self.mirror.at(index).ok().as_ref() == Some(&record) {
                    continue;
                }
                // The mirror is append-only: rebuild from the first mismatch.
                self.mirror.truncate(index);
            }
            self.mirror.append(record.clone());
            let update = if index < shown {
                ViewUpdate::Changed { index, record }
            } else {
                ViewUpdate::Appended { index, record }
            };
            updates.push(update);
        }
        updates
    }

    fn matches(&self, source: &impl Transcript, index: usize) -> bool {
        match (source.turn_at(index), self.mirror.at(index)) {
            (Ok(theirs), Ok(ours)) => theirs == ours,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oreno_core::LogError;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeTranscript {
        records: RefCell<Vec<TurnRecord>>,
        reads: Cell<usize>,
    }

    impl FakeTranscript {
        fn push(&self, record: TurnRecord) {
            self.records.borrow_mut().push(record);
        }
    }

    impl Transcript for FakeTranscript {
        fn turn_count(&self) -> usize {
            self.records.borrow().len()
        }

        fn turn_at(&self, index: usize) -> Result<TurnRecord, LogError> {
            self.reads.set(self.reads.get() + 1);
            let records = self.records.borrow();
            records.get(index).cloned().ok_or(LogError::IndexOutOfRange {
                index,
                len: records.len(),
            })
        }
    }

    #[test]
    fn reports_only_new_records() {
        let source = FakeTranscript::default();
        let mut view = TranscriptView::new();
        assert!(view.sync(&source).is_empty());

        source.push(TurnRecord::prompt("hi"));
        source.push(TurnRecord::message("he"));
        assert_eq!(
            view.sync(&source),
            vec![
                ViewUpdate::Appended { index: 0, record: TurnRecord::prompt("hi") },
                ViewUpdate::Appended { index: 1, record: TurnRecord::message("he") },
            ]
        );
        assert!(view.sync(&source).is_empty());

        source.push(TurnRecord::message("llo"));
        assert_eq!(
            view.sync(&source),
            vec![ViewUpdate::Appended { index: 2, record: TurnRecord::message("llo") }]
        );
    }

    #[test]
    fn shrinking_source_truncates_the_mirror() {
        let source = FakeTranscript::default();
        let mut view = TranscriptView::new();
        source.push(TurnRecord::prompt("a"));
        source.push(TurnRecord::message("b"));
        view.sync(&source);

        source.records.borrow_mut().truncate(1);
        assert_eq!(view.sync(&source), vec![ViewUpdate::Truncated { len: 1 }]);

        source.push(TurnRecord::message("c"));
        assert_eq!(
            view.sync(&source),
            vec![ViewUpdate::Appended { index: 1, record: TurnRecord::message("c") }]
        );
    }

    #[test]
    fn replaced_record_is_reported_as_changed() {
        let source = FakeTranscript::default();
        let mut view = TranscriptView::new();
        source.push(TurnRecord::prompt("a"));
        source.push(TurnRecord::message("b"));
        source.push(TurnRecord::message("c"));
        view.sync(&source);

        {
            let mut records = source.records.borrow_mut();
            records[1] = TurnRecord::error("x");
            records[2] = TurnRecord::error("y");
        }
        assert_eq!(
            view.sync(&source),
            vec![
                ViewUpdate::Changed { index: 1, record: TurnRecord::error("x") },
                ViewUpdate::Changed { index: 2, record: TurnRecord::error("y") },
            ]
        );
        assert!(view.sync(&source).is_empty());
    }

    #[test]
    fn steady_frames_read_only_the_tail() {
        let source = FakeTranscript::default();
        let mut view = TranscriptView::new();
        for i in 0..50 {
            source.push(TurnRecord::message(i.to_string()));
        }
        view.sync(&source);

        source.reads.set(0);
        assert!(view.sync(&source).is_empty());
        assert_eq!(source.reads.get(), 1);

        source.reads.set(0);
        source.push(TurnRecord::message("new"));
        assert_eq!(view.sync(&source).len(), 1);
        assert_eq!(source.reads.get(), 2);
    }
}
