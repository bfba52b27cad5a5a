//! Hand-off of baked tables to the executing side.
//!
//! A triple buffer carries the latest `Arc<PassTable>`; the reader always
//! sees either the previous table or the new one in full, never a table
//! being built. Failed bakes publish nothing.

use std::sync::Arc;

use super::pass_table::PassTable;

type Slot = Option<Arc<PassTable>>;

/// Create a connected publisher/reader pair with nothing published.
#[must_use]
pub fn schedule_channel() -> (SchedulePublisher, ScheduleReader) {
    let (input, output) = triple_buffer::triple_buffer(&None);
    (
        SchedulePublisher {
            input,
            current: None,
        },
        ScheduleReader { output },
    )
}

/// Baking side of the schedule.
pub struct SchedulePublisher {
    input: triple_buffer::Input<Slot>,
    current: Slot,
}

impl SchedulePublisher {
    /// Make `table` the schedule every later read observes.
    pub fn publish(&mut self, table: PassTable) -> Arc<PassTable> {
        let table = Arc::new(table);
        self.current = Some(Arc::clone(&table));
        self.input.write(Some(Arc::clone(&table)));
        table
    }

    /// Withdraw the schedule; readers see nothing until the next publish.
    pub fn retract(&mut self) {
        self.current = None;
        self.input.write(None);
    }

    /// The most recently published table.
    #[must_use]
    pub const fn current(&self) -> Option<&Arc<PassTable>> {
        self.current.as_ref()
    }
}

/// Executing side of the schedule.
pub struct ScheduleReader {
    output: triple_buffer::Output<Slot>,
}

impl ScheduleReader {
    /// The latest published table, if any.
    pub fn latest(&mut self) -> Option<&PassTable> {
        self.output.read().as_deref()
    }

    /// Whether a publish happened since the last read.
    #[must_use]
    pub fn has_update(&self) -> bool {
        self.output.updated()
    }
}

impl std::fmt::Debug for SchedulePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulePublisher")
            .field("generation", &self.current.as_ref().map(|t| t.generation))
            .finish()
    }
}

impl std::fmt::Debug for ScheduleReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleReader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(generation: u64) -> PassTable {
        PassTable {
            generation,
            ..PassTable::default()
        }
    }

    #[test]
    fn reader_sees_latest_publish() {
        let (mut publisher, mut reader) = schedule_channel();
        assert!(reader.latest().is_none());

        let _ = publisher.publish(table(1));
        let _ = publisher.publish(table(2));
        assert!(reader.has_update());
        assert_eq!(reader.latest().map(|t| t.generation), Some(2));
        assert!(!reader.has_update());
        assert_eq!(publisher.current().map(|t| t.generation), Some(2));
    }

    #[test]
    fn retract_clears_both_sides() {
        let (mut publisher, mut reader) = schedule_channel();
        let _ = publisher.publish(table(1));
        assert!(reader.latest().is_some());
        publisher.retract();
        assert!(reader.latest().is_none());
        assert!(publisher.current().is_none());
    }

    #[test]
    fn reader_can_live_on_another_thread() {
        let (mut publisher, mut reader) = schedule_channel();
        let _ = publisher.publish(table(7));
        let generation = std::thread::spawn(move || {
            reader.latest().map(|t| t.generation)
        })
        .join()
        .unwrap();
        assert_eq!(generation, Some(7));
    }
}
