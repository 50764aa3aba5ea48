use tracing::trace;

use crate::record::Row;

/// Admits rows that carry at least one identity field; counts the rest.
#[derive(Debug, Default)]
pub struct RecordFilter {
    admitted: usize,
    dropped: usize,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit<R: Row>(&mut self, row: &R) -> bool {
        if row.has_identity() {
            self.admitted += 1;
            true
        } else {
            self.dropped += 1;
            trace!(dropped = self.dropped, "record without identity fields skipped");
            false
        }
    }

    pub fn admitted(&self) -> usize {
        self.admitted
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
