//! Soft-delete convention: a record with `deleted_utc` set stays in storage
//! but is invisible to every read and write path.

use chrono::{DateTime, Utc};

/// SQL predicate appended to every read of a soft-deletable table.
pub const NOT_DELETED: &str = "deleted_utc IS NULL";

pub trait SoftDeletable {
    fn deleted_utc(&self) -> Option<DateTime<Utc>>;

    fn mark_deleted(&mut self, at: DateTime<Utc>);

    fn is_deleted(&self) -> bool {
        self.deleted_utc().is_some()
    }
}

/// Drop a record that has been soft-deleted.
pub fn live<T: SoftDeletable>(record: Option<T>) -> Option<T> {
    record.filter(|r| !r.is_deleted())
}
