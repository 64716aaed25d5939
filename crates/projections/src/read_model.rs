//! Read model trait for query-side views.

/// A read model that can report its size, for health reporting.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries. Reports 0 while a writer holds the lock.
    fn count(&self) -> usize;
}
