//! Operations that always succeed for their caller

use crate::types::Error;

/// Result of a best-effort operation
///
/// The caller always gets `value`. Anything that went wrong along the way is
/// kept in `failures` (and has already been logged) but is not an error.
#[derive(Debug)]
#[must_use]
pub struct BestEffort<T> {
    value: T,
    failures: Vec<Error>,
}

impl<T> BestEffort<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            failures: Vec::new(),
        }
    }

    /// Record a swallowed failure
    pub fn record(&mut self, failure: Error) {
        self.failures.push(failure);
    }

    /// Whether every step succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
