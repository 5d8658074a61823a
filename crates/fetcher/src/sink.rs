//! Output sinks for the two result streams.

use std::sync::Mutex;

use trawl_core::{FetchedDatum, StatusDatum};

/// Downstream taps for fetched content and per-URL status.
///
/// Implementations must tolerate concurrent emits from fetch workers.
pub trait Sink: Send + Sync {
    fn emit_fetched(&self, datum: FetchedDatum);
    fn emit_status(&self, datum: StatusDatum);
}

/// In-memory sink for tests and small batch runs.
#[derive(Default)]
pub struct CollectingSink {
    fetched: Mutex<Vec<FetchedDatum>>,
    statuses: Mutex<Vec<StatusDatum>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetched(&self) -> Vec<FetchedDatum> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<StatusDatum> {
        self.statuses.lock().unwrap().clone()
    }
}

impl Sink for CollectingSink {
    fn emit_fetched(&self, datum: FetchedDatum) {
        self.fetched.lock().unwrap().push(datum);
    }

    fn emit_status(&self, datum: StatusDatum) {
        self.statuses.lock().unwrap().push(datum);
    }
}
