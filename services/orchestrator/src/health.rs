//! Component health triple reported in every dashboard snapshot.

use std::sync::atomic::{AtomicBool, Ordering};

/// One boolean per component, each with a single writing subsystem:
/// the scheduler reports registry reachability, store accessors report
/// database health, and the serving loop owns the orchestrator bit.
pub struct ServiceHealth {
    orchestrator: AtomicBool,
    database: AtomicBool,
    registry: AtomicBool,
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self {
            orchestrator: AtomicBool::new(true),
            database: AtomicBool::new(true),
            registry: AtomicBool::new(true),
        }
    }
}

impl ServiceHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_orchestrator(&self, up: bool) {
        self.orchestrator.store(up, Ordering::Relaxed);
    }

    pub fn set_database(&self, up: bool) {
        self.database.store(up, Ordering::Relaxed);
    }

    pub fn set_registry(&self, up: bool) {
        self.registry.store(up, Ordering::Relaxed);
    }

    /// `(orchestrator, database, registry)`
    pub fn snapshot(&self) -> (bool, bool, bool) {
        (
            self.orchestrator.load(Ordering::Relaxed),
            self.database.load(Ordering::Relaxed),
            self.registry.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_all_up_and_tracks_reports() {
        let health = ServiceHealth::new();
        assert_eq!(health.snapshot(), (true, true, true));

        health.set_registry(false);
        assert_eq!(health.snapshot(), (true, true, false));

        health.set_registry(true);
        health.set_database(false);
        assert_eq!(health.snapshot(), (true, false, true));
    }
}
