mod history_api;
mod ride_api;

use std::sync::Arc;

use crate::{
    api::API,
    clock::Clock,
    config::Config,
    error::Error,
    history::BookingLedger,
    notify::Notifier,
    registry::RideRegistry,
    store::Store,
};

/// Orchestration facade over the registry and the ledger. Validates input
/// before it reaches the registry and reports every outcome to the notifier.
pub struct Engine {
    registry: RideRegistry,
    ledger: Arc<BookingLedger>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, Error> {
        let ledger = Arc::new(BookingLedger::new(store.clone(), clock.clone())?);
        let registry = RideRegistry::new(store, clock, ledger.clone(), config.buffer_minutes)?;

        Ok(Self {
            registry,
            ledger,
            notifier,
        })
    }
}

impl API for Engine {}

#[cfg(test)]
pub(crate) mod testkit {
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};

    use super::Engine;
    use crate::clock::FixedClock;
    use crate::config::Config;
    use crate::notify::{Notifier, Severity};
    use crate::store::MemoryStore;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub seen: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingNotifier {
        pub fn last(&self) -> Option<(Severity, String)> {
            self.seen.lock().unwrap().last().cloned()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, severity: Severity, message: &str, _auto_dismiss_ms: u64) {
            self.seen
                .lock()
                .unwrap()
                .push((severity, message.to_string()));
        }
    }

    pub fn engine() -> (Engine, Arc<FixedClock>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(RecordingNotifier::default());

        let engine = Engine::new(Config::default(), store, clock.clone(), notifier.clone())
            .unwrap();

        (engine, clock, notifier)
    }
}

#[test]
fn test_engine_is_object_safe() {
    use std::sync::Arc;

    use crate::api::DynAPI;

    let (engine, _, _) = testkit::engine();
    let api: DynAPI = Arc::new(engine);

    assert!(api.rides().borrow().is_empty());
    assert!(api.history().borrow().is_empty());
}
