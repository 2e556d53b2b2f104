use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn name(&self) -> String {
        match self {
            Self::Success => "success".into(),
            Self::Error => "error".into(),
            Self::Warning => "warning".into(),
            Self::Info => "info".into(),
        }
    }

    pub fn default_dismiss_ms(&self) -> u64 {
        match self {
            Self::Success => 4000,
            Self::Error => 5000,
            Self::Warning => 4000,
            Self::Info => 3000,
        }
    }
}

/// Fire-and-forget user messaging; the engine never inspects the outcome.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str, auto_dismiss_ms: u64);

    fn success(&self, message: &str) {
        self.notify(
            Severity::Success,
            message,
            Severity::Success.default_dismiss_ms(),
        );
    }

    fn error(&self, message: &str) {
        self.notify(
            Severity::Error,
            message,
            Severity::Error.default_dismiss_ms(),
        );
    }

    fn warning(&self, message: &str) {
        self.notify(
            Severity::Warning,
            message,
            Severity::Warning.default_dismiss_ms(),
        );
    }

    fn info(&self, message: &str) {
        self.notify(Severity::Info, message, Severity::Info.default_dismiss_ms());
    }
}

/// Routes notifications into the log stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, message: &str, auto_dismiss_ms: u64) {
        match severity {
            Severity::Error => tracing::error!(auto_dismiss_ms, "{}", message),
            Severity::Warning => tracing::warn!(auto_dismiss_ms, "{}", message),
            _ => tracing::info!(auto_dismiss_ms, "{}", message),
        }
    }
}

#[test]
fn test_default_dismiss_durations() {
    assert_eq!(Severity::Success.default_dismiss_ms(), 4000);
    assert_eq!(Severity::Error.default_dismiss_ms(), 5000);
    assert_eq!(Severity::Warning.default_dismiss_ms(), 4000);
    assert_eq!(Severity::Info.default_dismiss_ms(), 3000);
}

#[test]
fn test_convenience_methods_tag_severity() {
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Severity, String, u64)>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, severity: Severity, message: &str, auto_dismiss_ms: u64) {
            self.seen
                .lock()
                .unwrap()
                .push((severity, message.to_string(), auto_dismiss_ms));
        }
    }

    let recorder = Recorder::default();
    recorder.success("booked");
    recorder.error("failed");
    recorder.info("loaded");

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen[0], (Severity::Success, "booked".to_string(), 4000));
    assert_eq!(seen[1], (Severity::Error, "failed".to_string(), 5000));
    assert_eq!(seen[2], (Severity::Info, "loaded".to_string(), 3000));
}
