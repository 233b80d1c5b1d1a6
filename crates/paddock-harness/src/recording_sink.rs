//! Notification sink that records alerts for assertions.

#![allow(clippy::disallowed_types, reason = "Synchronous test bookkeeping")]

use std::sync::{Arc, Mutex};

use paddock_engine::{ExpiryAlert, NotificationSink, NotifyError, Permission};

#[derive(Debug)]
struct Recorded {
    alerts: Vec<ExpiryAlert>,
    permission_requests: usize,
}

/// Sink that keeps every delivered alert.
///
/// Clones share the recording, so a test keeps one handle while the engine
/// owns another.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    initial: Permission,
    answer: Permission,
    fail_delivery: bool,
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    /// Sink that grants permission when asked.
    pub fn new() -> Self {
        Self::with_permission(Permission::Unknown, Permission::Granted)
    }

    /// Sink reporting `initial` permission and answering `answer` when asked.
    pub fn with_permission(initial: Permission, answer: Permission) -> Self {
        Self {
            initial,
            answer,
            fail_delivery: false,
            recorded: Arc::new(Mutex::new(Recorded { alerts: Vec::new(), permission_requests: 0 })),
        }
    }

    /// Sink that is permitted but fails every delivery.
    pub fn failing() -> Self {
        Self { fail_delivery: true, ..Self::new() }
    }

    /// Alerts handed to the sink so far, including failed deliveries.
    #[allow(clippy::expect_used)]
    pub fn alerts(&self) -> Vec<ExpiryAlert> {
        self.recorded.lock().expect("Mutex poisoned").alerts.clone()
    }

    /// Number of alerts handed to the sink so far.
    pub fn alert_count(&self) -> usize {
        self.alerts().len()
    }

    /// How often permission was requested.
    #[allow(clippy::expect_used)]
    pub fn permission_requests(&self) -> usize {
        self.recorded.lock().expect("Mutex poisoned").permission_requests
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for RecordingSink {
    fn current_permission(&self) -> Permission {
        self.initial
    }

    #[allow(clippy::expect_used)]
    fn request_permission(&self) -> Permission {
        self.recorded.lock().expect("Mutex poisoned").permission_requests += 1;
        self.answer
    }

    #[allow(clippy::expect_used)]
    fn deliver(&self, alert: &ExpiryAlert) -> Result<(), NotifyError> {
        let mut recorded = self.recorded.lock().expect("Mutex poisoned");
        recorded.alerts.push(alert.clone());
        if self.fail_delivery {
            return Err(NotifyError::Delivery("recording sink set to fail".to_owned()));
        }
        Ok(())
    }
}
