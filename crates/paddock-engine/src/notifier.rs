//! Best-effort expiry alerts.
//!
//! The [`Notifier`] is the engine's only path to the outside world when a
//! rental's paid time lapses. It owns the permission state explicitly and
//! never reports failure to the engine: a denied permission, an unsupported
//! platform or a failed delivery is logged and the lifecycle carries on.

use std::{
    process::{Command, Stdio},
    thread,
};

use paddock_core::Unit;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Alert permission as granted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Not asked yet
    Unknown,
    /// Alerts may be delivered
    Granted,
    /// Denied by the user, or alerts are unsupported
    Denied,
}

/// Why a sink could not deliver an alert.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The platform has no alert mechanism
    #[error("notifications are not supported on this platform")]
    Unsupported,

    /// The sink refused delivery
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Content of the alert sent when a unit's paid time lapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryAlert {
    /// Alert title
    pub title: String,
    /// Alert body naming the kart
    pub body: String,
    /// Per-unit tag; a newer alert for the same unit replaces the older one
    pub tag: String,
}

impl ExpiryAlert {
    /// Alert for `unit`.
    pub fn for_unit(unit: &Unit) -> Self {
        Self {
            title: "Time is up!".to_owned(),
            body: format!(
                "Kart \"{}\" ({}) has finished its session.",
                unit.display_name(),
                unit.category()
            ),
            tag: format!("kart-timer-{}", unit.id()),
        }
    }
}

/// Platform alert mechanism.
///
/// Implementations must return promptly; `deliver` runs inline with a
/// lifecycle transition.
pub trait NotificationSink: Send + Sync + 'static {
    /// Permission the platform currently reports, without prompting.
    fn current_permission(&self) -> Permission;

    /// Prompt for permission and return the answer.
    fn request_permission(&self) -> Permission;

    /// Deliver one alert.
    fn deliver(&self, alert: &ExpiryAlert) -> Result<(), NotifyError>;
}

/// Permission-aware wrapper around a [`NotificationSink`].
pub struct Notifier<S: NotificationSink> {
    sink: S,
    permission: Permission,
}

impl<S: NotificationSink> Notifier<S> {
    /// Wrap `sink`, adopting whatever permission it already reports.
    pub fn new(sink: S) -> Self {
        let permission = sink.current_permission();
        Self { sink, permission }
    }

    /// Permission as last observed.
    pub fn permission(&self) -> Permission {
        self.permission
    }

    /// Underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Ask for permission once, while it is still unknown.
    ///
    /// The engine calls this when a rental starts, so the prompt appears
    /// while an operator is at the console rather than at expiry.
    pub fn prepare(&mut self) -> Permission {
        if self.permission == Permission::Unknown {
            self.permission = self.sink.request_permission();
            debug!(permission = ?self.permission, "Notification permission requested");
        }
        self.permission
    }

    /// Alert that `unit`'s paid time has lapsed. Never fails.
    pub fn notify(&mut self, unit: &Unit) {
        match self.prepare() {
            Permission::Granted => {},
            Permission::Unknown | Permission::Denied => {
                debug!(unit_id = %unit.id(), "Notifications not permitted, skipping alert");
                return;
            },
        }

        let alert = ExpiryAlert::for_unit(unit);
        if let Err(err) = self.sink.deliver(&alert) {
            warn!(unit_id = %unit.id(), error = %err, "Failed to deliver expiry alert");
        }
    }
}

/// Sink that writes alerts to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn current_permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn deliver(&self, alert: &ExpiryAlert) -> Result<(), NotifyError> {
        info!(tag = %alert.tag, "{}: {}", alert.title, alert.body);
        Ok(())
    }
}

/// Sink for platforms without an alert mechanism.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn current_permission(&self) -> Permission {
        Permission::Denied
    }

    fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    fn deliver(&self, _alert: &ExpiryAlert) -> Result<(), NotifyError> {
        Err(NotifyError::Unsupported)
    }
}

/// Sink that runs an external program for each alert.
///
/// The program receives the title and body as its two arguments, e.g.
/// `notify-send`. It is spawned detached; its exit status is only logged.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
}

impl CommandSink {
    /// Sink running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl NotificationSink for CommandSink {
    fn current_permission(&self) -> Permission {
        Permission::Granted
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn deliver(&self, alert: &ExpiryAlert) -> Result<(), NotifyError> {
        let mut child = Command::new(&self.program)
            .arg(&alert.title)
            .arg(&alert.body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| NotifyError::Delivery(format!("{}: {e}", self.program)))?;

        let program = self.program.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) if status.success() => {},
            Ok(status) => warn!(%program, %status, "Alert command exited unsuccessfully"),
            Err(err) => warn!(%program, error = %err, "Failed to wait for alert command"),
        });

        Ok(())
    }
}
