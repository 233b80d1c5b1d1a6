//! Per-unit rental state machine.
//!
//! ```text
//!              start                   now >= paid_until
//! available ──────────▶ rented ──────────────────────▶ expired_unconfirmed
//!     ▲                   │                              │          │
//!     │   early_return    │        confirm_return(true)  │          │ confirm_return(false)
//!     ├───────────────────┘◀─────────────────────────────┘          ▼
//!     │                          stop_overtime                    overdue
//!     └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is single-unit, validates before mutating, and bumps the
//! unit's generation so timer tokens issued for the previous state go stale.
//! Closing transitions return the [`SessionRecord`] to append to history.
//! `force_reset` is the administrative escape hatch and writes no record.

use crate::{
    clock::Timestamp,
    error::{Operation, TransitionError},
    history::SessionRecord,
    unit::{Phase, Session, Unit, UnitStatus},
};

const MINUTE_MS: u64 = 60_000;

/// Milliseconds rounded to the nearest whole minute, halves rounding up.
pub const fn billed_minutes(elapsed_ms: u64) -> u64 {
    elapsed_ms.saturating_add(MINUTE_MS / 2) / MINUTE_MS
}

fn clamp_minutes(minutes: u64) -> u32 {
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

impl Unit {
    fn invalid(&self, operation: Operation) -> TransitionError {
        TransitionError::InvalidTransition {
            unit_id: self.id().clone(),
            status: self.status(),
            operation,
        }
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn record(&self, session: &Session, now: Timestamp, duration_minutes: u32) -> SessionRecord {
        SessionRecord {
            unit_id: self.id().clone(),
            display_name: self.display_name().to_owned(),
            category: self.category().to_owned(),
            started_at: session.started_at,
            ended_at: now,
            duration_minutes,
            price_paid: session.price,
        }
    }

    /// `available → rented`.
    ///
    /// Pays for `duration_minutes` starting at `now`.
    pub fn start(
        &mut self,
        now: Timestamp,
        duration_minutes: u32,
        price: u32,
    ) -> Result<(), TransitionError> {
        if self.session.is_some() {
            return Err(self.invalid(Operation::StartRental));
        }
        if duration_minutes == 0 {
            return Err(TransitionError::InvalidDuration { unit_id: self.id().clone() });
        }

        self.session = Some(Session {
            started_at: now,
            duration_minutes,
            price,
            phase: Phase::Rented { paid_until: now.plus_minutes(duration_minutes) },
        });
        self.bump();
        Ok(())
    }

    /// `rented → expired_unconfirmed` once `now >= paid_until`.
    ///
    /// Returns `true` only when this call performed the transition. Calling
    /// it again on an expired unit, or on any other state, is a no-op.
    pub fn expire_if_due(&mut self, now: Timestamp) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Phase::Rented { paid_until } = session.phase else {
            return false;
        };
        if now < paid_until {
            return false;
        }

        session.phase = Phase::ExpiredUnconfirmed { paid_until };
        self.bump();
        true
    }

    /// `expired_unconfirmed → available` (returned) or `→ overdue`.
    ///
    /// A confirmed return closes the session billed for the full paid
    /// duration. A declined return starts overtime from `paid_until`, not from
    /// `now`, so time the prompt sat unanswered still counts as overtime.
    pub fn confirm_return(
        &mut self,
        now: Timestamp,
        returned: bool,
    ) -> Result<Option<SessionRecord>, TransitionError> {
        let Some(session) = self.session else {
            return Err(self.invalid(Operation::ConfirmReturn));
        };
        let Phase::ExpiredUnconfirmed { paid_until } = session.phase else {
            return Err(self.invalid(Operation::ConfirmReturn));
        };

        if returned {
            let record = self.record(&session, now, session.duration_minutes);
            self.session = None;
            self.bump();
            return Ok(Some(record));
        }

        self.session = Some(Session { phase: Phase::Overdue { overdue_since: paid_until }, ..session });
        self.bump();
        Ok(None)
    }

    /// `rented → available` before paid time lapses.
    ///
    /// Billed for the rounded minutes actually used, at least one, at the
    /// price chosen at rental start.
    pub fn early_return(&mut self, now: Timestamp) -> Result<SessionRecord, TransitionError> {
        let Some(session) = self.session else {
            return Err(self.invalid(Operation::EarlyReturn));
        };
        if !matches!(session.phase, Phase::Rented { .. }) {
            return Err(self.invalid(Operation::EarlyReturn));
        }

        let used = billed_minutes(now.millis_since(session.started_at)).max(1);
        let record = self.record(&session, now, clamp_minutes(used));
        self.session = None;
        self.bump();
        Ok(record)
    }

    /// `overdue → available`.
    ///
    /// Billed for the paid duration plus rounded overtime minutes. Overtime is
    /// informational: the price stays the one chosen at rental start.
    pub fn stop_overtime(&mut self, now: Timestamp) -> Result<SessionRecord, TransitionError> {
        let Some(session) = self.session else {
            return Err(self.invalid(Operation::StopOvertime));
        };
        let Phase::Overdue { overdue_since } = session.phase else {
            return Err(self.invalid(Operation::StopOvertime));
        };

        let overtime = billed_minutes(now.millis_since(overdue_since));
        let total = u64::from(session.duration_minutes) + overtime;
        let record = self.record(&session, now, clamp_minutes(total));
        self.session = None;
        self.bump();
        Ok(record)
    }

    /// Any state `→ available`, discarding the session without a record.
    pub fn force_reset(&mut self) {
        self.session = None;
        self.bump();
    }

    /// The record a return at `now` would write, without changing state.
    ///
    /// `None` while available. A rented unit whose paid time has lapsed is
    /// previewed as a confirmed return.
    pub fn close_summary(&self, now: Timestamp) -> Option<SessionRecord> {
        let session = self.session?;
        let minutes = match session.phase {
            Phase::Rented { paid_until } if now < paid_until => {
                clamp_minutes(billed_minutes(now.millis_since(session.started_at)).max(1))
            },
            Phase::Rented { .. } | Phase::ExpiredUnconfirmed { .. } => session.duration_minutes,
            Phase::Overdue { overdue_since } => clamp_minutes(
                u64::from(session.duration_minutes)
                    + billed_minutes(now.millis_since(overdue_since)),
            ),
        };
        Some(self.record(&session, now, minutes))
    }

    /// Whether the field invariants of the data model hold.
    ///
    /// Always true for units mutated through the transitions above; used to
    /// vet state restored from storage.
    pub fn is_consistent(&self) -> bool {
        match self.status() {
            UnitStatus::Available => {
                self.rental_started_at().is_none()
                    && self.paid_until().is_none()
                    && self.overdue_since().is_none()
            },
            UnitStatus::Rented | UnitStatus::ExpiredUnconfirmed => {
                self.paid_until().is_some() && self.overdue_since().is_none()
            },
            UnitStatus::Overdue => self.paid_until().is_none() && self.overdue_since().is_some(),
        }
    }
}
