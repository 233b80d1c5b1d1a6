//! Reference model of a venue.
//!
//! A deliberately naive re-statement of the lifecycle rules: flat optional
//! fields, billing arithmetic written out longhand. It shares no code with
//! the engine, so agreement between the two is evidence, not tautology.

use super::operation::{Operation, OperationError, OperationResult};

const MINUTE_MS: u64 = 60_000;

/// Status names used by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    /// Free
    Available,
    /// Paid time running
    Rented,
    /// Waiting for return confirmation
    Expired,
    /// Overtime running
    Overdue,
}

/// One unit in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUnit {
    /// Status
    pub status: ModelStatus,
    /// Rental start (ms)
    pub started: Option<u64>,
    /// End of paid time (ms)
    pub paid_until: Option<u64>,
    /// Start of overtime (ms)
    pub overdue_since: Option<u64>,
    /// Paid minutes
    pub minutes: Option<u32>,
    /// Price
    pub price: Option<u32>,
}

impl ModelUnit {
    fn available() -> Self {
        Self {
            status: ModelStatus::Available,
            started: None,
            paid_until: None,
            overdue_since: None,
            minutes: None,
            price: None,
        }
    }
}

/// A closed session as the model bills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    /// Position of the unit
    pub unit: usize,
    /// Billed minutes
    pub minutes: u32,
    /// Price paid
    pub price: u32,
    /// Session end (ms)
    pub ended_at: u64,
}

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Per-unit status, paid_until and overdue_since
    pub units: Vec<(ModelStatus, Option<u64>, Option<u64>)>,
    /// History in append order
    pub history: Vec<ModelRecord>,
    /// Expiry alerts sent
    pub alerts: usize,
}

/// The reference venue.
#[derive(Debug, Clone)]
pub struct ModelVenue {
    now: u64,
    units: Vec<ModelUnit>,
    history: Vec<ModelRecord>,
    alerts: usize,
}

impl ModelVenue {
    /// Venue of `unit_count` available units at time zero.
    pub fn new(unit_count: usize) -> Self {
        Self {
            now: 0,
            units: vec![ModelUnit::available(); unit_count],
            history: Vec::new(),
            alerts: 0,
        }
    }

    /// Current time (ms).
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Unit at `index`.
    pub fn unit(&self, index: usize) -> Option<&ModelUnit> {
        self.units.get(index)
    }

    /// Position targeted by a raw selector.
    pub fn resolve(&self, selector: u8) -> usize {
        usize::from(selector) % self.units.len().max(1)
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Advance { seconds } => {
                self.now += u64::from(seconds) * 1000;
                Ok(())
            },
            Operation::Tick => {
                for index in 0..self.units.len() {
                    self.expire(index);
                }
                Ok(())
            },
            Operation::Unknown => Err(OperationError::NotFound),
            Operation::Get { unit } => {
                let index = self.resolve(unit);
                self.expire(index);
                Ok(())
            },
            Operation::Start { unit, minutes, price } => {
                let index = self.resolve(unit);
                self.expire(index);
                let now = self.now;
                let u = &mut self.units[index];
                if u.status != ModelStatus::Available {
                    return Err(OperationError::InvalidTransition);
                }
                if minutes == 0 {
                    return Err(OperationError::InvalidDuration);
                }
                *u = ModelUnit {
                    status: ModelStatus::Rented,
                    started: Some(now),
                    paid_until: Some(now + u64::from(minutes) * MINUTE_MS),
                    overdue_since: None,
                    minutes: Some(u32::from(minutes)),
                    price: Some(u32::from(price)),
                };
                Ok(())
            },
            Operation::Confirm { unit, returned } => {
                let index = self.resolve(unit);
                self.expire(index);
                if self.units[index].status != ModelStatus::Expired {
                    return Err(OperationError::InvalidTransition);
                }
                if returned {
                    let minutes = self.units[index].minutes.unwrap_or(0);
                    self.close(index, minutes);
                } else {
                    let u = &mut self.units[index];
                    u.status = ModelStatus::Overdue;
                    u.overdue_since = u.paid_until.take();
                }
                Ok(())
            },
            Operation::EarlyReturn { unit } => {
                let index = self.resolve(unit);
                self.expire(index);
                let u = &self.units[index];
                if u.status != ModelStatus::Rented {
                    return Err(OperationError::InvalidTransition);
                }
                let elapsed = self.now - u.started.unwrap_or(0);
                let mut minutes = (elapsed + MINUTE_MS / 2) / MINUTE_MS;
                if minutes < 1 {
                    minutes = 1;
                }
                self.close(index, minutes as u32);
                Ok(())
            },
            Operation::StopOvertime { unit } => {
                let index = self.resolve(unit);
                self.expire(index);
                let u = &self.units[index];
                if u.status != ModelStatus::Overdue {
                    return Err(OperationError::InvalidTransition);
                }
                let overtime = self.now - u.overdue_since.unwrap_or(0);
                let extra = (overtime + MINUTE_MS / 2) / MINUTE_MS;
                let minutes = u.minutes.unwrap_or(0) + extra as u32;
                self.close(index, minutes);
                Ok(())
            },
            Operation::ForceReset { unit } => {
                let index = self.resolve(unit);
                self.units[index] = ModelUnit::available();
                Ok(())
            },
        }
    }

    /// Read every unit, applying lazy expiry as a unit listing does.
    pub fn list_units(&mut self) -> &[ModelUnit] {
        for index in 0..self.units.len() {
            self.expire(index);
        }
        &self.units
    }

    /// Observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            units: self.units.iter().map(|u| (u.status, u.paid_until, u.overdue_since)).collect(),
            history: self.history.clone(),
            alerts: self.alerts,
        }
    }

    fn expire(&mut self, index: usize) {
        let u = &mut self.units[index];
        if u.status == ModelStatus::Rented && u.paid_until.is_some_and(|end| self.now >= end) {
            u.status = ModelStatus::Expired;
            self.alerts += 1;
        }
    }

    fn close(&mut self, index: usize, minutes: u32) {
        let price = self.units[index].price.unwrap_or(0);
        self.history.push(ModelRecord { unit: index, minutes, price, ended_at: self.now });
        self.units[index] = ModelUnit::available();
    }
}
