//! Invariant checking for rental tests.
//!
//! Invariants are properties that must hold after every operation, whatever
//! sequence led there. A [`VenueSnapshot`] captures the observable state of
//! an engine; an [`InvariantRegistry`] runs every registered [`Invariant`]
//! against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = VenueSnapshot::capture(&mut engine);
//! registry.assert_all(&snapshot, "after start_rental");
//! ```

mod checks;
mod snapshot;

pub use checks::{
    GenerationMonotonicity, HistoryWellFormed, SessionFieldsMatchStatus, SessionTimesOrdered,
    UniqueUnitIds,
};
pub use snapshot::{UnitSnapshot, VenueSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// A failed check.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Which check failed
    pub invariant: &'static str,
    /// Offending unit or record
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a [`VenueSnapshot`].
pub trait Invariant: Send + Sync {
    /// Short snake_case name.
    fn name(&self) -> &'static str;

    /// `Err` on the first offending unit or record.
    fn check(&self, state: &VenueSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run against each snapshot.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No invariants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session field, timing, generation, history and id checks.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SessionFieldsMatchStatus);
        registry.add(SessionTimesOrdered);
        registry.add(GenerationMonotonicity);
        registry.add(HistoryWellFormed);
        registry.add(UniqueUnitIds);
        registry
    }

    /// Register one more check.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every check; all violations are returned, not just the first.
    pub fn check_all(&self, state: &VenueSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// [`check_all`](Self::check_all), panicking on any violation.
    pub fn assert_all(&self, state: &VenueSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(|v| v.to_string()).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no check is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
