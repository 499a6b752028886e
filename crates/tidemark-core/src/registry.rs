use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::step::{Direction, MigrationStep};

/// A step together with its position in the sequence it was registered in.
pub struct RegisteredStep<Tx> {
    ordinal: usize,
    direction: Direction,
    step: Box<dyn MigrationStep<Tx>>,
}

impl<Tx> RegisteredStep<Tx> {
    /// 1-based position within its sequence.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn name(&self) -> &str {
        self.step.name()
    }

    pub fn step(&self) -> &dyn MigrationStep<Tx> {
        self.step.as_ref()
    }

    /// Log tag such as `Up00000001`.
    pub fn tag(&self) -> String {
        format!("{}{:08}", self.direction, self.ordinal)
    }
}

/// Ordered up and down sequences of migration steps.
///
/// Append-only until sealed. The engine seals the registry when its first run
/// starts; later registrations are rejected.
pub struct MigrationRegistry<Tx> {
    up: Vec<RegisteredStep<Tx>>,
    down: Vec<RegisteredStep<Tx>>,
    sealed: AtomicBool,
}

impl<Tx> Default for MigrationRegistry<Tx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tx> MigrationRegistry<Tx> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            up: Vec::new(),
            down: Vec::new(),
            sealed: AtomicBool::new(false),
        }
    }

    /// Append a forward step. Returns its ordinal.
    pub fn register_up(&mut self, step: impl MigrationStep<Tx> + 'static) -> Result<usize> {
        self.register_boxed(Direction::Up, Box::new(step))
    }

    /// Append a reverse step. Returns its ordinal.
    pub fn register_down(&mut self, step: impl MigrationStep<Tx> + 'static) -> Result<usize> {
        self.register_boxed(Direction::Down, Box::new(step))
    }

    /// Append an already boxed step.
    pub fn register_boxed(
        &mut self,
        direction: Direction,
        step: Box<dyn MigrationStep<Tx>>,
    ) -> Result<usize> {
        if self.is_sealed() {
            return Err(MigrateError::RegistrationClosed(format!(
                "cannot register '{}' after execution has started",
                step.name()
            )));
        }

        let sequence = match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        };
        let ordinal = sequence.len() + 1;
        debug!("Registered {}{:08}: {}", direction, ordinal, step.name());
        sequence.push(RegisteredStep {
            ordinal,
            direction,
            step,
        });

        Ok(ordinal)
    }

    /// Close the registry to further registration.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Forward steps in registration order.
    pub fn up(&self) -> &[RegisteredStep<Tx>] {
        &self.up
    }

    /// Reverse steps in registration order (execution walks this backwards).
    pub fn down(&self) -> &[RegisteredStep<Tx>] {
        &self.down
    }

    /// Names of the forward steps in registration order.
    pub fn up_names(&self) -> impl Iterator<Item = &str> {
        self.up.iter().map(|s| s.name())
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }
}
