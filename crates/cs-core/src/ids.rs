use core::fmt;
use core::num::NonZeroU32;

use crate::error::{CoreError, CoreResult};

/// Compact, stable identifier for sensors, controllers and actuators.
///
/// Objects are built from a configuration stream in file order and receive a
/// 0-based construction index. The identifier users see (and write in
/// configuration files) is that index plus one.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Id>` to be pointer-optimized
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(NonZeroU32);

impl Id {
    /// Create an Id from a 0-based construction index by storing index+1.
    pub fn from_index(index: u32) -> Self {
        // index+1 must be nonzero
        Self(NonZeroU32::new(index + 1).expect("index+1 is nonzero"))
    }

    /// Create an Id from its 1-based number as written in configuration files.
    pub fn from_number(number: i64, what: &'static str) -> CoreResult<Self> {
        u32::try_from(number)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(CoreError::IdOutOfRange { what, number })
    }

    /// Recover the 0-based index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }

    /// Recover the 0-based index as a `usize` for arena lookups.
    pub fn slot(self) -> usize {
        self.index() as usize
    }

    /// The 1-based number.
    pub fn number(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id(#{})", self.number())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Domain-specific ID aliases for clarity (no runtime cost).
pub type SensorId = Id;
pub type ControllerId = Id;
pub type ActuatorId = Id;
