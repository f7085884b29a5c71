/// The outcome of probing a [`crate::SharedTable`] for a key.
///
/// - [`LookupStatus::Found`] carries the value stored for the key.
/// - [`LookupStatus::Missing`] means the key was never inserted.
///
/// # Example
///
/// ```
/// use lookout::{LookupStatus, SharedTable};
///
/// let table = SharedTable::from_pairs([(1, 100)]);
/// match table.lookup(1) {
///     LookupStatus::Found { value } => assert_eq!(value, 100),
///     LookupStatus::Missing => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LookupStatus {
    /// The key is present.
    Found {
        /// The value last written for the key.
        value: u64,
    },
    /// The key is absent.
    Missing,
}

impl LookupStatus {
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub const fn value(&self) -> Option<u64> {
        match self {
            Self::Found { value } => Some(*value),
            Self::Missing => None,
        }
    }
}

impl From<Option<u64>> for LookupStatus {
    fn from(value: Option<u64>) -> Self {
        match value {
            Some(value) => Self::Found { value },
            None => Self::Missing,
        }
    }
}

/// Lifecycle of a single lookup worker.
///
/// States only ever move forward, one step at a time:
///
/// ```text
/// Created -> Running -> Cancelling -> Stopped
/// ```
///
/// `Stopped` is terminal. A worker reaches `Cancelling` when the pool is
/// cancelled, when it exhausts its iteration bound, or when it faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Running = 1,
    Cancelling = 2,
    Stopped = 3,
}

impl WorkerState {
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Cancelling,
            _ => Self::Stopped,
        }
    }

    /// The state that follows this one, or `None` for `Stopped`.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::Running),
            Self::Running => Some(Self::Cancelling),
            Self::Cancelling => Some(Self::Stopped),
            Self::Stopped => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}
