//! Configuration for a [Dispatcher].

use std::{fmt, num::NonZeroUsize, sync::Arc};

use conv::ValueFrom;
use tokio::{runtime::Handle, sync::Semaphore};

use crate::{Dispatcher, Error};

/// The maximum number of units of work a [Dispatcher] will run at once.
///
/// Always at least 1, and at most [Capacity::MAX].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity(NonZeroUsize);

/// Builds a [Dispatcher].
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), bounded_dispatch::Error> {
/// use bounded_dispatch::Dispatcher;
///
/// let dispatcher = Dispatcher::builder()
///     .capacity(8)
///     .name("importer")
///     .build()?;
///
/// assert_eq!(dispatcher.state().capacity(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Builder {
    capacity: Option<Result<Capacity, Error>>,
    handle: Option<Handle>,
    name: Option<String>,
}

impl Capacity {
    /// The largest supported capacity.
    pub const MAX: usize = Semaphore::MAX_PERMITS;

    /// A capacity of `n`, or `None` if `n` is zero or above [Capacity::MAX].
    pub const fn new(n: usize) -> Option<Self> {
        if n > Self::MAX {
            return None;
        }
        match NonZeroUsize::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The capacity as a plain number.
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<NonZeroUsize> for Capacity {
    type Error = Error;

    fn try_from(n: NonZeroUsize) -> Result<Self, Self::Error> {
        Self::try_from(n.get())
    }
}

impl TryFrom<usize> for Capacity {
    type Error = Error;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| Error::InvalidConfiguration {
            capacity: i64::try_from(n).unwrap_or(i64::MAX),
        })
    }
}

macro_rules! signed_capacity {
    ($($int:ty),*) => {$(
        impl TryFrom<$int> for Capacity {
            type Error = Error;

            fn try_from(n: $int) -> Result<Self, Self::Error> {
                let invalid = || Error::InvalidConfiguration {
                    capacity: i64::try_from(n).unwrap_or(i64::MIN),
                };

                usize::value_from(n)
                    .ok()
                    .and_then(Self::new)
                    .ok_or_else(invalid)
            }
        }
    )*};
}

signed_capacity!(i32, i64, isize);

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Builder {
    /// Set the concurrency limit. Required.
    ///
    /// Invalid values are reported by [Builder::build].
    pub fn capacity<C>(mut self, capacity: C) -> Self
    where
        C: TryInto<Capacity, Error = Error>,
    {
        self.capacity = Some(capacity.try_into());
        self
    }

    /// Spawn work onto this runtime.
    ///
    /// Defaults to the runtime `build` is called from.
    pub fn handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Attach a name to this dispatcher's log events.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Create the [Dispatcher].
    ///
    /// Fails if the capacity is missing or invalid, or if there is no runtime to spawn work on.
    pub fn build(self) -> Result<Dispatcher, Error> {
        let capacity = self
            .capacity
            .unwrap_or(Err(Error::InvalidConfiguration { capacity: 0 }))?;

        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| Error::NoRuntime)?,
        };

        Ok(Dispatcher::from_parts(
            capacity,
            handle,
            self.name.map(Arc::from),
        ))
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("capacity", &self.capacity)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
