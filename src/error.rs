use std::fmt;

/// Errors returned when constructing a [Dispatcher](crate::Dispatcher) or submitting work to it.
///
/// All of these are raised before any capacity is reserved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The capacity was zero or negative.
    #[error("invalid capacity {capacity}, must be at least 1")]
    InvalidConfiguration {
        /// The rejected capacity.
        capacity: i64,
    },

    /// No runtime handle was configured and there was no ambient tokio runtime.
    #[error("no tokio runtime available to spawn work on")]
    NoRuntime,

    /// Type-erased work was not an [ErasedFn](crate::ErasedFn).
    #[error("submitted work is not invocable")]
    NotInvocable,

    /// The number of arguments didn't match the callable's parameters.
    #[error("callable takes {expected} argument(s) but {actual} were supplied")]
    ArgumentCountMismatch {
        #[allow(missing_docs)]
        expected: usize,
        #[allow(missing_docs)]
        actual: usize,
    },
}

/// A failure to invoke type-erased work once it is already running.
///
/// Never returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    /// An argument had a different type to the corresponding parameter.
    #[error("argument {position} is not of type `{expected}`")]
    ArgumentType {
        /// Zero-based.
        position: usize,
        #[allow(missing_docs)]
        expected: &'static str,
    },
}

/// Returned by [Dispatcher::try_submit](crate::Dispatcher::try_submit) when every slot is taken.
///
/// Hands the work back to the caller.
#[derive(thiserror::Error)]
#[error("dispatcher is at capacity")]
pub struct AtCapacity<F>(
    /// The rejected work.
    pub F,
);

impl<F> AtCapacity<F> {
    /// Take back the rejected work.
    pub fn into_inner(self) -> F {
        self.0
    }
}

impl<F> fmt::Debug for AtCapacity<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtCapacity").finish_non_exhaustive()
    }
}
