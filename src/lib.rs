//! Fire-and-forget task dispatch with a fixed concurrency limit.

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

pub mod config;
mod dispatcher;
mod erased;
mod error;

pub use config::{Builder, Capacity};
pub use dispatcher::{Dispatch, Dispatcher, DispatcherState, Job};
pub use erased::{Arg, ErasedFn, IntoErasedFn};
pub use error::{AtCapacity, Error, InvocationError};
