use std::{
    any::Any,
    fmt::Debug,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{
    runtime::Handle,
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
};

use crate::{
    config::{Builder, Capacity},
    erased::{self, Arg},
    AtCapacity, Error,
};

use slot::Slot;

mod slot;

/// A unit of work in its type-erased form.
///
/// Arguments are bound by capturing them.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs units of work concurrently, up to a fixed limit.
///
/// Submitting waits until there is a free slot, then hands the work to a newly spawned task and
/// returns without waiting for it to finish.
#[async_trait]
pub trait Dispatch: Debug + Send + Sync {
    /// Wait for a free slot, then run the job in the background.
    async fn dispatch(&self, job: Job);

    /// A snapshot of the dispatcher's current state.
    fn state(&self) -> DispatcherState;
}

/// Runs at most `capacity` units of work at once.
///
/// Work is fire-and-forget: there is no handle to the running work, and anything it produces or
/// any way it fails is up to the work itself to report. Whichever way the work ends, its slot is
/// freed.
///
/// Cheaply cloneable. Clones share the same capacity.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    capacity: Capacity,
    semaphore: Arc<Semaphore>,
    handle: Handle,
    name: Option<Arc<str>>,

    in_flight: Arc<AtomicUsize>,
}

/// A snapshot of the state of a [Dispatcher].
///
/// Not guaranteed to be consistent under high concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherState {
    capacity: usize,
    available: usize,
    in_flight: usize,
}

impl Dispatcher {
    /// Create a dispatcher which runs at most `capacity` units of work at once, spawning them on
    /// the current tokio runtime.
    ///
    /// Fails if `capacity` is zero, or if called outside a tokio runtime. Use
    /// [Dispatcher::builder] for more control.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Self::builder().capacity(capacity).build()
    }

    /// Configure a new dispatcher.
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn from_parts(capacity: Capacity, handle: Handle, name: Option<Arc<str>>) -> Self {
        tracing::debug!(%capacity, name = name.as_deref(), "dispatcher created");

        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity.get())),
            handle,
            name,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The concurrency limit.
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// The name given to [Builder::name], if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The current state of the dispatcher.
    pub fn state(&self) -> DispatcherState {
        DispatcherState {
            capacity: self.capacity.get(),
            available: self.semaphore.available_permits(),
            in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }

    /// Wait for a free slot, then run `work` on the runtime's blocking thread pool.
    ///
    /// Returns as soon as `work` has been admitted, not when it completes. `work` may block.
    ///
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), bounded_dispatch::Error> {
    /// use bounded_dispatch::Dispatcher;
    ///
    /// let dispatcher = Dispatcher::new(2)?;
    ///
    /// for path in ["a.csv", "b.csv", "c.csv"] {
    ///     dispatcher.submit(move || println!("importing {path}")).await;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit<F, R>(&self, work: F)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let slot = self.admit().await;
        self.run(slot, work);
    }

    /// Wait for a free slot, then run the future produced by `work` on the runtime.
    ///
    /// Returns as soon as `work` has been admitted, not when it completes.
    pub async fn submit_async<F, Fut>(&self, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
    {
        let slot = self.admit().await;
        let span = self.completion_span();

        self.handle.spawn(async move {
            work().await;
            span.in_scope(|| tracing::trace!("unit of work finished"));
            drop(slot);
        });
    }

    /// Block the current thread until there is a free slot, then run `work` on the runtime's
    /// blocking thread pool.
    ///
    /// For use from synchronous code.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_submit<F, R>(&self, work: F)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let slot = self.handle.block_on(self.admit());
        self.run(slot, work);
    }

    /// Run `work` if there is a free slot right now.
    ///
    /// Otherwise, returns `work` to the caller without running it.
    pub fn try_submit<F, R>(&self, work: F) -> Result<(), AtCapacity<F>>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                let slot = self.mint_slot(permit);
                self.run(slot, work);
                Ok(())
            }
            Err(TryAcquireError::NoPermits) => Err(AtCapacity(work)),

            Err(TryAcquireError::Closed) => {
                panic!("we own the semaphore, we shouldn't have closed it")
            }
        }
    }

    /// Wait for a free slot, then invoke a type-erased callable with `args`.
    ///
    /// `work` must be an [ErasedFn](crate::ErasedFn) taking exactly `args.len()` parameters.
    /// Both are checked before a slot is reserved. The argument types are only checked once the
    /// work runs, and a mismatch is logged rather than returned.
    ///
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), bounded_dispatch::Error> {
    /// use bounded_dispatch::{Arg, Dispatcher, ErasedFn, Error};
    ///
    /// let dispatcher = Dispatcher::new(1)?;
    /// let add = ErasedFn::new(|a: u32, b: u32| a + b);
    ///
    /// let args: Vec<Arg> = vec![Box::new(1u32)];
    /// let err = dispatcher.submit_erased(Box::new(add), args).await;
    ///
    /// assert_eq!(
    ///     err,
    ///     Err(Error::ArgumentCountMismatch { expected: 2, actual: 1 })
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit_erased(
        &self,
        work: Box<dyn Any + Send>,
        args: Vec<Arg>,
    ) -> Result<(), Error> {
        let call = erased::bind(work, args)?;
        self.submit(move || call.invoke()).await;
        Ok(())
    }

    /// Like [Dispatcher::submit_erased], blocking the current thread while waiting for a slot.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_submit_erased(
        &self,
        work: Box<dyn Any + Send>,
        args: Vec<Arg>,
    ) -> Result<(), Error> {
        let call = erased::bind(work, args)?;
        self.blocking_submit(move || call.invoke());
        Ok(())
    }

    async fn admit(&self) -> Slot {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("we own the semaphore, we shouldn't have closed it");

        self.mint_slot(permit)
    }

    fn mint_slot(&self, permit: OwnedSemaphorePermit) -> Slot {
        let slot = Slot::new(permit, self.in_flight.clone());

        tracing::trace!(
            name = self.name(),
            capacity = self.capacity.get(),
            in_flight = self.in_flight.load(Ordering::Relaxed),
            "unit of work admitted"
        );

        slot
    }

    fn run<F, R>(&self, slot: Slot, work: F)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let span = self.completion_span();

        self.handle.spawn_blocking(move || {
            // The slot is released even if `work` panics.
            let _slot = slot;
            work();
            span.in_scope(|| tracing::trace!("unit of work finished"));
        });
    }

    fn completion_span(&self) -> tracing::Span {
        tracing::trace_span!("dispatch", name = self.name())
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch(&self, job: Job) {
        self.submit(job).await;
    }

    fn state(&self) -> DispatcherState {
        Dispatcher::state(self)
    }
}

impl DispatcherState {
    /// The concurrency limit.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// The number of free slots.
    pub fn available(&self) -> usize {
        self.available
    }
    /// The number of units of work admitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
