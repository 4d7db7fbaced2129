//! Type-erased callables, checked at runtime.
//!
//! For work whose shape is only known at runtime, e.g. callables looked up by name. Prefer
//! [Dispatcher::submit](crate::Dispatcher::submit) with a closure when the shape is known
//! statically.

use std::{
    any::{self, Any},
    fmt,
};

use crate::{Error, InvocationError};

/// A type-erased argument.
pub type Arg = Box<dyn Any + Send>;

/// A callable of any arity, with its parameter types erased.
///
/// Submitted with [Dispatcher::submit_erased](crate::Dispatcher::submit_erased).
pub struct ErasedFn {
    arity: usize,
    call: Box<dyn FnOnce(Vec<Arg>) -> Result<(), InvocationError> + Send>,
}

/// Conversion of a function or closure into an [ErasedFn].
///
/// Implemented for `FnOnce` with up to 8 parameters, each of which must be `Any + Send`.
pub trait IntoErasedFn<Params> {
    #[allow(missing_docs)]
    fn into_erased(self) -> ErasedFn;
}

/// An [ErasedFn] with its arguments, ready to be run.
#[derive(Debug)]
pub(crate) struct BoundCall {
    func: ErasedFn,
    args: Vec<Arg>,
}

impl ErasedFn {
    /// Erase the parameter types of `f`.
    ///
    /// Whatever `f` returns is discarded.
    pub fn new<Params>(f: impl IntoErasedFn<Params>) -> Self {
        f.into_erased()
    }

    /// The number of parameters the callable declares.
    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Debug for ErasedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedFn")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Check that `work` can be called with `args`, without calling it.
pub(crate) fn bind(work: Box<dyn Any + Send>, args: Vec<Arg>) -> Result<BoundCall, Error> {
    let func = work
        .downcast::<ErasedFn>()
        .map_err(|_| Error::NotInvocable)?;

    if args.len() != func.arity {
        return Err(Error::ArgumentCountMismatch {
            expected: func.arity,
            actual: args.len(),
        });
    }

    Ok(BoundCall { func: *func, args })
}

impl BoundCall {
    /// Runs the callable.
    ///
    /// Arguments of the wrong type are logged and the callable is not run.
    pub(crate) fn invoke(self) {
        if let Err(error) = (self.func.call)(self.args) {
            tracing::warn!(%error, "unable to invoke type-erased work");
        }
    }
}

fn downcast<T: Any>(arg: Option<Arg>, position: usize) -> Result<T, InvocationError> {
    let mismatch = || InvocationError::ArgumentType {
        position,
        expected: any::type_name::<T>(),
    };

    arg.ok_or_else(mismatch)?
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| mismatch())
}

macro_rules! count {
    () => { 0 };
    ($head:ident $($tail:ident)*) => { 1 + count!($($tail)*) };
}

macro_rules! impl_into_erased_fn {
    ($($param:ident),*) => {
        impl<Func, Ret, $($param,)*> IntoErasedFn<($($param,)*)> for Func
        where
            Func: FnOnce($($param),*) -> Ret + Send + 'static,
            $($param: Any + Send,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn into_erased(self) -> ErasedFn {
                ErasedFn {
                    arity: count!($($param)*),
                    call: Box::new(move |args: Vec<Arg>| -> Result<(), InvocationError> {
                        let mut args = args.into_iter();
                        let mut position = 0;
                        $(
                            let $param = downcast::<$param>(args.next(), position)?;
                            position += 1;
                        )*
                        self($($param),*);
                        Ok(())
                    }),
                }
            }
        }
    };
}

impl_into_erased_fn!();
impl_into_erased_fn!(A);
impl_into_erased_fn!(A, B);
impl_into_erased_fn!(A, B, C);
impl_into_erased_fn!(A, B, C, D);
impl_into_erased_fn!(A, B, C, D, E);
impl_into_erased_fn!(A, B, C, D, E, F);
impl_into_erased_fn!(A, B, C, D, E, F, G);
impl_into_erased_fn!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// Collects formatted log output.
    #[derive(Debug, Clone, Default)]
    struct Logs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Logs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Logs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn arity_is_declared_parameter_count() {
        assert_eq!(ErasedFn::new(|| ()).arity(), 0);
        assert_eq!(ErasedFn::new(|_: u8| ()).arity(), 1);
        assert_eq!(ErasedFn::new(|_: u8, _: String, _: Vec<i32>| ()).arity(), 3);
    }

    #[test]
    fn non_callable_is_not_invocable() {
        let err = bind(Box::new("not a function"), vec![]).err();

        assert_eq!(err, Some(Error::NotInvocable));
    }

    #[test]
    fn argument_count_must_match() {
        let f = ErasedFn::new(|a: u32, b: u32| a + b);

        let args: Vec<Arg> = vec![Box::new(1u32)];
        let err = bind(Box::new(f), args).err();

        assert_eq!(
            err,
            Some(Error::ArgumentCountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn invokes_with_arguments_in_order() {
        let seen = Arc::new(Mutex::new(String::new()));
        let s = seen.clone();
        let f = ErasedFn::new(move |greeting: &'static str, name: String, n: usize| {
            *s.lock().unwrap() = format!("{greeting}, {name} x{n}");
        });

        let args: Vec<Arg> = vec![
            Box::new("hello"),
            Box::new(String::from("world")),
            Box::new(3usize),
        ];
        bind(Box::new(f), args).unwrap().invoke();

        assert_eq!(*seen.lock().unwrap(), "hello, world x3");
    }

    #[test]
    fn wrong_argument_type_is_reported_not_called() {
        let called = Arc::new(Mutex::new(false));
        let c = called.clone();
        let f = ErasedFn::new(move |_: u32, _: u64| *c.lock().unwrap() = true);

        let args: Vec<Arg> = vec![Box::new(1u32), Box::new("two")];
        let result = (f.call)(args);

        assert_eq!(
            result,
            Err(InvocationError::ArgumentType {
                position: 1,
                expected: "u64"
            })
        );
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn wrong_argument_type_is_logged_as_warning() {
        let logs = Logs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let called = Arc::new(Mutex::new(false));
        let c = called.clone();
        let f = ErasedFn::new(move |_: String| *c.lock().unwrap() = true);
        let args: Vec<Arg> = vec![Box::new(404u16)];
        let call = bind(Box::new(f), args).unwrap();

        tracing::subscriber::with_default(subscriber, || call.invoke());

        let logs = logs.contents();
        assert!(logs.contains("WARN"), "logs: {logs}");
        assert!(logs.contains("unable to invoke type-erased work"), "logs: {logs}");
        let expected = format!("argument 0 is not of type `{}`", any::type_name::<String>());
        assert!(logs.contains(&expected), "logs: {logs}");
        assert!(!*called.lock().unwrap());
    }
}
