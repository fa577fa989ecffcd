//! Argument unpacking: one dispatch path for single- and multi-argument functions.
//!
//! Typed calls go through [`TaskFn`] and [`IntoArgs`]: a plain item becomes a
//! one-element argument tuple, a tuple item is spread across the parameters.
//! Dynamic calls (registry, worker processes) go through [`unpack`], which
//! applies the same rule to JSON: an array is the positional argument list,
//! anything else is the sole argument.

use serde_json::Value;

/// A function callable with the argument tuple `Args`.
///
/// Implemented for every `Fn` of one to six parameters, keyed by the tuple of
/// parameter types so that the arity is picked from the function itself.
pub trait TaskFn<Args>: Send + Sync + 'static {
    type Output;

    fn call(&self, args: Args) -> Self::Output;
}

/// Conversion of an input item into the argument tuple of a [`TaskFn`].
pub trait IntoArgs<Args> {
    fn into_args(self) -> Args;
}

impl<F, R, A> TaskFn<(A,)> for F
where
    F: Fn(A) -> R + Send + Sync + 'static,
{
    type Output = R;

    fn call(&self, (a,): (A,)) -> R {
        (self)(a)
    }
}

impl<A> IntoArgs<(A,)> for A {
    fn into_args(self) -> (A,) {
        (self,)
    }
}

macro_rules! impl_spread {
    ($($ty:ident $arg:ident),+) => {
        impl<F, R, $($ty,)+> TaskFn<($($ty,)+)> for F
        where
            F: Fn($($ty),+) -> R + Send + Sync + 'static,
        {
            type Output = R;

            fn call(&self, ($($arg,)+): ($($ty,)+)) -> R {
                (self)($($arg),+)
            }
        }

        impl<$($ty,)+> IntoArgs<($($ty,)+)> for ($($ty,)+) {
            fn into_args(self) -> ($($ty,)+) {
                self
            }
        }
    };
}

impl_spread!(A a, B b);
impl_spread!(A a, B b, C c);
impl_spread!(A a, B b, C c, D d);
impl_spread!(A a, B b, C c, D d, E e);
impl_spread!(A a, B b, C c, D d, E e, G g);

/// Normalize a JSON item into a positional argument list.
pub fn unpack(item: Value) -> Value {
    match item {
        Value::Array(_) => item,
        other => Value::Array(vec![other]),
    }
}
