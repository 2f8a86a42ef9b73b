//! Uniform post-processing of facade results.
//!
//! Every public data-returning operation of the facades is declared inside
//! [`normalized!`], which routes its body through [`intercept`]. Errors pass
//! through untouched; successful results are normalized exactly once.
//!
//! Operations built from other operations call the raw, unwrapped helpers
//! rather than the wrapped public methods so that no result is normalized
//! twice. Arrays with a unit-length axis are both row- and column-major, and
//! a second pass would transpose them back.

use crate::errors::Result;
use crate::normalize::Normalize;

/// Run `op` and pass its result through the normalizer.
pub fn intercept<T: Normalize>(operation: &str, op: impl FnOnce() -> Result<T>) -> Result<T> {
    let value = op()?;
    log::trace!("normalizing result of {operation}");
    Ok(value.normalize())
}

/// Declare methods whose successful results are normalized.
///
/// ```ignore
/// normalized! {
///     /// Cell contents.
///     pub fn get_cell(&self, column: &str, row: usize) -> Result<Value> {
///         self.raw_cell(column, row)
///     }
/// }
/// ```
macro_rules! normalized {
    ($(
        $(#[$meta:meta])*
        $vis:vis fn $name:ident(&$self_:ident $(, $arg:ident: $ty:ty)* $(,)?) -> $ret:ty $body:block
    )*) => {
        $(
            $(#[$meta])*
            $vis fn $name(&$self_ $(, $arg: $ty)*) -> $ret {
                $crate::intercept::intercept(stringify!($name), || $body)
            }
        )*
    };
}

pub(crate) use normalized;
