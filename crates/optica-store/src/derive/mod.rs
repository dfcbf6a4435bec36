//! View derivations.
//!
//! - [`compose`]: reshape the parent's state (focus, pick fields, recompose)
//! - [`compute`]: add synchronously computed values
//! - [`load`]: add asynchronously loaded values
//!
//! Composed views have their own write path back into the parent. Computed
//! and loaded views share their parent's local state, and so its write path.

pub(crate) mod compose;
pub(crate) mod compute;
pub(crate) mod load;

pub use compose::Fields;
pub use compute::{ComputeFn, Computers};
pub use load::{LoadFn, LoadStream, Loaders};
