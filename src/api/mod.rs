//! Purpose: Define the stable public Rust API boundary for slicekit.
//! Exports: View and error types needed by the CLI and embedders.
//! Role: Public, additive-only surface; hides the backing-store module.
//! Invariants: This module is the only public path to storage primitives.
//! Invariants: Backing stores are reachable only through `SeqView`.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::view::SeqView;
pub use crate::core::MAX_ALLOC;
