// Core modules implementing view semantics, backing storage, and error modeling.
pub mod error;
mod store;
pub mod view;

pub use store::MAX_ALLOC;
