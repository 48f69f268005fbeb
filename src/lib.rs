//! Purpose: Shared core library crate used by the `slicekit` CLI and tests.
//! Exports: `api` (views, errors), `core` (storage semantics), `script` (manifest runner).
//! Role: Internal library backing the binary; not yet a stable public SDK.
//! Invariants: Treat the crate API as internal until a dedicated library release.
//! Invariants: All aliasing semantics live in `core`; `script` only drives them.
pub mod api;
pub mod core;
pub mod script;
