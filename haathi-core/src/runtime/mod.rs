//! Wasmtime-backed runtime glue for haathi-core.
//!
//! Responsibilities:
//! - Create a Wasmtime `Engine`/`Store` with feature flags enabled.
//! - Define host imports under module `"env"` matching the guest ABI.
//! - Instantiate a guest module and keep its memory in [`crate::state::HostState`].
//! - Drive frames: input dispatch, `update`, `render`, audio mix.
//!
//! Entrypoint resolution lives in `crate::abi::GuestEntrypoints::resolve`.

pub mod imports;
pub mod runtime;

pub use runtime::HaathiRuntime;
