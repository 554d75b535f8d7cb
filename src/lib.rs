//! Purpose: Opaque-handle object bridge for managed numerical hosts.
//! Exports: `core` (handles, registry, value type, errors), `dispatch`, `protocol`, `abi`, `notice`.
//! Role: Library behind the `handlebridge` binary and the C ABI (cdylib/staticlib).
//! Invariants: The registry is the single owner of every object a host can name.
//! Invariants: Host-visible tokens are verified before use and never dereferenced as pointers.
pub mod abi;
pub mod core;
pub mod dispatch;
pub mod notice;
pub mod protocol;
