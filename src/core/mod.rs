// Core modules implementing handles, ownership, the value type, and errors.
pub mod complex;
pub mod error;
pub mod handle;
pub mod raw;
pub mod registry;
