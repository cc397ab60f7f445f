//! Workspace placeholder crate.
//!
//! Exposes feature flags that map to the individual workspace crates so a
//! host application can depend on `virtual-tourist` and get the composed
//! [`core_service`] facade without wiring each crate itself.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
