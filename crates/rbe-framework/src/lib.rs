//! # RBE Framework
//!
//! The extension contract and the host that wires extensions together.
//!
//! This layer provides:
//! - The [`Extension`] trait with a required `post` and overridable chain links
//! - [`ExtensionBase`], the type-state result of bootstrapping an extension
//! - [`ExtensionHost`], which registers hooks and seals into an
//!   [`ExtensionRegistry`]
//!
//! The framework is synchronous and runtime-agnostic; mail polling lives in
//! `rbe-runtime`.

pub mod base;
pub mod extension;
pub mod host;

pub use base::ExtensionBase;
pub use extension::Extension;
pub use host::{ExtensionHost, ExtensionRegistry};
