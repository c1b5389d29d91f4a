//! mirgen - MIR construction for an ahead-of-time compiler
//!
//! Turns a type-checked program into a closed, monomorphized MIR assembly:
//! only the instantiations reachable from the entry points are generated,
//! every body is lowered to SSA, and every vtable is complete.

pub mod ast;
pub mod config;
pub mod error;
pub mod mir;
pub mod mono;

pub use config::EmitterConfig;
pub use error::{MirError, Result};
pub use mono::generate_masm;
