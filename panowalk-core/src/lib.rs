//! Panowalk Core - Entity Types
//!
//! Pure data structures and pure math. All other crates depend on this.
//! This crate contains no I/O - the cache, renderer, preloader, and engine
//! crates build their behavior on top of these types.

mod config;
mod entities;
mod enums;
mod geo;
mod identity;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use geo::*;
pub use identity::*;
