//! Example datasets: seeded synthetic generation and remote download.

pub mod fetch;
pub mod synthetic;

pub use fetch::*;
pub use synthetic::*;
