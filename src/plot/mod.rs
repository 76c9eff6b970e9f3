//! Plotting: free-energy SVG files and terminal histograms.

pub mod ascii;
pub mod free_energy;

pub use ascii::*;
pub use free_energy::*;
