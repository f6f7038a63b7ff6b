//! Analysis of nanoindentation property maps and AFM height scans.
//!
//! - [`data`] loads tables and AFM scans and reshapes them into grids.
//! - [`stats`] fits mixtures, Weibull distributions and k-means clusters.
//! - [`render`] draws the results to PNG.

pub mod color;
pub mod config;
pub mod data;
pub mod render;
pub mod rng;
pub mod stats;
