/// Data layer: core types, loading, and grid construction.
///
/// Architecture:
/// ```text
///  .csv / .txt / .json / .parquet        AFM ASCII export
///        │                                     │
///        ▼                                     ▼
///   ┌──────────┐                          ┌──────────┐
///   │  loader   │  parse file → Table     │   afm     │  header + height matrix
///   └──────────┘                          └──────────┘
///        │                                     │
///        ▼                                     ▼
///   ┌──────────┐                        center_on_minimum / crop
///   │  filter   │  finite masks
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   grid    │  pivot (x, y, z) → PixelGrid
///   └──────────┘
/// ```

pub mod afm;
pub mod filter;
pub mod grid;
pub mod loader;
pub mod model;
