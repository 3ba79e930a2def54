//! Data layer: core types, loading, label bookkeeping and export.
//!
//! Architecture:
//! ```text
//!  .csv / .xlsx / .sav
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Dataset + LabelMapping
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │ LabelMapping  │  identifier ↔ display label
//!   └──────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  search the label list shown to the user
//!   └──────────┘
//! ```

pub mod export;
pub mod filter;
pub mod labels;
pub mod loader;
pub mod model;
pub mod sav;
pub mod xlsx;
