//! Narrative layer: turn a ranked correlation list into prose.
//!
//! ```text
//!   ranked pairs + LabelMapping
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  prompt   │  pair lines, identifiers → labels, instruction
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐     ┌──────────┐
//!   │   task    │ ──▶ │  client   │  chat completion over HTTPS
//!   └──────────┘     └──────────┘
//!   (worker thread, cancellable, polled by the UI)
//! ```

pub mod client;
pub mod prompt;
pub mod task;

pub use client::{CompletionClient, CompletionService};
pub use prompt::{build_prompt, NarrativePrompt};
pub use task::{NarrativeTask, TaskStatus};
