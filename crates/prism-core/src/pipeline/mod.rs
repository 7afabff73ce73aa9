//! Batch pipeline stages.
//!
//! Each URL in a batch threads through the stages below without any stage
//! waiting on another:
//!
//! ```text
//! CacheGate ──NeedsFetch──► Fetcher ──Arc<Image>──► FilterBinder ──FilterTask──► FilterRunner
//!     │                                                                              │
//!     └──Cached (no tasks)                                         join_all per image, then per batch
//! ```
//!
//! - **gate**: per-URL cache decision
//! - **decode**: decoded image type and decoder
//! - **fetch**: download and decode
//! - **bind**: one task per configured filter
//! - **run**: execute a task on the worker pool
//! - **orchestrator**: wires the stages and awaits the batch barrier

pub mod bind;
pub mod decode;
pub mod fetch;
pub mod gate;
pub mod orchestrator;
pub mod run;

pub use bind::{FilterBinder, FilterTask};
pub use decode::{Image, ImageDecoder};
pub use fetch::Fetcher;
pub use gate::{CacheDecision, CacheGate};
pub use orchestrator::Pipeline;
pub use run::FilterRunner;
