//! # System Interaction Layer
//!
//! Boundaries between the resolution core and the outside world.
//!
//! ## Modules
//!
//! - **`executor`**: Spawns external processes with captured output and an
//!   explicit credential environment; ambient AWS variables never leak in.
//! - **`sts`**: Role assumption and identity checks through the `aws` CLI.
//! - **`mfa`**: One-time code acquisition, with a fallback chain.
//! - **`prompt`**: Interactive selection, including hint-aware auto-selection.
//! - **`profiles`**: Long-lived credential stores and the write-forward chain.

pub mod executor;
pub mod mfa;
pub mod profiles;
pub mod prompt;
pub mod sts;
