// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Render-pass target allocation with automatic ping-pong aliasing.
//!
//! Passbake takes an authored frame configuration (render targets, render
//! states and an ordered chain of passes) and bakes it into a flat table of
//! per-pass GPU bindings. Passes name logical targets; the bake maps each
//! logical target onto physical buffers pass by pass, so a pass may sample
//! and write the same target and the allocator supplies a second buffer
//! only where it must.
//!
//! # Key entry points
//!
//! - [`engine::PassEngine`] - owns a backend and the baked schedule;
//!   reload, resize and render
//! - [`config::FrameConfig`] - the authored configuration, loaded from TOML
//! - [`renderer::bake()`] - one bake over a target registry and state cache
//! - [`gpu::RenderBackend`] - the GPU seam, with a recording headless
//!   implementation and a wgpu one
//!
//! # Architecture
//!
//! Baking is the only place GPU objects are created. Each successful bake
//! is published through a lock-free triple buffer; the frame executor reads
//! the latest table and replays it without allocating, so an executor on
//! another thread never observes a half-built schedule.

pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod renderer;
pub mod util;

pub use engine::PassEngine;
pub use error::PassbakeError;
