//! # Process Scheduler
//!
//! A polling background process scheduler with bounded concurrency and
//! durable task state.
//!
//! Task records live in a [`core::TaskStore`]. A [`core::Scheduler`] wakes on
//! a fixed interval, counts the records already running, and admits the
//! oldest pending records into the free slots. Each admitted record is
//! claimed atomically, so two scheduler instances sharing a store never run
//! the same record twice.
//!
//! Execution goes through the [`core::Process`] contract: `setup`, then
//! `run_process`, then `teardown`, which always runs. The outcome lands on
//! the record exactly once, as `Completed` or as `Failed` with a short
//! message and a debug detail, and then a [`core::CompletionEvent`] is
//! published.
//!
//! ## Key Features
//!
//! - **Bounded Concurrency**: never more running records than `max_concurrent_tasks`
//! - **FIFO Admission**: oldest `created_at` first, ties broken by id
//! - **Atomic Claims**: a lost claim is skipped, never executed
//! - **Failure Capture**: recognized [`core::TaskError`]s keep their message; anything else is an "unexpected error" with a trace
//! - **Pluggable Stores**: in-memory, and a JSON-lines file store that survives restarts
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use process_scheduler::builders::SchedulerBuilder;
//! use process_scheduler::config::SchedulerConfig;
//! use process_scheduler::infra::InMemoryTaskStore;
//! use process_scheduler::runtime::TokioSpawner;
//!
//! let scheduler = SchedulerBuilder::new(SchedulerConfig::default())
//!     .store(Arc::new(InMemoryTaskStore::new()))
//!     .process("resize", |_| Box::new(ResizeImage::default()))?
//!     .build(TokioSpawner::current())?;
//! scheduler.run_until(shutdown_signal()).await;
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - admission loop scenarios
//! - `tests/executor_test.rs` - lifecycle and failure capture
//! - `src/bin/process_server.rs` - the `process-server` command line

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: records, stores, processes and the loop.
pub mod core;
/// Configuration models for concurrency, polling and logging.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Infrastructure adapters for task stores and bundled processes.
pub mod infra;
/// Runtime adapters and operational API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
