//! # roomctl-app
//!
//! Application layer: the orchestration engine and the **port definitions**
//! (traits) it drives.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `RelayBus`: switch relay channels and read back their state
//!   - `PanelBus`: write panel backlight masks
//!   - `Clock`: local wall-clock hour, when known
//!   - `EventPublisher`: observational events (mode changes, device
//!     operations, scene runs, state reports)
//! - Provide the **driving entry point**, [`engine::Orchestrator`]: channel
//!   and panel report ingestion, scene run / cancel / pause
//! - Provide **in-process infrastructure** that doesn't need IO: the
//!   indicator coalescer and the broadcast event bus
//!
//! ## Dependency rule
//! Depends on `roomctl-domain` only (plus `tokio` for tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod coalescer;
pub mod context;
pub mod engine;
pub mod event_bus;
pub mod ports;
pub mod registry;
