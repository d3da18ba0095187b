//! # roomctl-domain
//!
//! Pure domain model for the roomctl room-automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Devices** (relay-backed switches and built-in helper devices)
//!   and the **Commands** each kind understands
//! - Define **Scenes** (ordered lists of atomic actions)
//! - Define **Inputs** (dry-contact channels and panel buttons)
//! - The **presence** debounce state machine and its timeout guards
//! - The **panel** press/release edge detector
//! - The **room-state** tag set and the **events** the engine emits
//! - The **layout** that bundles all of the above for the registry
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or an async runtime.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod device;
pub mod event;
pub mod input;
pub mod layout;
pub mod panel;
pub mod presence;
pub mod room_state;
pub mod scene;
