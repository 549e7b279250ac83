// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared ABI definitions between Tether server stubs and caller stubs.
//!
//! This crate defines the contract both ends of an RPC connection agree on:
//! - Identity types for senders, capability slots, and worker threads
//! - Message framing (message info, word size, method selectors)
//! - The build-time interface description (methods, parameters, typedefs)
//! - Badge assignment for the caller ends of a connection
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Const-constructible**: Interface descriptions live in `static`s
//! - **64-bit only**: Message words are 8 bytes
//!
//! # Modules
//!
//! - [`types`]: Core ID types (`Badge`, `CapSlot`, `WorkerId`)
//! - [`ipc`]: Message info, selector encoding, buffer limits
//! - [`idl`]: Method and parameter descriptors
//! - [`badge`]: Badge assignment for connection caller ends

#![no_std]

#[cfg(test)]
extern crate std;

pub mod badge;
pub mod idl;
pub mod ipc;
pub mod types;

// Re-export commonly used types at crate root
pub use idl::{Direction, InterfaceType, Method, Parameter, TypeRef, Typedef};
pub use ipc::{MessageInfo, MethodIndex, SelectorWidth};
pub use types::{Badge, CapSlot, WorkerId};
