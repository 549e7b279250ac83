// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Tether RPC
//!
//! Server dispatch stub and caller stub for synchronous RPC between seL4
//! components.
//!
//! Each interface a component provides is serviced by a [`Server`]: a loop
//! that receives a call on the interface's endpoint, decodes the method
//! selector and arguments, invokes the locally implemented [`Handler`],
//! encodes the result and replies, all while managing the one-shot reply
//! right a blocking call grants.
//!
//! This crate provides:
//! - The dispatch loop and its error paths ([`dispatch`])
//! - Per-worker call storage that needs no heap ([`context`])
//! - Reply right preservation around handlers that block ([`reply`])
//! - The passive worker startup handshake ([`handshake`])
//! - The optional reduced-overhead reply path ([`fastpath`])
//! - The caller-side stub ([`client`])
//! - A host simulation of the kernel for tests ([`platform`])
//!
//! The byte-level argument encoding is not part of this crate; it is
//! plugged in through the [`marshal`] traits.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod check;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod fastpath;
pub mod handshake;
pub mod kernel;
pub mod marshal;
pub mod platform;
pub mod reply;

// Re-export commonly used types at crate root
pub use client::{CallError, Client, ClientEnd};
pub use config::InterfaceConfig;
pub use context::{CallContextArena, WorkerContext};
pub use dispatch::{Handler, Invocation, Server, ServerExit};
pub use error::{ErrorAction, ErrorKind, ErrorSink, RpcError, TracingSink};
pub use kernel::{Kernel, KernelError, Received};
pub use marshal::{ClientMarshaller, DecodeError, EncodeError, ServerMarshaller};
pub use reply::{ReplyCapManager, ReplyRight, ReplyStorage};

/// Crate version.
pub const VERSION: &str = match option_env!("TETHER_VERSION") {
    Some(v) => v,
    None => "unknown",
};
