// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Shared test infrastructure for integration tests.
//!
//! This module provides:
//! - [`store`] - A sample key/value interface with both marshallers and a handler
//! - [`Loopback`] - A caller-side kernel that services each call with a real server
//!
//! This module is **not** a test file, so it must comply with full clippy rules.
//! Test-specific allowances (like `unwrap_used`) are only permitted in `*_test.rs` files.

#![allow(dead_code, reason = "each test binary uses a different subset")]
#![allow(unused_imports, reason = "re-exports used by test files")]

pub mod loopback;
pub mod store;

pub use loopback::Loopback;
pub use store::{
    DOUBLE, DOUBLE_END, DoubleClient, DoubleMarshaller, DoubleSlots, EXPAND, FORWARD, GET, POKE,
    PUT, STORE, StoreClient, StoreHandler, StoreMarshaller, StoreRequest, StoreResponse,
    StoreSlots, UnitMarshaller,
};

use tether_abi::CapSlot;
use tether_rpc::InterfaceConfig;

/// Endpoint the sample server receives on.
pub const STORE_EP: CapSlot = CapSlot::new(10);

/// Configuration of the sample server.
#[must_use]
pub const fn store_config() -> InterfaceConfig {
    InterfaceConfig::new("kv_server", "store", STORE_EP)
}

/// Routes `tracing` output of the crate under test to the test harness.
///
/// Filtered by `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    // A second initialisation in the same binary fails and is ignored.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
