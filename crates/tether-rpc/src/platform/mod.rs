// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Kernel implementations.
//!
//! The seL4 implementation is compiled with the `sel4` feature. The host
//! simulation needs `std` and backs every test of the dispatch loop.


// Mock requires alloc, only available with std or test
#[cfg(any(test, feature = "std"))]
mod mock;
#[cfg(feature = "sel4")]
mod sel4_impl;

#[cfg(any(test, feature = "std"))]
pub use mock::{CallerId, MockEvent, MockFastTransport, MockKernel, RecordingSink, ReplyPath};
#[cfg(feature = "sel4")]
pub use sel4_impl::Sel4Kernel;
