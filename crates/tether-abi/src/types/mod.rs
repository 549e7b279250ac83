// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Core type definitions for sender badges, capability slots, and workers.
//!
//! These newtypes prevent accidentally mixing different ID types at compile time.

mod badge;
mod cap;
mod id;

#[cfg(test)]
mod cap_test;

pub use badge::Badge;
pub use cap::CapSlot;
pub use id::WorkerId;
