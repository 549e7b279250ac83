// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Sender badge type.

use core::fmt;

/// Sender identity attached to an endpoint capability.
///
/// The kernel delivers the badge of the capability a caller invoked along
/// with every received message. Servers use it to tell callers apart.
/// Badge 0 is a valid badge (the first automatically assigned one).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Badge(u64);

impl Badge {
    /// The badge reported before anything has been received.
    pub const NONE: Self = Self(0);

    /// Creates a new badge.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw badge value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Badge({})", self.0)
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "badge:{}", self.0)
    }
}
