// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Worker thread identity.

use core::fmt;

/// Worker thread index within a component.
///
/// Workers are kernel threads (TCBs) that service interfaces. The set of
/// worker identities is fixed when the component is built: one control
/// thread plus one thread per interface end. Per-worker storage is indexed
/// by this small integer rather than by thread address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct WorkerId(u16);

impl WorkerId {
    /// The control thread of a component.
    pub const CONTROL: Self = Self(0);

    /// Maximum number of workers per component.
    pub const MAX_WORKERS: u16 = 256;

    /// Creates a new worker ID.
    ///
    /// Returns `None` if the ID exceeds `MAX_WORKERS`.
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Option<Self> {
        if id < Self::MAX_WORKERS {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Returns the raw worker index.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the worker index as usize (for array indexing).
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkerId({})", self.0)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker:{}", self.0)
    }
}
