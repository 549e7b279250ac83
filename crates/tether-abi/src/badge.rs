// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Badge assignment for the caller ends of a connection.
//!
//! Every caller end of an RPC connection holds a badged copy of the server's
//! endpoint capability so the server can tell callers apart. Badges are
//! chosen when the component system is built:
//!
//! 1. Ends with an explicitly configured badge keep it.
//! 2. Remaining ends receive the lowest badges not explicitly claimed,
//!    handed out in declaration order starting at 0.

use crate::types::Badge;
use core::fmt;

/// Error from badge assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadgeError {
    /// The output slice length differs from the number of caller ends.
    LengthMismatch {
        /// Number of caller ends.
        ends: usize,
        /// Length of the output slice.
        out: usize,
    },
}

impl fmt::Display for BadgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { ends, out } => {
                write!(f, "{ends} caller ends but {out} badge slots")
            }
        }
    }
}

/// Assigns a badge to every caller end.
///
/// `explicit[i]` is the configured badge of end `i`, if any. The assigned
/// badge of end `i` is written to `out[i]`.
///
/// # Errors
///
/// Returns [`BadgeError::LengthMismatch`] if `out` and `explicit` differ in length.
pub fn assign_badges(explicit: &[Option<Badge>], out: &mut [Badge]) -> Result<(), BadgeError> {
    if explicit.len() != out.len() {
        return Err(BadgeError::LengthMismatch {
            ends: explicit.len(),
            out: out.len(),
        });
    }

    let claimed = |candidate: u64| explicit.iter().flatten().any(|b| b.as_u64() == candidate);

    let mut next: u64 = 0;
    for (slot, configured) in out.iter_mut().zip(explicit) {
        // Every end consumes a default badge, even one that ends up using
        // its explicit badge, so defaults stay stable per declaration index.
        while claimed(next) {
            next += 1;
        }
        let default = Badge::new(next);
        next += 1;

        *slot = configured.unwrap_or(default);
    }

    Ok(())
}
