// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for capability slot and badge types.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::badge::Badge;
use super::cap::CapSlot;

use std::format;

#[test]
fn cap_slot_null() {
    assert!(CapSlot::NULL.is_null());
    assert!(!CapSlot::new(7).is_null());
    assert_eq!(CapSlot::default(), CapSlot::NULL);
}

#[test]
fn cap_slot_non_null() {
    assert_eq!(CapSlot::NULL.non_null(), None);
    assert_eq!(CapSlot::new(12).non_null(), Some(CapSlot::new(12)));
}

#[test]
fn cap_slot_formatting() {
    let slot = CapSlot::new(42);
    assert_eq!(format!("{slot:?}"), "CapSlot(42)");
    assert_eq!(format!("{slot}"), "slot:42");
}

#[test]
fn badge_round_trip() {
    let badge = Badge::new(0xdead_beef);
    assert_eq!(badge.as_u64(), 0xdead_beef);
    assert_eq!(Badge::default(), Badge::NONE);
    assert_eq!(format!("{badge}"), "badge:3735928559");
}
