// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for reply right management.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::platform::{CallerId, MockEvent, MockKernel, ReplyPath};
use std::vec;
use tether_abi::Badge;

const EP: CapSlot = CapSlot::new(1);
const STORAGE: ReplyStorage = ReplyStorage::new(CapSlot::new(2), CapSlot::new(40));

fn kernel_with_call() -> MockKernel {
    let mut kernel = MockKernel::new();
    kernel.push_call(CallerId(1), Badge::NONE, &[]);
    kernel.push_call(CallerId(2), Badge::NONE, &[]);
    kernel.recv(EP, None).unwrap();
    kernel
}

#[test]
fn declare_needs_storage() {
    let mut manager = ReplyCapManager::new();
    assert_eq!(
        manager.declare(),
        Err(DeclareError {
            alloc_bytes: core::mem::size_of::<CapSlot>()
        })
    );

    let mut null = ReplyCapManager::with_storage(ReplyStorage::new(CapSlot::new(2), CapSlot::NULL));
    assert!(null.declare().is_err());

    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.declare().unwrap();
    assert!(manager.is_declared());
    assert!(!manager.is_preserved());
}

#[test]
fn unprotected_right_replies_fast() {
    let mut kernel = kernel_with_call();
    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.declare().unwrap();

    let right = manager.right().unwrap();
    let outcome = right
        .reply(&mut kernel, EP, STORAGE.cnode, MessageInfo::EMPTY)
        .unwrap();
    assert!(matches!(outcome, ReplyOutcome::Received(_)));
    assert_eq!(
        kernel.replies(),
        vec![(CallerId(1), &[][..], ReplyPath::Fast)]
    );
}

#[test]
fn protected_right_replies_through_storage() {
    let mut kernel = kernel_with_call();
    kernel.push_nested_reply(&[]);
    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.declare().unwrap();

    manager.protect(&mut kernel).unwrap();
    assert!(manager.is_preserved());
    // Protecting twice is harmless.
    manager.protect(&mut kernel).unwrap();
    kernel.call(CapSlot::new(9), MessageInfo::EMPTY).unwrap();

    let right = manager.right().unwrap();
    assert_eq!(right, ReplyRight::Preserved(STORAGE.slot));
    right
        .reply(&mut kernel, EP, STORAGE.cnode, MessageInfo::EMPTY)
        .unwrap();
    assert_eq!(
        kernel.replies(),
        vec![(CallerId(1), &[][..], ReplyPath::Preserved)]
    );
    let saves = kernel
        .events()
        .iter()
        .filter(|e| matches!(e, MockEvent::Saved { .. }))
        .count();
    assert_eq!(saves, 1);
}

#[test]
fn protect_without_declare_is_noop() {
    let mut kernel = kernel_with_call();
    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.protect(&mut kernel).unwrap();
    assert!(!manager.is_preserved());
    assert!(kernel.events().iter().all(|e| !matches!(e, MockEvent::Saved { .. })));
}

#[test]
fn failed_protect_keeps_fast_slot() {
    let mut kernel = kernel_with_call();
    kernel.fail_next_save_caller(KernelError::Syscall(2));
    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.declare().unwrap();
    assert_eq!(manager.protect(&mut kernel), Err(KernelError::Syscall(2)));
    assert_eq!(manager.right(), Some(ReplyRight::FastSlot));
    assert_eq!(manager.take_failure(), Some(KernelError::Syscall(2)));
    assert_eq!(manager.take_failure(), None);
}

#[test]
fn declare_clears_earlier_failure() {
    let mut kernel = kernel_with_call();
    kernel.fail_next_save_caller(KernelError::Syscall(2));
    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.declare().unwrap();
    manager.protect(&mut kernel).unwrap_err();

    manager.declare().unwrap();
    assert_eq!(manager.take_failure(), None);
}

#[test]
fn failed_rederive_receives_nothing() {
    let mut kernel = kernel_with_call();
    let right = ReplyRight::FastSlot.preserve(&mut kernel, STORAGE).unwrap();
    kernel.fail_next_rederive(KernelError::Syscall(5));
    let outcome = right
        .reply(&mut kernel, EP, STORAGE.cnode, MessageInfo::EMPTY)
        .unwrap();
    assert_eq!(
        outcome,
        ReplyOutcome::Failed(ReplyError {
            syscall: Syscall::RederiveReply,
            error: KernelError::Syscall(5),
        })
    );
    assert!(kernel.replies().is_empty());
    assert_eq!(kernel.pending_calls(), 1);
}

#[test]
fn abandon_forgets_right() {
    let mut manager = ReplyCapManager::with_storage(STORAGE);
    manager.declare().unwrap();
    manager.abandon();
    assert_eq!(manager.right(), None);
    assert!(!manager.is_declared());
}
