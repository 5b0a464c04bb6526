// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Reusable strategies for envelope property tests.

use std::collections::BTreeMap;
use std::time::Duration;

use proptest::prelude::*;
use pushlink_core::envelope::MAX_TIME_TO_LIVE;

/// Registration tokens: non-empty, URL-safe.
pub fn token_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_:-]{1,64}"
}

/// Message ids in the client's own format.
pub fn message_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}".prop_map(|s| format!("m-{}", s))
}

/// Payload keys and values, including characters JSON must escape.
pub fn payload_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[A-Za-z_]{1,16}", ".{0,40}", 0..8)
}

pub fn collapse_key_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z_]{1,20}")
}

/// Time-to-live within the accepted range.
pub fn ttl_strategy() -> impl Strategy<Value = Option<Duration>> {
    prop::option::of((0..=MAX_TIME_TO_LIVE.as_secs()).prop_map(Duration::from_secs))
}
