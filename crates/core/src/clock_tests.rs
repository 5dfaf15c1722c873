// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[test]
fn system_clock_does_not_go_backwards() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(std::time::Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 >= t1);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::default();
    let t1 = clock.now();
    clock.advance(Duration::days(3));
    assert_eq!(clock.now() - t1, Duration::days(3));
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::default();
    let clock2 = clock1.clone();
    let t1 = clock1.now();
    clock2.advance(Duration::seconds(30));
    assert_eq!(clock1.now() - t1, Duration::seconds(30));
}

#[test]
fn fake_clock_set() {
    let clock = FakeClock::default();
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    clock.set(at);
    assert_eq!(clock.now(), at);
}
