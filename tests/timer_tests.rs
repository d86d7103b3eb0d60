// Host-side tests for the simulated timer host.

use chordbank_core::*;
use std::time::Duration;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn fires_in_due_order() {
    let mut t = VirtualTimers::new();
    t.arm(TimerId::from_raw(1), ms(300)).unwrap();
    t.arm(TimerId::from_raw(2), ms(100)).unwrap();
    t.arm(TimerId::from_raw(3), ms(200)).unwrap();
    assert_eq!(t.pending(), 3);

    let order: Vec<u64> = std::iter::from_fn(|| t.pop_due(ms(1000))).map(TimerId::raw).collect();
    assert_eq!(order, vec![2, 3, 1]);
    assert_eq!(t.now(), ms(300));
    assert_eq!(t.pending(), 0);
}

#[test]
fn equal_deadlines_fire_in_arm_order() {
    let mut t = VirtualTimers::new();
    for id in [7, 3, 5] {
        t.arm(TimerId::from_raw(id), ms(50)).unwrap();
    }
    let order: Vec<u64> = std::iter::from_fn(|| t.pop_due(ms(50))).map(TimerId::raw).collect();
    assert_eq!(order, vec![7, 3, 5]);
}

#[test]
fn nothing_fires_early() {
    let mut t = VirtualTimers::new();
    t.arm(TimerId::from_raw(1), ms(100)).unwrap();
    assert_eq!(t.pop_due(ms(99)), None);
    assert_eq!(t.pop_due(ms(100)), Some(TimerId::from_raw(1)));
}

#[test]
fn cancelled_timers_never_fire() {
    let mut t = VirtualTimers::new();
    t.arm(TimerId::from_raw(1), ms(10)).unwrap();
    t.arm(TimerId::from_raw(2), ms(20)).unwrap();
    t.cancel(TimerId::from_raw(1));
    assert_eq!(t.pending(), 1);
    assert_eq!(t.pop_due(ms(100)), Some(TimerId::from_raw(2)));
    assert_eq!(t.pop_due(ms(100)), None);
}

#[test]
fn delays_are_relative_to_the_clock() {
    let mut t = VirtualTimers::new();
    t.set_now(ms(500));
    t.arm(TimerId::from_raw(1), ms(100)).unwrap();
    assert_eq!(t.pop_due(ms(550)), None);
    assert_eq!(t.pop_due(ms(600)), Some(TimerId::from_raw(1)));

    // the clock never runs backwards
    t.set_now(ms(10));
    assert_eq!(t.now(), ms(600));
}
