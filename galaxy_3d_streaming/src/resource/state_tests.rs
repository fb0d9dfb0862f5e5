use super::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::thread;

#[test]
fn test_transition_from_expected_state() {
    let state = AtomicResourceState::new(ResourceState::Empty);
    assert!(state.transition(ResourceState::Empty, ResourceState::Loading));
    assert_eq!(state.load(), ResourceState::Loading);
}

#[test]
fn test_transition_from_wrong_state_fails() {
    let state = AtomicResourceState::new(ResourceState::Waiting);
    assert!(!state.transition(ResourceState::Empty, ResourceState::Loading));
    assert_eq!(state.load(), ResourceState::Waiting);
}

#[test]
fn test_store_round_trips_every_state() {
    let state = AtomicResourceState::new(ResourceState::Empty);
    for s in [
        ResourceState::Loading,
        ResourceState::Waiting,
        ResourceState::Testing,
        ResourceState::Ready,
        ResourceState::Empty,
    ] {
        state.store(s);
        assert_eq!(state.load(), s);
    }
}

#[test]
fn test_single_winner_under_contention() {
    let state = Arc::new(AtomicResourceState::new(ResourceState::Empty));
    let winners = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..16)
        .map(|_| {
            let state = Arc::clone(&state);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                for _ in 0..1000 {
                    if state.transition(ResourceState::Empty, ResourceState::Loading) {
                        winners.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(winners.load(std::sync::atomic::Ordering::SeqCst), 1);
}
