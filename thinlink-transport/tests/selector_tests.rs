use pretty_assertions::assert_eq;
use thinlink_transport::{ChannelKind, SelectorDecision, TransportSelector, INITIAL_RETRIES};

use SelectorDecision::{GiveUp, RetryCurrent, SwitchTo};

fn run(selector: &mut TransportSelector, n: usize) -> Vec<SelectorDecision> {
    (0..n).map(|_| selector.next()).collect()
}

// ── Decision sequence ───────────────────────────────────────────

#[test]
fn fresh_selector_state() {
    let selector = TransportSelector::new();
    assert_eq!(selector.retries_remaining(), INITIAL_RETRIES);
    assert_eq!(selector.last_kind(), None);
    assert_eq!(selector, TransportSelector::default());
}

#[test]
fn full_sequence_from_initial_state() {
    let mut selector = TransportSelector::new();
    let expected = vec![
        RetryCurrent,
        RetryCurrent,
        RetryCurrent,
        SwitchTo(ChannelKind::Stream),
        RetryCurrent,
        RetryCurrent,
        RetryCurrent,
        SwitchTo(ChannelKind::Polling),
        RetryCurrent,
        RetryCurrent,
        RetryCurrent,
        GiveUp,
    ];
    assert_eq!(run(&mut selector, expected.len()), expected);
    assert_eq!(selector.last_kind(), Some(ChannelKind::Exhausted));
}

#[test]
fn exhausted_selector_keeps_giving_up() {
    let mut selector = TransportSelector::new();
    run(&mut selector, 12);
    assert_eq!(run(&mut selector, 5), vec![GiveUp; 5]);
}

#[test]
fn switch_restores_retry_budget() {
    let mut selector = TransportSelector::new();
    run(&mut selector, 3);
    assert_eq!(selector.retries_remaining(), 0);
    assert_eq!(selector.next(), SwitchTo(ChannelKind::Stream));
    assert_eq!(selector.retries_remaining(), INITIAL_RETRIES);
}

#[test]
fn reset_returns_to_initial_state() {
    let table: &[usize] = &[1, 4, 7, 12, 20];
    for &calls in table {
        let mut selector = TransportSelector::new();
        run(&mut selector, calls);
        selector.reset();
        assert_eq!(selector, TransportSelector::new(), "after {calls} calls");
        assert_eq!(selector.next(), RetryCurrent);
    }
}

// ── ChannelKind ─────────────────────────────────────────────────

#[test]
fn channel_kind_serde_is_lowercase() {
    assert_eq!(serde_json::to_string(&ChannelKind::Polling).unwrap(), "\"polling\"");
    let kind: ChannelKind = serde_json::from_str("\"stream\"").unwrap();
    assert_eq!(kind, ChannelKind::Stream);
    assert_eq!(ChannelKind::default(), ChannelKind::Stream);
    assert_eq!(ChannelKind::Exhausted.to_string(), "exhausted");
}
