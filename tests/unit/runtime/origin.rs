use super::*;

#[test]
fn live_origin_runs_completions() {
    let origin = OriginContext::new("ui");
    let handle = origin.handle();
    let mut ran = false;

    assert!(handle.is_alive());
    assert!(handle.run_if_alive(|| ran = true));
    assert!(ran);
    assert_eq!(origin.label(), "ui");
}

#[test]
fn disposed_origin_drops_completions() {
    let origin = OriginContext::new("ui");
    let handle = origin.handle();
    let copy = handle.clone();
    origin.dispose();

    let mut ran = false;
    assert!(!handle.is_alive());
    assert!(!copy.run_if_alive(|| ran = true));
    assert!(!ran);
}

#[test]
fn detached_handle_is_never_alive() {
    let handle = OriginHandle::detached();
    assert!(!handle.is_alive());
    assert!(!handle.run_if_alive(|| panic!("must not run")));
}
