use super::*;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::Duration,
};

use crate::{
    foundation::core::Rgba8,
    image::PlatformTraits,
    paint::DisplayListBuilder,
    runtime::OriginContext,
    snapshot::SnapshotSources,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn controller() -> Arc<SnapshotController> {
    Arc::new(SnapshotController::new(
        Arc::new(SnapshotSources::default()),
        PlatformTraits::HOST,
    ))
}

fn content(size: ISize) -> SnapshotRequest {
    let list = DisplayListBuilder::new()
        .fill_rect(size.to_rect(), Rgba8::opaque(0, 0, 255))
        .build();
    SnapshotRequest::Content { list, size }
}

#[test]
fn result_is_delivered_on_the_ui_runner() {
    let runners = TaskRunners::spawn("snap").unwrap();
    let origin = OriginContext::new("ui");
    let (tx, rx) = mpsc::channel();
    let ui = Arc::clone(&runners.ui);

    assert!(request_snapshot(
        &runners,
        controller(),
        origin.handle(),
        content(ISize::new(6, 6)),
        move |image| tx.send((ui.runs_tasks_on_current_thread(), image)).unwrap(),
    ));
    let (on_ui, image) = rx.recv_timeout(TIMEOUT).unwrap();
    let image = image.unwrap();

    assert!(on_ui);
    assert_eq!(image.size(), ISize::new(6, 6));
    assert_eq!(image.pixel(3, 3), Some([0, 0, 255, 255]));
}

#[test]
fn failed_snapshots_deliver_none() {
    let runners = TaskRunners::spawn("snap.none").unwrap();
    let origin = OriginContext::new("ui");
    let (tx, rx) = mpsc::channel();
    let descriptor = crate::image::TextureDescriptor::from_raw(&[1, 0, 100, 200, 99]).unwrap();

    request_snapshot(
        &runners,
        controller(),
        origin.handle(),
        SnapshotRequest::Texture(descriptor),
        move |image| tx.send(image.is_none()).unwrap(),
    );
    assert!(rx.recv_timeout(TIMEOUT).unwrap());
}

#[test]
fn disposed_origin_never_sees_the_result() {
    let runners = TaskRunners::spawn("snap.gone").unwrap();
    let origin = OriginContext::new("ui");
    let handle = origin.handle();
    origin.dispose();
    let called = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&called);
    request_snapshot(&runners, controller(), handle, content(ISize::new(2, 2)), move |_| {
        flag.store(true, Ordering::SeqCst);
    });

    // Both runners are serial: once this marker reaches the ui runner, the completion has
    // already been processed.
    let (tx, rx) = mpsc::channel();
    let ui = Arc::clone(&runners.ui);
    runners.raster.post_task(move || {
        ui.post_task(move || tx.send(()).unwrap());
    });
    rx.recv_timeout(TIMEOUT).unwrap();
    assert!(!called.load(Ordering::SeqCst));
}

#[test]
fn delivery_is_never_synchronous() {
    let runners = TaskRunners::single_threaded("snap.single").unwrap();
    let origin = OriginContext::new("ui");
    let handle = origin.handle();
    let delivered = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let inner = runners.clone();
    let flag = Arc::clone(&delivered);
    let done = tx.clone();
    runners.ui.post_task(move || {
        let flag_in_cb = Arc::clone(&flag);
        request_snapshot(&inner, controller(), handle, content(ISize::new(2, 2)), move |image| {
            flag_in_cb.store(true, Ordering::SeqCst);
            done.send(("callback", image.is_some())).unwrap();
        });
        tx.send(("returned", flag.load(Ordering::SeqCst))).unwrap();
    });

    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("returned", false));
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), ("callback", true));
    assert!(delivered.load(Ordering::SeqCst));
}
