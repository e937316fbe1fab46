//! Fence integration tests.
//!
//! Verify monotonic signalling, the `landed <= signalled` invariant while work
//! is still in flight, and GPU-side waits between queues.

mod common;

use rstest::rstest;

use common::{Mode, TestContext, init_logging};
#[cfg(not(feature = "fatal-contracts"))]
use tandem_graphics::GraphicsError;

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_landed_never_exceeds_signalled(#[case] mode: Mode) {
    init_logging();
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("signals").unwrap();
    let fence = ctx.render.create_fence();

    for value in 1..=8 {
        fence.signal(&queue, value).unwrap();
        assert!(fence.last_landed_value() <= fence.last_signalled_value());
    }
    if mode == Mode::Deferred {
        assert_eq!(fence.last_landed_value(), 0);
        ctx.poll();
    }
    fence.wait_cpu(8).unwrap();
    assert_eq!(fence.last_landed_value(), 8);
    assert_eq!(fence.last_signalled_value(), 8);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_landed_value_is_monotonic(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("signals").unwrap();
    let fence = ctx.render.create_fence();

    let mut previous = 0;
    for value in [1, 2, 5, 9] {
        fence.signal(&queue, value).unwrap();
        ctx.poll();
        let landed = fence.last_landed_value();
        assert!(landed >= previous);
        previous = landed;
    }
    fence.wait_cpu(9).unwrap();
    assert!(fence.is_complete(9));
}

#[cfg(not(feature = "fatal-contracts"))]
#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_non_increasing_signal_fails(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("signals").unwrap();
    let fence = ctx.render.create_fence();

    fence.signal(&queue, 3).unwrap();
    assert_eq!(
        fence.signal(&queue, 3),
        Err(GraphicsError::NonMonotonicSignal { value: 3, last: 3 })
    );
    assert_eq!(
        fence.signal(&queue, 2),
        Err(GraphicsError::NonMonotonicSignal { value: 2, last: 3 })
    );
    assert_eq!(fence.last_signalled_value(), 3);
    fence.signal(&queue, 4).unwrap();
}

#[cfg(not(feature = "fatal-contracts"))]
#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_wait_on_unsignalled_value_fails(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("signals").unwrap();
    let fence = ctx.render.create_fence();

    fence.signal(&queue, 1).unwrap();
    assert_eq!(
        fence.wait_cpu(2),
        Err(GraphicsError::WaitOnUnsignalledValue { value: 2, last: 1 })
    );
    assert_eq!(
        fence.wait(&queue, 2),
        Err(GraphicsError::WaitOnUnsignalledValue { value: 2, last: 1 })
    );
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_wait_cpu_on_landed_value_returns(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let fence = ctx.render.create_fence();
    // Zero has always landed.
    fence.wait_cpu(0).unwrap();
    assert!(fence.is_complete(0));
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_gpu_wait_orders_queues(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let producer = ctx.render.create_queue("producer").unwrap();
    let consumer = ctx.render.create_queue("consumer").unwrap();
    let ready = ctx.render.create_fence();
    let done = ctx.render.create_fence();

    ready.signal(&producer, 1).unwrap();
    ready.wait(&consumer, 1).unwrap();
    done.signal(&consumer, 1).unwrap();

    done.wait_cpu(1).unwrap();
    assert!(ready.is_complete(1));
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_gpu_wait_across_devices(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let render_queue = ctx.render.create_queue("render").unwrap();
    let present_queue = ctx.present.create_queue("present").unwrap();
    let rendered = ctx.render.create_fence();
    let presented = ctx.present.create_fence();

    rendered.signal(&render_queue, 1).unwrap();
    rendered.wait(&present_queue, 1).unwrap();
    presented.signal(&present_queue, 1).unwrap();

    presented.wait_cpu(1).unwrap();
    assert_eq!(rendered.last_landed_value(), 1);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_signal_from_other_adapter_rejected(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let present_queue = ctx.present.create_queue("present").unwrap();
    let fence = ctx.render.create_fence();
    assert!(fence.signal(&present_queue, 1).is_err());
    assert_eq!(fence.last_signalled_value(), 0);
}

#[cfg(feature = "fatal-contracts")]
#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
#[should_panic(expected = "contract violation")]
fn test_non_increasing_signal_panics(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("signals").unwrap();
    let fence = ctx.render.create_fence();

    fence.signal(&queue, 3).unwrap();
    let _ = fence.signal(&queue, 2);
}
