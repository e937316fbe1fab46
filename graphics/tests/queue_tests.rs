//! Queue integration tests.
//!
//! The deferred mode lands work only when polled, which makes it a slow GPU:
//! these tests check that allocator recycling never resets an allocator whose
//! lists are still in flight, and that work executes in submission order.

mod common;

use rstest::rstest;

use common::{Mode, TestContext, init_logging, record_copy, test_pattern, texture};
use tandem_graphics::{BarrierState, ImageData, upload_image};

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_submission_values_are_sequential(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("sequential").unwrap();

    for expected in 1..=16 {
        let list = queue.start_recording().unwrap();
        assert_eq!(queue.execute(list).unwrap(), expected);
    }
    queue.flush().unwrap();
    assert_eq!(queue.last_completed_value(), 16);
    assert_eq!(queue.pending_work(), 0);
    assert_eq!(queue.stats().submissions, 16);
}

#[test]
fn test_recycling_waits_for_slow_gpu() {
    init_logging();
    let ctx = TestContext::new(Mode::Deferred);
    let queue = ctx.render.create_queue("slow").unwrap();

    // Nothing lands while we keep recording; every list after the second
    // stays on the same allocator and no reset ever happens under the GPU.
    for _ in 0..10 {
        let list = queue.start_recording().unwrap();
        queue.execute(list).unwrap();
        assert_eq!(queue.last_completed_value(), 0);
    }
    let stats = queue.stats();
    assert_eq!(stats.allocator_swaps, 2);
    assert_eq!(stats.allocator_resets, 2);

    ctx.poll();
    assert_eq!(queue.last_completed_value(), 10);

    let list = queue.start_recording().unwrap();
    assert_eq!(queue.stats().allocator_swaps, 3);
    queue.execute(list).unwrap();
    queue.flush().unwrap();
}

#[test]
fn test_recycling_with_partial_progress() {
    let ctx = TestContext::new(Mode::Deferred);
    let queue = ctx.render.create_queue("partial").unwrap();

    let mut swaps = Vec::new();
    for round in 0..6 {
        let list = queue.start_recording().unwrap();
        queue.execute(list).unwrap();
        swaps.push(queue.stats().allocator_swaps);
        // Let the GPU catch up every other frame.
        if round % 2 == 1 {
            ctx.poll();
        }
    }
    // Swaps never outpace landed work: at most one per recording.
    assert!(swaps.windows(2).all(|w| w[1] - w[0] <= 1));
    assert!(queue.stats().allocator_swaps >= 3);
    queue.flush().unwrap();
    assert_eq!(queue.last_completed_value(), 6);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_open_list_blocks_swap(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("open").unwrap();

    let first = queue.start_recording().unwrap();
    let second = queue.start_recording().unwrap();
    let third = queue.start_recording().unwrap();
    assert_eq!(queue.stats().allocator_swaps, 1);

    queue.execute(second).unwrap();
    drop(third);
    queue.execute(first).unwrap();
    queue.flush().unwrap();
    assert_eq!(queue.stats().submissions, 2);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_copies_execute_in_submission_order(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("chain").unwrap();
    let (width, height) = (8, 4);

    let a = texture(&ctx.render, width, height, false);
    let b = texture(&ctx.render, width, height, false);
    let c = texture(&ctx.render, width, height, false);
    let pattern = test_pattern(width, height);
    let image = ImageData::from_rgba8(width, height, pattern.clone()).unwrap();
    upload_image(&queue, &a, &image).unwrap();

    // b <- a, then c <- b, submitted back to back without waiting.
    record_copy(&queue, &b, &a);
    record_copy(&queue, &c, &b);
    assert_eq!(c.state(), BarrierState::Common);
    queue.flush().unwrap();

    assert_eq!(c.read_contents(), pattern);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_upload_recycles_staging(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let queue = ctx.render.create_queue("upload").unwrap();
    let target = texture(&ctx.render, 4, 4, false);

    for shade in 0..5u8 {
        let image = ImageData::solid(4, 4, [shade, shade, shade, 255]);
        upload_image(&queue, &target, &image).unwrap();
        assert_eq!(&target.read_contents()[..4], &[shade, shade, shade, 255]);
    }
    // Staging buffers are released once each upload has landed.
    ctx.render.cleanup_dead_resources();
    assert_eq!(ctx.render.resource_count(), 1);
}
