//! Cross-device resource sharing tests.
//!
//! A texture rendered on one adapter is imported on another and copied into a
//! resource there; the import must observe the owner's writes.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Mode, TestContext, init_logging, record_copy, test_pattern, texture};
use tandem_graphics::{
    AdapterInfo, AdapterPreference, BarrierState, GraphicsError, GraphicsInstance, ImageData,
    InstanceParameters, ResourceOrigin, select_adapter, upload_image,
};

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_same_adapter_returns_input(#[case] mode: Mode) {
    let ctx = TestContext::single_adapter(mode);
    assert!(ctx.render.is_same_adapter(&ctx.present));

    let source = texture(&ctx.render, 4, 4, false);
    let shared = ctx.present.create_shared_resource(&ctx.render, &source).unwrap();
    assert!(Arc::ptr_eq(&source, &shared));
    assert_eq!(ctx.instance.open_shared_handle_count(), 0);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_import_sees_owner_writes(#[case] mode: Mode) {
    init_logging();
    let ctx = TestContext::new(mode);
    assert!(!ctx.render.is_same_adapter(&ctx.present));
    let (width, height) = (16, 8);

    let render_queue = ctx.render.create_queue("render").unwrap();
    let present_queue = ctx.present.create_queue("present").unwrap();

    let source = texture(&ctx.render, width, height, true);
    let imported = ctx.present.create_shared_resource(&ctx.render, &source).unwrap();
    assert_eq!(imported.origin(), ResourceOrigin::Imported);
    assert_eq!(imported.adapter(), ctx.present.adapter());
    assert_eq!(imported.descriptor(), source.descriptor());
    assert!(imported.shares_memory_with(&source));
    // The export handle is closed as soon as the import exists.
    assert_eq!(ctx.instance.open_shared_handle_count(), 0);

    // Write after import: the other device must still observe it.
    let pattern = test_pattern(width, height);
    let image = ImageData::from_rgba8(width, height, pattern.clone()).unwrap();
    upload_image(&render_queue, &source, &image).unwrap();

    let target = texture(&ctx.present, width, height, false);
    record_copy(&present_queue, &target, &imported);
    present_queue.flush().unwrap();

    assert_eq!(target.read_contents(), pattern);
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_imports_track_barrier_state_separately(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let source = texture(&ctx.present, 4, 4, true);
    let imported = ctx.render.create_shared_resource(&ctx.present, &source).unwrap();

    let queue = ctx.render.create_queue("render").unwrap();
    let mut list = queue.start_recording().unwrap();
    list.barrier(&imported, BarrierState::Common, BarrierState::CopyDestination)
        .unwrap();
    assert_eq!(imported.state(), BarrierState::CopyDestination);
    assert_eq!(source.state(), BarrierState::Common);
    drop(list);
}

#[cfg(not(feature = "fatal-contracts"))]
#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_unshared_resource_rejected(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let source = texture(&ctx.render, 4, 4, false);
    assert_eq!(
        ctx.present
            .create_shared_resource(&ctx.render, &source)
            .unwrap_err(),
        GraphicsError::NotShareable
    );
}

#[rstest]
#[case::threaded(Mode::Threaded)]
#[case::deferred(Mode::Deferred)]
fn test_wrong_owner_rejected(#[case] mode: Mode) {
    let ctx = TestContext::new(mode);
    let source = texture(&ctx.render, 4, 4, true);
    assert!(matches!(
        ctx.render.create_shared_resource(&ctx.present, &source),
        Err(GraphicsError::InvalidParameter(_))
    ));
}

#[test]
fn test_sharing_requires_capability_on_both_adapters() {
    let instance = GraphicsInstance::with_parameters(InstanceParameters::new().with_adapters(vec![
        AdapterInfo::new("Legacy iGPU", 256).with_cross_adapter_sharing(false),
        AdapterInfo::new("Discrete", 4096),
    ]))
    .unwrap();
    let render = instance.create_device(AdapterPreference::Discrete).unwrap();
    let present = instance.create_device(AdapterPreference::Integrated).unwrap();
    assert!(!present.capabilities().cross_adapter_sharing);

    let source = texture(&render, 4, 4, true);
    assert!(matches!(
        present.create_shared_resource(&render, &source),
        Err(GraphicsError::FeatureNotSupported(_))
    ));
    assert_eq!(instance.open_shared_handle_count(), 0);
}

#[test]
fn test_adapter_selection_over_memory_sizes() {
    let adapters = vec![
        AdapterInfo::new("Basic Render Driver", 0),
        AdapterInfo::new("Small", 256),
        AdapterInfo::new("Medium", 1024),
        AdapterInfo::new("Large", 4096),
    ];
    assert_eq!(select_adapter(&adapters, AdapterPreference::Integrated), Some(1));
    assert_eq!(select_adapter(&adapters, AdapterPreference::Discrete), Some(3));

    let instance =
        GraphicsInstance::with_parameters(InstanceParameters::new().with_adapters(adapters))
            .unwrap();
    let device = instance.create_device(AdapterPreference::Integrated).unwrap();
    assert_eq!(device.name(), "Small");
}

#[test]
fn test_no_eligible_adapter() {
    let instance = GraphicsInstance::with_parameters(
        InstanceParameters::new().with_adapters(vec![AdapterInfo::new("Basic Render Driver", 0)]),
    )
    .unwrap();
    assert_eq!(
        instance
            .create_device(AdapterPreference::Discrete)
            .unwrap_err(),
        GraphicsError::NoSuitableAdapter(AdapterPreference::Discrete)
    );
}
