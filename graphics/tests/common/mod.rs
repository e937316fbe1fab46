//! Common utilities for integration tests.
//!
//! Every test runs against both execution modes of the software backend:
//! worker threads that consume GPU work as soon as it is submitted, and a
//! deferred timeline that only makes progress when polled. The deferred mode
//! models a GPU that lands work arbitrarily late.

#![allow(dead_code)]

use std::sync::Arc;

use tandem_graphics::{
    AdapterInfo, AdapterPreference, BarrierState, ExecutionMode, Format, GraphicsDevice,
    GraphicsInstance, InstanceParameters, Queue, Resource, ResourceDescriptor,
};

/// Execution modes under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Threaded,
    Deferred,
}

impl Mode {
    pub fn execution_mode(self) -> ExecutionMode {
        match self {
            Mode::Threaded => ExecutionMode::Threaded,
            Mode::Deferred => ExecutionMode::Deferred,
        }
    }

    /// Convert to InstanceParameters for creating a GraphicsInstance.
    pub fn to_instance_parameters(self) -> InstanceParameters {
        InstanceParameters::new().with_execution_mode(self.execution_mode())
    }
}

/// Test context holding an instance and one device per adapter class.
pub struct TestContext {
    pub mode: Mode,
    pub instance: Arc<GraphicsInstance>,
    /// Device on the largest adapter.
    pub render: Arc<GraphicsDevice>,
    /// Device on the smallest eligible adapter.
    pub present: Arc<GraphicsDevice>,
}

impl TestContext {
    pub fn new(mode: Mode) -> Self {
        Self::with_parameters(mode, mode.to_instance_parameters())
    }

    /// Context where both devices are bound to the same single adapter.
    pub fn single_adapter(mode: Mode) -> Self {
        Self::with_parameters(
            mode,
            mode.to_instance_parameters()
                .with_adapters(vec![AdapterInfo::new("Only GPU", 2048)]),
        )
    }

    fn with_parameters(mode: Mode, params: InstanceParameters) -> Self {
        let instance =
            GraphicsInstance::with_parameters(params).expect("Failed to create instance");
        let render = instance
            .create_device(AdapterPreference::Discrete)
            .expect("Failed to create render device");
        let present = instance
            .create_device(AdapterPreference::Integrated)
            .expect("Failed to create present device");
        Self {
            mode,
            instance,
            render,
            present,
        }
    }

    /// Run deferred work until nothing can progress. No-op when threaded.
    pub fn poll(&self) -> usize {
        self.instance.poll()
    }
}

/// Create an RGBA8 2D texture.
pub fn texture(device: &Arc<GraphicsDevice>, width: u32, height: u32, shared: bool) -> Arc<Resource> {
    device
        .create_resource(
            &ResourceDescriptor::texture_2d(width, height, Format::Rgba8Unorm).with_shared(shared),
        )
        .expect("Failed to create texture")
}

/// Generate a recognizable RGBA pattern.
pub fn test_pattern(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(((x + y) % 256) as u8);
            data.push(255);
        }
    }
    data
}

/// Record `Common -> CopyDestination`, a full copy and the transition back.
pub fn record_copy(queue: &Queue, dst: &Resource, src: &Resource) -> u64 {
    let mut list = queue.start_recording().expect("Failed to start recording");
    list.barrier(dst, BarrierState::Common, BarrierState::CopyDestination)
        .expect("Failed to record barrier");
    list.copy(dst, src).expect("Failed to record copy");
    list.barrier(dst, BarrierState::CopyDestination, BarrierState::Common)
        .expect("Failed to record barrier");
    queue.execute(list).expect("Failed to execute")
}

/// Initialize logging for a test binary. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
