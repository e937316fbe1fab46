//! Graphics instance.
//!
//! The [`GraphicsInstance`] is the top-level entry point for the graphics system.
//! It owns the backend, enumerates adapters and creates one [`GraphicsDevice`]
//! per adapter role.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{self, GpuBackend};
use crate::backend::software::ExecutionMode;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;

const MB: u64 = 1024 * 1024;

static NEXT_ADAPTER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an enumerated adapter.
///
/// Two devices are bound to the same adapter exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdapterId(u64);

impl AdapterId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ADAPTER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adapter#{}", self.0)
    }
}

/// Type of graphics adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    /// Discrete GPU (dedicated graphics card).
    Discrete,
    /// Integrated GPU (shared with CPU).
    Integrated,
    /// Software renderer.
    Software,
    /// Unknown adapter type.
    Unknown,
}

/// Information about a graphics adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Adapter name.
    pub name: String,
    /// Adapter vendor.
    pub vendor: String,
    /// Device type (discrete, integrated, etc.).
    pub device_type: AdapterType,
    /// Dedicated video memory in bytes. Adapters with none are never selected.
    pub dedicated_memory: u64,
    /// Whether resources can be shared with other adapters.
    pub cross_adapter_sharing: bool,
}

impl AdapterInfo {
    /// Describe an adapter with `dedicated_memory_mb` megabytes of video memory.
    ///
    /// The device type is inferred from the memory size: none means a
    /// software rasterizer, up to 1 GB an integrated GPU, more a discrete one.
    pub fn new(name: impl Into<String>, dedicated_memory_mb: u64) -> Self {
        let device_type = match dedicated_memory_mb {
            0 => AdapterType::Software,
            1..=1024 => AdapterType::Integrated,
            _ => AdapterType::Discrete,
        };
        Self {
            name: name.into(),
            vendor: "Tandem".to_string(),
            device_type,
            dedicated_memory: dedicated_memory_mb.saturating_mul(MB),
            cross_adapter_sharing: true,
        }
    }

    /// Set the vendor string.
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Override the inferred device type.
    pub fn with_device_type(mut self, device_type: AdapterType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Enable or disable cross-adapter sharing.
    pub fn with_cross_adapter_sharing(mut self, enabled: bool) -> Self {
        self.cross_adapter_sharing = enabled;
        self
    }

    /// Dedicated memory in whole megabytes.
    pub fn dedicated_memory_mb(&self) -> u64 {
        self.dedicated_memory / MB
    }

    /// Adapters a stock machine with a hybrid GPU setup reports.
    pub fn default_set() -> Vec<Self> {
        vec![
            Self::new("Basic Render Driver", 0).with_vendor("Microsoft"),
            Self::new("Integrated Graphics", 512),
            Self::new("Discrete Graphics", 8192),
        ]
    }
}

/// Which adapter a device should be created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterPreference {
    /// The eligible adapter with the least dedicated memory.
    Integrated,
    /// The eligible adapter with the most dedicated memory.
    Discrete,
}

impl fmt::Display for AdapterPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integrated => f.write_str("integrated"),
            Self::Discrete => f.write_str("discrete"),
        }
    }
}

/// Choose an adapter index for `preference`.
///
/// Adapters without dedicated memory are skipped. `Integrated` picks the
/// minimum dedicated memory and `Discrete` the maximum; on ties the first
/// enumerated adapter wins.
pub fn select_adapter(adapters: &[AdapterInfo], preference: AdapterPreference) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, adapter) in adapters.iter().enumerate() {
        let memory = adapter.dedicated_memory;
        if memory == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, best_memory)) => match preference {
                AdapterPreference::Integrated => memory < best_memory,
                AdapterPreference::Discrete => memory > best_memory,
            },
        };
        if better {
            best = Some((index, memory));
        }
    }
    best.map(|(index, _)| index)
}

/// Graphics backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// CPU emulation of every configured adapter.
    #[default]
    Software,
}

/// Parameters for creating a [`GraphicsInstance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceParameters {
    /// Backend to create.
    pub backend: BackendType,
    /// Adapters the backend exposes, in enumeration order.
    pub adapters: Vec<AdapterInfo>,
    /// How queued GPU work is executed.
    pub execution_mode: ExecutionMode,
}

impl Default for InstanceParameters {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            adapters: AdapterInfo::default_set(),
            execution_mode: ExecutionMode::default(),
        }
    }
}

impl InstanceParameters {
    /// Create default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend type.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Replace the adapter list.
    pub fn with_adapters(mut self, adapters: Vec<AdapterInfo>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Set the execution mode.
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }
}

/// The graphics instance manages devices and adapters.
///
/// # Thread Safety
///
/// `GraphicsInstance` is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```
/// use tandem_graphics::{AdapterPreference, GraphicsInstance};
///
/// let instance = GraphicsInstance::new()?;
/// let present = instance.create_device(AdapterPreference::Integrated)?;
/// let render = instance.create_device(AdapterPreference::Discrete)?;
/// assert!(!present.is_same_adapter(&render));
/// # Ok::<(), tandem_graphics::GraphicsError>(())
/// ```
pub struct GraphicsInstance {
    /// Weak self-reference for creating devices.
    self_ref: RwLock<Weak<GraphicsInstance>>,
    /// Devices created by this instance.
    devices: RwLock<Vec<Weak<GraphicsDevice>>>,
    backend: GpuBackend,
    parameters: InstanceParameters,
}

impl GraphicsInstance {
    /// Create an instance with the default adapter set.
    ///
    /// # Errors
    ///
    /// Returns an error if the graphics system cannot be initialized.
    pub fn new() -> Result<Arc<Self>, GraphicsError> {
        Self::with_parameters(InstanceParameters::default())
    }

    /// Create an instance with explicit parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InitializationFailed`] if no adapters are configured.
    pub fn with_parameters(parameters: InstanceParameters) -> Result<Arc<Self>, GraphicsError> {
        log::info!("Creating GraphicsInstance");

        if parameters.adapters.is_empty() {
            return Err(GraphicsError::InitializationFailed(
                "no adapters configured".to_string(),
            ));
        }

        let backend = backend::create_backend(&parameters)?;
        log::info!("Using GPU backend: {}", backend.name());

        let instance = Arc::new(Self {
            self_ref: RwLock::new(Weak::new()),
            devices: RwLock::new(Vec::new()),
            backend,
            parameters,
        });
        *instance.self_ref.write() = Arc::downgrade(&instance);

        Ok(instance)
    }

    fn arc_self(&self) -> Option<Arc<GraphicsInstance>> {
        self.self_ref.read().upgrade()
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// How queued GPU work is executed.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.parameters.execution_mode
    }

    /// Enumerate available graphics adapters in backend order.
    pub fn enumerate_adapters(&self) -> Vec<AdapterInfo> {
        self.backend
            .adapters()
            .iter()
            .map(|(_, info)| info.clone())
            .collect()
    }

    /// Create a device on the adapter that best matches `preference`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::NoSuitableAdapter`] if every adapter lacks
    /// dedicated memory.
    pub fn create_device(
        &self,
        preference: AdapterPreference,
    ) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        let adapters = self.enumerate_adapters();
        let index = select_adapter(&adapters, preference)
            .ok_or(GraphicsError::NoSuitableAdapter(preference))?;
        let device = self.create_device_with_adapter(index)?;

        let info = device.adapter_info();
        log::info!(
            "Device created on the {preference} adapter: {} (Dedicated Memory: {} MB)",
            info.name,
            info.dedicated_memory_mb()
        );
        Ok(device)
    }

    /// Create a device on a specific adapter.
    ///
    /// # Arguments
    ///
    /// * `adapter_index` - Index of the adapter to use (from `enumerate_adapters`)
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter index is invalid.
    pub fn create_device_with_adapter(
        &self,
        adapter_index: usize,
    ) -> Result<Arc<GraphicsDevice>, GraphicsError> {
        let adapters = self.backend.adapters();
        let Some((adapter, info)) = adapters.get(adapter_index) else {
            return Err(GraphicsError::InvalidParameter(format!(
                "adapter index {adapter_index} out of range ({})",
                adapters.len()
            )));
        };

        let instance = self.arc_self().ok_or_else(|| {
            GraphicsError::ResourceCreationFailed("instance has been dropped".to_string())
        })?;
        let gpu = self.backend.create_device(*adapter);
        let device = Arc::new(GraphicsDevice::new(instance, *adapter, info.clone(), gpu));

        let mut devices = self.devices.write();
        devices.retain(|d| d.strong_count() > 0);
        devices.push(Arc::downgrade(&device));

        log::trace!("GraphicsInstance: created device on {}", info.name);
        Ok(device)
    }

    /// Get all live devices created by this instance.
    pub fn devices(&self) -> Vec<Arc<GraphicsDevice>> {
        self.devices.read().iter().filter_map(Weak::upgrade).collect()
    }

    /// Get the number of live devices created by this instance.
    pub fn device_count(&self) -> usize {
        self.devices
            .read()
            .iter()
            .filter(|d| d.strong_count() > 0)
            .count()
    }

    /// Run queued GPU work until nothing can make progress.
    ///
    /// Only meaningful in [`ExecutionMode::Deferred`]; threaded queues run on
    /// their own. Returns the number of executed jobs.
    pub fn poll(&self) -> usize {
        self.backend.poll()
    }

    /// Number of exported cross-adapter handles still open.
    pub fn open_shared_handle_count(&self) -> usize {
        self.backend.open_handle_count()
    }
}

impl fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("backend", &self.backend.name())
            .field("execution_mode", &self.parameters.execution_mode)
            .field("device_count", &self.device_count())
            .finish()
    }
}

// Ensure GraphicsInstance is Send + Sync
static_assertions::assert_impl_all!(GraphicsInstance: Send, Sync);
