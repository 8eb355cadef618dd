use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a run. Stale swapchains are not errors; they are
/// reported through `AcquireOutcome` / `PresentOutcome` instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("Failed to load the Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("GPU allocation failed: {0}")]
    Allocation(#[from] gpu_allocator::AllocationError),

    #[error("Failed to read shader {path:?}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Validation layer {0} was requested but is not available")]
    MissingValidationLayer(String),

    #[error("No physical device satisfies the renderer's requirements")]
    NoSuitableDevice,

    #[error("Buffer {name} is not host visible")]
    UnmappedBuffer { name: &'static str },

    #[error("GPU allocator lock was poisoned")]
    AllocatorPoisoned,

    #[error("Window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("Event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub type Result<T> = std::result::Result<T, Error>;
