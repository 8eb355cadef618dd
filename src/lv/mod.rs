mod buffer;
mod command_buffer;
mod command_pool;
mod debug_messenger_struct;
mod descriptors;
mod device;
mod error;
mod framebuffer;
mod instance;
mod pipeline;
mod queue;
mod renderpass;
mod shader;
mod surface;
mod swapchain;
mod sync;

// Re-export everything
pub use self::instance::*;
pub use buffer::*;
pub use command_buffer::*;
pub use command_pool::*;
pub use debug_messenger_struct::*;
pub use descriptors::*;
pub use device::*;
pub use error::{Error, Result};
pub use framebuffer::*;
pub use pipeline::*;
pub use queue::*;
pub use renderpass::*;
pub use shader::*;
pub use surface::*;
pub use swapchain::*;
pub use sync::*;
