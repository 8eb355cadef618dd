use crate::{lv, utility};
use ash::vk;
use std::sync::Arc;

/// A primary command buffer. Freed together with its pool.
pub struct CommandBuffer {
    handle: vk::CommandBuffer,
    device: Arc<lv::Device>,
}

impl CommandBuffer {
    pub fn new(command_pool: &lv::CommandPool, level: vk::CommandBufferLevel) -> lv::Result<Self> {
        let command_buffer_ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: command_pool.get_handle(),
            level,
            command_buffer_count: 1,
            ..Default::default()
        };
        let device = command_pool.device().clone();
        let handle = unsafe { device.handle.allocate_command_buffers(&command_buffer_ai)? }
            .pop()
            .ok_or(lv::Error::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY))?;
        Ok(CommandBuffer { handle, device })
    }

    /// Requires the pool to have been created with `RESET_COMMAND_BUFFER`.
    pub fn reset(&self) -> lv::Result<()> {
        unsafe {
            self.device
                .handle
                .reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty())?
        };
        Ok(())
    }

    pub fn begin(&self) -> lv::Result<()> {
        let begin_info = utility::init::command_buffer_begin_info(vk::CommandBufferUsageFlags::empty());
        unsafe {
            self.device
                .handle
                .begin_command_buffer(self.handle, &begin_info)?
        };
        Ok(())
    }

    pub fn end(&self) -> lv::Result<()> {
        unsafe { self.device.handle.end_command_buffer(self.handle)? };
        Ok(())
    }

    pub fn get_handle(&self) -> vk::CommandBuffer {
        self.handle
    }
}
