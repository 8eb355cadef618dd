use crate::{lv, utility};
use ash::vk;
use std::sync::Arc;

pub struct CommandPool {
    handle: vk::CommandPool,
    device: Arc<lv::Device>,
}

impl CommandPool {
    pub fn new(
        flags: vk::CommandPoolCreateFlags,
        queue: &lv::Queue,
        device: Arc<lv::Device>,
    ) -> lv::Result<Self> {
        let pool_ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags,
            queue_family_index: queue.family_index,
            ..Default::default()
        };
        let pool = unsafe { device.handle.create_command_pool(&pool_ci, None)? };
        Ok(CommandPool {
            handle: pool,
            device,
        })
    }

    /// Records `record` into a throwaway command buffer, submits it to `queue`
    /// and blocks until the queue is idle.
    pub fn submit_one_time<F>(&self, queue: &lv::Queue, record: F) -> lv::Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let command_buffer = lv::CommandBuffer::new(self, vk::CommandBufferLevel::PRIMARY)?;
        let handle = command_buffer.get_handle();
        let begin_info =
            utility::init::command_buffer_begin_info(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        let result = unsafe {
            self.device
                .handle
                .begin_command_buffer(handle, &begin_info)
                .and_then(|_| {
                    record(&self.device.handle, handle);
                    self.device.handle.end_command_buffer(handle)
                })
                .and_then(|_| {
                    let command_buffers = [handle];
                    let submit_info = vk::SubmitInfo {
                        s_type: vk::StructureType::SUBMIT_INFO,
                        command_buffer_count: command_buffers.len() as u32,
                        p_command_buffers: command_buffers.as_ptr(),
                        ..Default::default()
                    };
                    self.device.handle.queue_submit(
                        queue.handle,
                        &[submit_info],
                        vk::Fence::null(),
                    )
                })
                .and_then(|_| self.device.handle.queue_wait_idle(queue.handle))
        };

        unsafe {
            self.device
                .handle
                .free_command_buffers(self.handle, &[handle]);
        }
        result?;
        Ok(())
    }

    pub fn get_handle(&self) -> vk::CommandPool {
        self.handle
    }

    pub fn device(&self) -> &Arc<lv::Device> {
        &self.device
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle.destroy_command_pool(self.handle, None);
        };
    }
}
