use crate::lv;
use crate::vertex::UniformBufferObject;
use ash::vk;
use std::sync::Arc;

/// Everything one frame in flight owns. Only touched after `render_fence`
/// has signalled.
pub struct FrameData {
    pub main_command_buffer: lv::CommandBuffer,
    pub uniform_buffer: lv::AllocatedBuffer,
    pub descriptor_set: vk::DescriptorSet,

    // Sync
    pub swapchain_semaphore: lv::Semaphore, // Signalled when the acquired image is ready
    pub render_semaphore: lv::Semaphore,    // Signalled when rendering is done, waited on by present
    pub render_fence: lv::Fence,            // Signalled when the submission is done, waited on by the CPU
}

impl FrameData {
    pub fn new(
        command_pool: &lv::CommandPool,
        descriptor_set: vk::DescriptorSet,
        allocator: lv::SharedAllocator,
    ) -> lv::Result<Self> {
        let device = command_pool.device().clone();
        let uniform_buffer = lv::AllocatedBuffer::host_visible(
            "uniform",
            UniformBufferObject::SIZE,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            device.clone(),
            allocator,
        )?;
        lv::write_uniform_buffer(&device, descriptor_set, &uniform_buffer);

        Ok(FrameData {
            main_command_buffer: lv::CommandBuffer::new(
                command_pool,
                vk::CommandBufferLevel::PRIMARY,
            )?,
            uniform_buffer,
            descriptor_set,
            swapchain_semaphore: lv::Semaphore::new(device.clone())?,
            render_semaphore: lv::Semaphore::new(device.clone())?,
            render_fence: lv::Fence::signaled(device)?,
        })
    }
}

/// Fixed arena of frame slots, one per frame in flight. The scheduler picks
/// the slot as `frame_counter % len`.
pub struct FrameSlots<T> {
    slots: Vec<T>,
}

impl<T> FrameSlots<T> {
    pub fn new<F>(count: usize, mut make: F) -> lv::Result<Self>
    where
        F: FnMut(usize) -> lv::Result<T>,
    {
        let slots = (0..count).map(&mut make).collect::<lv::Result<Vec<_>>>()?;
        Ok(FrameSlots { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> &T {
        &self.slots[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut T {
        &mut self.slots[slot]
    }
}

pub fn create_frames(
    count: usize,
    command_pool: &lv::CommandPool,
    descriptor_sets: &[vk::DescriptorSet],
    allocator: &lv::SharedAllocator,
) -> lv::Result<FrameSlots<FrameData>> {
    FrameSlots::new(count, |slot| {
        FrameData::new(command_pool, descriptor_sets[slot], Arc::clone(allocator))
    })
}
