use crate::lv;
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use log::debug;
use std::sync::{Arc, Mutex};

pub type SharedAllocator = Arc<Mutex<Allocator>>;

pub fn create_allocator(device: &lv::Device) -> lv::Result<SharedAllocator> {
    let physical_device = device.physical_device();
    let allocator = Allocator::new(&AllocatorCreateDesc {
        instance: physical_device.instance().instance.clone(),
        device: device.handle.clone(),
        physical_device: physical_device.handle,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: Default::default(),
    })?;
    Ok(Arc::new(Mutex::new(allocator)))
}

/// A `vk::Buffer` bound to memory sub-allocated by gpu-allocator.
pub struct AllocatedBuffer {
    pub handle: vk::Buffer,
    pub size: vk::DeviceSize,
    name: &'static str,
    allocation: Allocation,

    device: Arc<lv::Device>,
    allocator: SharedAllocator,
}

impl AllocatedBuffer {
    pub fn new(
        name: &'static str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        device: Arc<lv::Device>,
        allocator: SharedAllocator,
    ) -> lv::Result<Self> {
        let buffer_ci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let handle = unsafe { device.handle.create_buffer(&buffer_ci, None)? };
        let requirements = unsafe { device.handle.get_buffer_memory_requirements(handle) };

        let allocation = allocator
            .lock()
            .map_err(|_| lv::Error::AllocatorPoisoned)
            .and_then(|mut allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name,
                        requirements,
                        location,
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(lv::Error::from)
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { device.handle.destroy_buffer(handle, None) };
                return Err(err);
            }
        };

        // Drop frees both the buffer and the allocation if binding fails
        let buffer = AllocatedBuffer {
            handle,
            size,
            name,
            allocation,
            device,
            allocator,
        };
        unsafe {
            buffer.device.handle.bind_buffer_memory(
                buffer.handle,
                buffer.allocation.memory(),
                buffer.allocation.offset(),
            )?
        };
        debug!("Created {} buffer: {} bytes ({:?})", name, size, location);

        Ok(buffer)
    }

    /// Host-visible buffer that stays mapped for its whole life.
    pub fn host_visible(
        name: &'static str,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        device: Arc<lv::Device>,
        allocator: SharedAllocator,
    ) -> lv::Result<Self> {
        AllocatedBuffer::new(name, size, usage, MemoryLocation::CpuToGpu, device, allocator)
    }

    /// Device-local buffer filled with `data` through a staging buffer and a
    /// one-time copy on `queue`.
    pub fn device_local_with_data(
        name: &'static str,
        data: &[u8],
        usage: vk::BufferUsageFlags,
        command_pool: &lv::CommandPool,
        queue: &lv::Queue,
        allocator: SharedAllocator,
    ) -> lv::Result<Self> {
        let device = command_pool.device().clone();
        let size = data.len() as vk::DeviceSize;

        let mut staging = AllocatedBuffer::host_visible(
            "staging",
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            device.clone(),
            allocator.clone(),
        )?;
        staging.write(data)?;

        let buffer = AllocatedBuffer::new(
            name,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            device,
            allocator,
        )?;
        copy_buffer(command_pool, queue, &staging, &buffer, size)?;

        Ok(buffer)
    }

    /// Copies `data` to the start of the mapped memory.
    pub fn write(&mut self, data: &[u8]) -> lv::Result<()> {
        let name = self.name;
        let mapped = self
            .allocation
            .mapped_slice_mut()
            .ok_or(lv::Error::UnmappedBuffer { name })?;
        mapped[..data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl Drop for AllocatedBuffer {
    fn drop(&mut self) {
        unsafe { self.device.handle.destroy_buffer(self.handle, None) };
        let allocation = std::mem::take(&mut self.allocation);
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(err) = allocator.free(allocation) {
                    log::error!("Failed to free {} buffer: {}", self.name, err);
                }
            }
            Err(_) => log::error!("Allocator poisoned while freeing {} buffer", self.name),
        }
    }
}

pub fn copy_buffer(
    command_pool: &lv::CommandPool,
    queue: &lv::Queue,
    src: &AllocatedBuffer,
    dst: &AllocatedBuffer,
    size: vk::DeviceSize,
) -> lv::Result<()> {
    command_pool.submit_one_time(queue, |device, command_buffer| {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe { device.cmd_copy_buffer(command_buffer, src.handle, dst.handle, &[region]) };
    })
}
