use crate::lv;
use ash::vk;
use std::sync::Arc;

/// CPU-side completion signal for one queue submission.
pub struct Fence {
    device: Arc<lv::Device>,
    handle: vk::Fence,
}

impl Fence {
    pub fn new(device: Arc<lv::Device>, flags: Option<vk::FenceCreateFlags>) -> lv::Result<Self> {
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: flags.unwrap_or_default(),
            ..Default::default()
        };
        let handle = unsafe { device.handle.create_fence(&fence_ci, None)? };

        Ok(Fence { device, handle })
    }

    /// Created signalled, so the first wait on a fresh frame slot returns at once.
    pub fn signaled(device: Arc<lv::Device>) -> lv::Result<Self> {
        Fence::new(device, Some(vk::FenceCreateFlags::SIGNALED))
    }

    pub fn wait(&self) -> lv::Result<()> {
        unsafe {
            self.device
                .handle
                .wait_for_fences(&[self.handle], true, u64::MAX)?
        };
        Ok(())
    }

    pub fn reset(&self) -> lv::Result<()> {
        unsafe { self.device.handle.reset_fences(&[self.handle])? };
        Ok(())
    }

    pub fn get_handle(&self) -> vk::Fence {
        self.handle
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.handle.destroy_fence(self.handle, None) };
    }
}

/// GPU-side ordering between acquire, submit and present.
pub struct Semaphore {
    device: Arc<lv::Device>,
    handle: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<lv::Device>) -> lv::Result<Self> {
        let handle = unsafe {
            device
                .handle
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        Ok(Semaphore { device, handle })
    }

    pub fn get_handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.handle.destroy_semaphore(self.handle, None) };
    }
}
