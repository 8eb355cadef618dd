use crate::lv;
use ash::vk;
use std::sync::Arc;

pub struct Framebuffer {
    pub handle: vk::Framebuffer,

    // Reference-counting
    device: Arc<lv::Device>,
}

impl Framebuffer {
    pub fn new(
        device: Arc<lv::Device>,
        render_pass: &lv::RenderPass,
        image_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> lv::Result<Framebuffer> {
        let attachments = [image_view];
        let framebuffer_ci = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: render_pass.handle,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        let handle = unsafe { device.handle.create_framebuffer(&framebuffer_ci, None)? };

        Ok(Framebuffer { handle, device })
    }

    /// One framebuffer per swapchain image view, in image order.
    pub fn for_swapchain(
        device: &Arc<lv::Device>,
        render_pass: &lv::RenderPass,
        swapchain: &lv::Swapchain,
    ) -> lv::Result<Vec<Framebuffer>> {
        swapchain
            .image_views
            .iter()
            .map(|&view| Framebuffer::new(device.clone(), render_pass, view, swapchain.extent))
            .collect()
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle.destroy_framebuffer(self.handle, None);
        }
    }
}
