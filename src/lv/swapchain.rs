use crate::lv;
use crate::scheduler::{AcquireOutcome, PresentOutcome};
use crate::utility;
use ash::vk;
use log::{debug, info};
use std::sync::Arc;

#[derive(Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// First preferred format in the SRGB non-linear colour space, falling back
    /// to whatever the surface lists first. A lone `UNDEFINED` entry means the
    /// surface has no preference at all.
    pub fn choose_format(&self, preferred_formats: &[vk::Format]) -> vk::SurfaceFormatKHR {
        let fallback = vk::SurfaceFormatKHR {
            format: preferred_formats
                .first()
                .copied()
                .unwrap_or(vk::Format::B8G8R8A8_UNORM),
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        if self.formats.len() == 1 && self.formats[0].format == vk::Format::UNDEFINED {
            return fallback;
        }

        for preferred_format in preferred_formats.iter() {
            for available_format in self.formats.iter() {
                if *preferred_format == available_format.format
                    && available_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
                {
                    return *available_format;
                }
            }
        }

        self.formats.first().copied().unwrap_or(fallback)
    }

    pub fn choose_presentation_mode(
        &self,
        preferred_present_modes: &[vk::PresentModeKHR],
    ) -> vk::PresentModeKHR {
        for preferred_mode in preferred_present_modes.iter() {
            if self.present_modes.contains(preferred_mode) {
                return *preferred_mode;
            }
        }

        vk::PresentModeKHR::FIFO
    }

    /// `framebuffer_extent` is only consulted when the surface leaves the
    /// extent up to the application (current width of `u32::MAX`).
    pub fn choose_extent(&self, framebuffer_extent: vk::Extent2D) -> vk::Extent2D {
        if self.capabilities.current_extent.width != u32::MAX {
            return self.capabilities.current_extent;
        }
        vk::Extent2D {
            width: framebuffer_extent.width.clamp(
                self.capabilities.min_image_extent.width,
                self.capabilities.max_image_extent.width,
            ),
            height: framebuffer_extent.height.clamp(
                self.capabilities.min_image_extent.height,
                self.capabilities.max_image_extent.height,
            ),
        }
    }

    /// One more than the minimum, so the driver never stalls us; 0 means unbounded.
    pub fn choose_image_count(&self) -> u32 {
        let image_count = self.capabilities.min_image_count + 1;
        if self.capabilities.max_image_count > 0 {
            image_count.min(self.capabilities.max_image_count)
        } else {
            image_count
        }
    }
}

pub struct SwapchainPreferred<'a> {
    pub preferred_format: &'a [vk::Format],
    pub preferred_present_modes: &'a [vk::PresentModeKHR],
    pub swapchain_support_details: SwapchainSupportDetails,
}

/// The swapchain together with its image views. Both are created and
/// destroyed as one unit.
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
    pub surface_format: vk::SurfaceFormatKHR,
    loader: ash::extensions::khr::Swapchain,

    // Reference-counting
    device: Arc<lv::Device>,
}

impl Swapchain {
    pub fn new(
        swapchain_loader: ash::extensions::khr::Swapchain,
        device: Arc<lv::Device>,
        surface: &lv::Surface,
        preferred: SwapchainPreferred,
        framebuffer_extent: vk::Extent2D,
        old_swapchain: Option<&Swapchain>,
    ) -> lv::Result<Swapchain> {
        let swapchain_support_details = preferred.swapchain_support_details;
        let surface_format = swapchain_support_details.choose_format(preferred.preferred_format);
        let present_mode =
            swapchain_support_details.choose_presentation_mode(preferred.preferred_present_modes);
        let extent = swapchain_support_details.choose_extent(framebuffer_extent);
        let image_count = swapchain_support_details.choose_image_count();

        let graphics_family = device.graphics_queue.family_index;
        let present_family = device.present_queue.family_index;
        let queue_family_indices = [graphics_family, present_family];
        let concurrent = graphics_family != present_family;

        let swapchain_ci = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: surface.handle,
            min_image_count: image_count,
            image_format: surface_format.format,
            image_color_space: surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: if concurrent {
                vk::SharingMode::CONCURRENT
            } else {
                vk::SharingMode::EXCLUSIVE
            },
            queue_family_index_count: if concurrent { 2 } else { 0 },
            p_queue_family_indices: queue_family_indices.as_ptr(),
            pre_transform: swapchain_support_details.capabilities.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old_swapchain.map_or(vk::SwapchainKHR::null(), |old| old.handle),
            ..vk::SwapchainCreateInfoKHR::default()
        };
        let swapchain = unsafe { swapchain_loader.create_swapchain(&swapchain_ci, None)? };

        // From here on `Drop` cleans up whatever was created if a view fails
        let mut this = Swapchain {
            handle: swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            extent,
            surface_format,
            loader: swapchain_loader,
            device,
        };

        this.images = unsafe { this.loader.get_swapchain_images(swapchain)? };
        this.image_views.reserve(this.images.len());
        for &image in this.images.iter() {
            let image_view_ci = utility::init::image_view_create_info(
                surface_format.format,
                image,
                vk::ImageAspectFlags::COLOR,
            );
            let image_view = unsafe { this.device.handle.create_image_view(&image_view_ci, None)? };
            this.image_views.push(image_view);
        }

        info!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            surface_format.format,
            present_mode
        );

        Ok(this)
    }

    pub fn acquire_next_image(&self, image_available: vk::Semaphore) -> lv::Result<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, image_available, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn present(
        &self,
        queue: &lv::Queue,
        image_index: u32,
        render_finished: vk::Semaphore,
    ) -> lv::Result<PresentOutcome> {
        let wait_semaphores = [render_finished];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: wait_semaphores.len() as u32,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            swapchain_count: swapchains.len() as u32,
            p_swapchains: swapchains.as_ptr(),
            p_image_indices: image_indices.as_ptr(),
            ..Default::default()
        };

        match unsafe { self.loader.queue_present(queue.handle, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Optimal),
            Ok(true) => Ok(PresentOutcome::Stale),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in self.image_views.iter() {
                self.device.handle.destroy_image_view(image_view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        };
    }
}
