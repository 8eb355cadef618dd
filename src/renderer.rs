use crate::config::AppConfig;
use crate::frame::{self, FrameData, FrameSlots};
use crate::lv;
use crate::scheduler::{AcquireOutcome, PresentOutcome, RenderBackend};
use crate::vertex::{UniformBufferObject, Vertex};
use ash::vk;
use log::{error, info};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;
use std::time::Instant;
use winit::window::Window;

const PREFERRED_FORMATS: [vk::Format; 1] = [vk::Format::B8G8R8A8_UNORM];
const PREFERRED_PRESENT_MODES: [vk::PresentModeKHR; 2] =
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];

/// The ash implementation of [`RenderBackend`].
pub struct VulkanRenderer {
    // Fields drop top to bottom, children before the objects they were made from
    frames: FrameSlots<FrameData>,
    vertex_buffer: lv::AllocatedBuffer,
    index_buffer: lv::AllocatedBuffer,
    index_count: u32,
    pipeline: lv::Pipeline,
    framebuffers: Vec<lv::Framebuffer>,
    render_pass: lv::RenderPass,
    swapchain: lv::Swapchain,
    swapchain_loader: ash::extensions::khr::Swapchain,
    _descriptor_allocator: lv::DescriptorAllocator,
    descriptor_set_layout: lv::DescriptorSetLayout,
    _command_pool: lv::CommandPool,
    _allocator: lv::SharedAllocator,
    device: Arc<lv::Device>,
    _debug_messenger: Option<lv::DebugMessenger>,
    surface: Arc<lv::Surface>,
    _instance: Arc<lv::Instance>,

    window: Arc<Window>,
    config: AppConfig,
    start_time: Instant,
}

impl VulkanRenderer {
    pub fn new(config: AppConfig, window: Arc<Window>) -> lv::Result<Self> {
        let display_handle = window.raw_display_handle();
        let required_extensions = ash_window::enumerate_required_extensions(display_handle)?;
        let instance = lv::Instance::new(&config, required_extensions.to_vec())?;
        let debug_messenger = if config.validation.is_enabled {
            Some(lv::DebugMessenger::new(instance.clone())?)
        } else {
            None
        };
        let surface = lv::Surface::new(
            instance.clone(),
            display_handle,
            window.raw_window_handle(),
        )?;

        let physical_device =
            lv::PhysicalDevice::pick(instance.clone(), &surface, config.device_extensions)?;
        let device = lv::Device::new(physical_device, config.device_extensions)?;
        let allocator = lv::create_allocator(&device)?;

        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&instance.instance, &device.handle);
        let swapchain = create_swapchain(
            &swapchain_loader,
            &device,
            &surface,
            window_extent(&window),
            None,
        )?;

        let descriptor_set_layout = lv::DescriptorLayoutBuilder::new()
            .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER)
            .build(device.clone(), vk::ShaderStageFlags::VERTEX)?;
        let render_pass = lv::RenderPass::new(device.clone(), swapchain.surface_format.format)?;
        let pipeline = create_pipeline(&config, &device, &render_pass, &descriptor_set_layout)?;
        let framebuffers = lv::Framebuffer::for_swapchain(&device, &render_pass, &swapchain)?;

        let command_pool = lv::CommandPool::new(
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            &device.graphics_queue,
            device.clone(),
        )?;
        let vertex_buffer = lv::AllocatedBuffer::device_local_with_data(
            "vertex",
            bytemuck::cast_slice::<Vertex, u8>(config.vertices()),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            &command_pool,
            &device.graphics_queue,
            allocator.clone(),
        )?;
        let index_buffer = lv::AllocatedBuffer::device_local_with_data(
            "index",
            bytemuck::cast_slice::<u16, u8>(config.indices()),
            vk::BufferUsageFlags::INDEX_BUFFER,
            &command_pool,
            &device.graphics_queue,
            allocator.clone(),
        )?;

        let frames_in_flight = config.frames_in_flight;
        let descriptor_allocator = lv::DescriptorAllocator::new(
            device.clone(),
            frames_in_flight as u32,
            &[lv::PoolSizeRatio {
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                ratio: 1.0,
            }],
        )?;
        let descriptor_sets =
            descriptor_allocator.allocate(&descriptor_set_layout, frames_in_flight)?;
        let frames = frame::create_frames(
            frames_in_flight,
            &command_pool,
            &descriptor_sets,
            &allocator,
        )?;
        info!("Renderer ready with {} frames in flight", frames.len());

        Ok(VulkanRenderer {
            frames,
            vertex_buffer,
            index_buffer,
            index_count: config.indices().len() as u32,
            pipeline,
            framebuffers,
            render_pass,
            swapchain,
            swapchain_loader,
            _descriptor_allocator: descriptor_allocator,
            descriptor_set_layout,
            _command_pool: command_pool,
            _allocator: allocator,
            device,
            _debug_messenger: debug_messenger,
            surface,
            _instance: instance,
            window,
            config,
            start_time: Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

fn window_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

fn create_swapchain(
    loader: &ash::extensions::khr::Swapchain,
    device: &Arc<lv::Device>,
    surface: &lv::Surface,
    framebuffer_extent: vk::Extent2D,
    old_swapchain: Option<&lv::Swapchain>,
) -> lv::Result<lv::Swapchain> {
    let swapchain_support_details = device.physical_device().get_swapchain_support(surface)?;
    lv::Swapchain::new(
        loader.clone(),
        device.clone(),
        surface,
        lv::SwapchainPreferred {
            preferred_format: &PREFERRED_FORMATS,
            preferred_present_modes: &PREFERRED_PRESENT_MODES,
            swapchain_support_details,
        },
        framebuffer_extent,
        old_swapchain,
    )
}

/// Shader modules are only needed while the pipeline is being built.
fn create_pipeline(
    config: &AppConfig,
    device: &Arc<lv::Device>,
    render_pass: &lv::RenderPass,
    descriptor_set_layout: &lv::DescriptorSetLayout,
) -> lv::Result<lv::Pipeline> {
    let vertex_shader = lv::Shader::new(&config.vertex_shader_path(), device.clone())?;
    let fragment_shader = lv::Shader::new(&config.fragment_shader_path(), device.clone())?;

    lv::PipelineBuilder::new()
        .vertex_input(
            Vertex::binding_description(),
            &Vertex::attribute_descriptions(),
        )
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .dynamic_viewport()
        .descriptor_set_layout(descriptor_set_layout.handle)
        .build(
            device.clone(),
            render_pass,
            &vertex_shader,
            &fragment_shader,
        )
}

impl RenderBackend for VulkanRenderer {
    fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    fn wait_for_frame(&mut self, slot: usize) -> lv::Result<()> {
        self.frames.get(slot).render_fence.wait()
    }

    fn acquire_next_image(&mut self, slot: usize) -> lv::Result<AcquireOutcome> {
        let image_available = self.frames.get(slot).swapchain_semaphore.get_handle();
        self.swapchain.acquire_next_image(image_available)
    }

    fn update_uniforms(&mut self, slot: usize) -> lv::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let ubo = UniformBufferObject::spinning(elapsed, self.swapchain.extent);
        self.frames
            .get_mut(slot)
            .uniform_buffer
            .write(bytemuck::bytes_of(&ubo))
    }

    fn reset_frame(&mut self, slot: usize) -> lv::Result<()> {
        self.frames.get(slot).render_fence.reset()
    }

    fn record(&mut self, slot: usize, image_index: u32) -> lv::Result<()> {
        let frame = self.frames.get(slot);
        let command_buffer = frame.main_command_buffer.get_handle();
        let extent = self.swapchain.extent;
        let device = &self.device.handle;

        frame.main_command_buffer.reset()?;
        frame.main_command_buffer.begin()?;

        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.config.clear_color,
            },
        }];
        let render_pass_bi = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.render_pass.handle,
            framebuffer: self.framebuffers[image_index as usize].handle,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: clear_values.len() as u32,
            p_clear_values: clear_values.as_ptr(),
            ..Default::default()
        };
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_bi,
                vk::SubpassContents::INLINE,
            );
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle,
            );
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[scissor]);
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.handle], &[0]);
            device.cmd_bind_index_buffer(
                command_buffer,
                self.index_buffer.handle,
                0,
                vk::IndexType::UINT16,
            );
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &[frame.descriptor_set],
                &[],
            );
            device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(command_buffer);
        }

        frame.main_command_buffer.end()
    }

    fn submit(&mut self, slot: usize) -> lv::Result<()> {
        let frame = self.frames.get(slot);
        let wait_semaphores = [frame.swapchain_semaphore.get_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.main_command_buffer.get_handle()];
        let signal_semaphores = [frame.render_semaphore.get_handle()];
        let submit_info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: wait_semaphores.len() as u32,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: command_buffers.len() as u32,
            p_command_buffers: command_buffers.as_ptr(),
            signal_semaphore_count: signal_semaphores.len() as u32,
            p_signal_semaphores: signal_semaphores.as_ptr(),
            ..Default::default()
        };

        unsafe {
            self.device.handle.queue_submit(
                self.device.graphics_queue.handle,
                &[submit_info],
                frame.render_fence.get_handle(),
            )?
        };
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> lv::Result<PresentOutcome> {
        let render_finished = self.frames.get(slot).render_semaphore.get_handle();
        self.swapchain
            .present(&self.device.present_queue, image_index, render_finished)
    }

    fn framebuffer_extent(&self) -> vk::Extent2D {
        window_extent(&self.window)
    }

    fn wait_idle(&mut self) -> lv::Result<()> {
        self.device.wait_idle()
    }

    fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> lv::Result<()> {
        self.framebuffers.clear();
        let swapchain = create_swapchain(
            &self.swapchain_loader,
            &self.device,
            &self.surface,
            extent,
            Some(&self.swapchain),
        )?;
        // Dropping the retired swapchain destroys its image views with it
        self.swapchain = swapchain;

        let format = self.swapchain.surface_format.format;
        if format != self.render_pass.format {
            info!(
                "Surface format changed from {:?} to {:?}, rebuilding render pass and pipeline",
                self.render_pass.format, format
            );
            let render_pass = lv::RenderPass::new(self.device.clone(), format)?;
            self.pipeline = create_pipeline(
                &self.config,
                &self.device,
                &render_pass,
                &self.descriptor_set_layout,
            )?;
            self.render_pass = render_pass;
        }

        self.framebuffers =
            lv::Framebuffer::for_swapchain(&self.device, &self.render_pass, &self.swapchain)?;
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {}", err);
        }
    }
}
