use crate::lv;
use ash::vk;
use std::ptr;
use std::sync::Arc;

/// Collects the fixed-function state of a graphics pipeline. The Vulkan
/// create-info structs are only assembled inside `build`, so none of the
/// pointers they carry can outlive the data they point at.
pub struct PipelineBuilder {
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    dynamic_states: Vec<vk::DynamicState>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    viewport_count: u32,
    scissor_count: u32,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        PipelineBuilder {
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            dynamic_states: Vec::new(),
            set_layouts: Vec::new(),
            viewport_count: 1,
            scissor_count: 1,
        }
    }

    pub fn vertex_input(
        mut self,
        binding: vk::VertexInputBindingDescription,
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_bindings.push(binding);
        self.vertex_attributes.extend_from_slice(attributes);
        self
    }

    pub fn front_face(mut self, front_face: vk::FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    /// Viewport and scissor are supplied at record time, so the pipeline
    /// survives swapchain resizes.
    pub fn dynamic_viewport(mut self) -> Self {
        self.dynamic_states
            .extend([vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]);
        self.viewport_count = 1;
        self.scissor_count = 1;
        self
    }

    pub fn descriptor_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    pub fn build(
        self,
        device: Arc<lv::Device>,
        render_pass: &lv::RenderPass,
        vertex_shader: &lv::Shader,
        fragment_shader: &lv::Shader,
    ) -> lv::Result<Pipeline> {
        Pipeline::from_builder(self, device, render_pass, vertex_shader, fragment_shader)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        PipelineBuilder::new()
    }
}

pub struct Pipeline {
    pub handle: vk::Pipeline,
    pub layout: vk::PipelineLayout,

    // Reference-counting
    device: Arc<lv::Device>,
}

impl Pipeline {
    fn from_builder(
        builder: PipelineBuilder,
        device: Arc<lv::Device>,
        render_pass: &lv::RenderPass,
        vertex_shader: &lv::Shader,
        fragment_shader: &lv::Shader,
    ) -> lv::Result<Self> {
        let entry_point = c"main";
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vertex_shader.handle,
                p_name: entry_point.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fragment_shader.handle,
                p_name: entry_point.as_ptr(),
                ..Default::default()
            },
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: builder.vertex_bindings.len() as u32,
            p_vertex_binding_descriptions: builder.vertex_bindings.as_ptr(),
            vertex_attribute_description_count: builder.vertex_attributes.len() as u32,
            p_vertex_attribute_descriptions: builder.vertex_attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: builder.topology,
            primitive_restart_enable: vk::FALSE,
            ..Default::default()
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: builder.viewport_count,
            p_viewports: ptr::null(),
            scissor_count: builder.scissor_count,
            p_scissors: ptr::null(),
            ..Default::default()
        };
        let rasterizer = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            depth_clamp_enable: vk::FALSE,
            rasterizer_discard_enable: vk::FALSE,
            polygon_mode: builder.polygon_mode,
            line_width: 1.0f32,
            cull_mode: builder.cull_mode,
            front_face: builder.front_face,
            depth_bias_enable: vk::FALSE,
            ..Default::default()
        };
        let multisampling = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            sample_shading_enable: vk::FALSE,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            min_sample_shading: 1.0f32,
            p_sample_mask: ptr::null(),
            alpha_to_coverage_enable: vk::FALSE,
            alpha_to_one_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
        };
        let color_blending = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op_enable: vk::FALSE,
            logic_op: vk::LogicOp::COPY,
            attachment_count: 1,
            p_attachments: &color_blend_attachment,
            blend_constants: [0.0f32, 0.0f32, 0.0f32, 0.0f32],
            ..Default::default()
        };
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: builder.dynamic_states.len() as u32,
            p_dynamic_states: builder.dynamic_states.as_ptr(),
            ..Default::default()
        };

        let pipeline_layout_ci = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: builder.set_layouts.len() as u32,
            p_set_layouts: builder.set_layouts.as_ptr(),
            push_constant_range_count: 0,
            p_push_constant_ranges: ptr::null(),
            ..Default::default()
        };
        let layout = unsafe {
            device
                .handle
                .create_pipeline_layout(&pipeline_layout_ci, None)?
        };

        let pipeline_ci = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: shader_stages.len() as u32,
            p_stages: shader_stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &rasterizer,
            p_multisample_state: &multisampling,
            p_color_blend_state: &color_blending,
            p_dynamic_state: if builder.dynamic_states.is_empty() {
                ptr::null()
            } else {
                &dynamic_state
            },
            layout,
            render_pass: render_pass.handle,
            subpass: 0,
            base_pipeline_handle: vk::Pipeline::null(),
            base_pipeline_index: -1,
            ..Default::default()
        };
        let pipelines = unsafe {
            device
                .handle
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_ci], None)
        };
        let handle = match pipelines {
            Ok(mut pipelines) => pipelines.remove(0),
            Err((_, err)) => {
                unsafe { device.handle.destroy_pipeline_layout(layout, None) };
                return Err(err.into());
            }
        };

        Ok(Pipeline {
            handle,
            layout,
            device,
        })
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle.destroy_pipeline(self.handle, None);
            self.device
                .handle
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}
