use crate::lv;
use ash::vk;
use std::sync::Arc;

pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> DescriptorLayoutBuilder {
        DescriptorLayoutBuilder {
            bindings: Vec::new(),
        }
    }

    pub fn add_binding(mut self, binding: u32, descriptor_type: vk::DescriptorType) -> Self {
        self.bindings.push(vk::DescriptorSetLayoutBinding {
            binding,
            descriptor_count: 1,
            descriptor_type,
            stage_flags: vk::ShaderStageFlags::empty(),
            ..Default::default()
        });
        self
    }

    /// Every binding added so far becomes visible to `shader_stages`.
    pub fn build(
        mut self,
        device: Arc<lv::Device>,
        shader_stages: vk::ShaderStageFlags,
    ) -> lv::Result<DescriptorSetLayout> {
        for binding in self.bindings.iter_mut() {
            binding.stage_flags |= shader_stages;
        }

        let layout_ci = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            p_bindings: self.bindings.as_ptr(),
            binding_count: self.bindings.len() as u32,
            flags: vk::DescriptorSetLayoutCreateFlags::empty(),
            ..Default::default()
        };
        let handle = unsafe { device.handle.create_descriptor_set_layout(&layout_ci, None)? };
        Ok(DescriptorSetLayout { handle, device })
    }
}

impl Default for DescriptorLayoutBuilder {
    fn default() -> Self {
        DescriptorLayoutBuilder::new()
    }
}

pub struct DescriptorSetLayout {
    pub handle: vk::DescriptorSetLayout,
    device: Arc<lv::Device>,
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle
                .destroy_descriptor_set_layout(self.handle, None)
        }
    }
}

#[derive(Default, Copy, Clone)]
pub struct PoolSizeRatio {
    pub descriptor_type: vk::DescriptorType,
    pub ratio: f32,
}

/// Computes per-type descriptor counts for a pool holding `max_sets` sets.
/// Every type present gets at least one descriptor.
pub fn pool_sizes(max_sets: u32, pool_ratios: &[PoolSizeRatio]) -> Vec<vk::DescriptorPoolSize> {
    pool_ratios
        .iter()
        .map(|ratio| vk::DescriptorPoolSize {
            ty: ratio.descriptor_type,
            descriptor_count: ((ratio.ratio * max_sets as f32).ceil() as u32).max(1),
        })
        .collect()
}

/// Fixed-size pool; sets live until the pool is destroyed.
pub struct DescriptorAllocator {
    pool: vk::DescriptorPool,

    device: Arc<lv::Device>,
}

impl DescriptorAllocator {
    pub fn new(
        device: Arc<lv::Device>,
        max_sets: u32,
        pool_ratios: &[PoolSizeRatio],
    ) -> lv::Result<Self> {
        let pool_sizes = pool_sizes(max_sets, pool_ratios);
        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            flags: vk::DescriptorPoolCreateFlags::empty(),
            max_sets,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = unsafe { device.handle.create_descriptor_pool(&pool_ci, None)? };
        Ok(DescriptorAllocator { pool, device })
    }

    /// Allocates `count` sets sharing one layout.
    pub fn allocate(
        &self,
        layout: &DescriptorSetLayout,
        count: usize,
    ) -> lv::Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle; count];
        let allocation_info = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: layouts.len() as u32,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        let sets = unsafe { self.device.handle.allocate_descriptor_sets(&allocation_info)? };
        Ok(sets)
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        unsafe { self.device.handle.destroy_descriptor_pool(self.pool, None) }
    }
}

/// Points binding 0 of `set` at the whole of `buffer`.
pub fn write_uniform_buffer(device: &lv::Device, set: vk::DescriptorSet, buffer: &lv::AllocatedBuffer) {
    let buffer_info = vk::DescriptorBufferInfo {
        buffer: buffer.handle,
        offset: 0,
        range: buffer.size,
    };
    let write = vk::WriteDescriptorSet {
        s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
        dst_set: set,
        dst_binding: 0,
        dst_array_element: 0,
        descriptor_count: 1,
        descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
        p_buffer_info: &buffer_info,
        ..Default::default()
    };
    unsafe { device.handle.update_descriptor_sets(&[write], &[]) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_holds_one_uniform_per_frame() {
        let sizes = pool_sizes(
            2,
            &[PoolSizeRatio {
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                ratio: 1.0,
            }],
        );
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 2);
    }

    #[test]
    fn fractional_ratio_rounds_up() {
        let sizes = pool_sizes(
            3,
            &[PoolSizeRatio {
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                ratio: 0.1,
            }],
        );
        assert_eq!(sizes[0].descriptor_count, 1);
    }
}
