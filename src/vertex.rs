use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use std::mem::{offset_of, size_of};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: Vec2,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(pos: [f32; 2], color: [f32; 3]) -> Self {
        Vertex {
            pos: Vec2::new(pos[0], pos[1]),
            color: Vec3::new(color[0], color[1], color[2]),
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex, pos) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

/// Per-frame transforms, laid out to match the vertex shader's uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    pub const SIZE: vk::DeviceSize = size_of::<UniformBufferObject>() as vk::DeviceSize;

    /// Spins the geometry around Z at 90 degrees per second, seen from (2, 2, 2).
    pub fn spinning(elapsed_seconds: f32, extent: vk::Extent2D) -> Self {
        let model = Mat4::from_rotation_z(elapsed_seconds * 90.0_f32.to_radians());
        let view = Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z);
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let mut proj = Mat4::perspective_rh(45.0_f32.to_radians(), aspect, 0.1, 10.0);
        // GLM-style projections assume OpenGL's clip space, where Y points up
        proj.y_axis.y *= -1.0;

        UniformBufferObject { model, view, proj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_attributes() {
        assert_eq!(size_of::<Vertex>(), 20);
        let binding = Vertex::binding_description();
        assert_eq!(binding.stride, 20);

        let [pos, color] = Vertex::attribute_descriptions();
        assert_eq!((pos.location, pos.offset), (0, 0));
        assert_eq!((color.location, color.offset), (1, 8));
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn uniform_block_is_three_matrices() {
        assert_eq!(UniformBufferObject::SIZE, 192);
        assert_eq!(std::mem::align_of::<UniformBufferObject>(), 16);
    }

    #[test]
    fn projection_flips_y() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let ubo = UniformBufferObject::spinning(0.0, extent);
        let reference = Mat4::perspective_rh(45.0_f32.to_radians(), 800.0 / 600.0, 0.1, 10.0);

        assert_eq!(ubo.model, Mat4::IDENTITY);
        assert!((ubo.proj.y_axis.y + reference.y_axis.y).abs() < 1e-6);
        assert!((ubo.proj.x_axis.x - reference.x_axis.x).abs() < 1e-6);
    }

    #[test]
    fn model_rotates_a_quarter_turn_per_second() {
        let extent = vk::Extent2D {
            width: 600,
            height: 600,
        };
        let ubo = UniformBufferObject::spinning(1.0, extent);
        let rotated = ubo.model.transform_point3(Vec3::X);
        assert!((rotated - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        let extent = vk::Extent2D {
            width: 800,
            height: 0,
        };
        let ubo = UniformBufferObject::spinning(0.5, extent);
        assert!(ubo.proj.is_finite());
    }
}
