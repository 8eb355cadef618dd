use crate::vertex::Vertex;
use std::ffi::CStr;
use std::path::{Path, PathBuf};

pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

const VALIDATION_LAYERS: [&CStr; 1] = [c"VK_LAYER_KHRONOS_validation"];
const DEVICE_EXTENSIONS: [&CStr; 1] = [c"VK_KHR_swapchain"];

const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex::new([0.0, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 1.0, 0.0]),
    Vertex::new([-0.5, 0.5], [0.0, 0.0, 1.0]),
];
const TRIANGLE_INDICES: [u16; 3] = [0, 1, 2];

const RECTANGLE_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5], [0.0, 0.0, 0.0]),
];
const RECTANGLE_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Geometry {
    #[allow(dead_code)]
    Triangle,
    Rectangle,
}

impl Geometry {
    pub fn vertices(self) -> &'static [Vertex] {
        match self {
            Geometry::Triangle => &TRIANGLE_VERTICES,
            Geometry::Rectangle => &RECTANGLE_VERTICES,
        }
    }

    pub fn indices(self) -> &'static [u16] {
        match self {
            Geometry::Triangle => &TRIANGLE_INDICES,
            Geometry::Rectangle => &RECTANGLE_INDICES,
        }
    }
}

pub struct ValidationInfo {
    pub is_enabled: bool,
    pub required_validation_layers: &'static [&'static CStr],
}

/// Startup configuration. Built once in `main` and only read afterwards.
pub struct AppConfig {
    pub window_title: &'static str,
    pub window_width: u32,
    pub window_height: u32,
    pub frames_in_flight: usize,
    pub validation: ValidationInfo,
    pub device_extensions: &'static [&'static CStr],
    pub geometry: Geometry,
    pub shader_dir: PathBuf,
    pub vertex_shader: &'static str,
    pub fragment_shader: &'static str,
    pub clear_color: [f32; 4],
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            window_title: "Draw Rectangle",
            window_width: 800,
            window_height: 600,
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            validation: ValidationInfo {
                is_enabled: cfg!(debug_assertions),
                required_validation_layers: &VALIDATION_LAYERS,
            },
            device_extensions: &DEVICE_EXTENSIONS,
            geometry: Geometry::Rectangle,
            shader_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders"),
            vertex_shader: "vert.spv",
            fragment_shader: "frag.spv",
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl AppConfig {
    pub fn vertex_shader_path(&self) -> PathBuf {
        self.shader_dir.join(self.vertex_shader)
    }

    pub fn fragment_shader_path(&self) -> PathBuf {
        self.shader_dir.join(self.fragment_shader)
    }

    pub fn vertices(&self) -> &'static [Vertex] {
        self.geometry.vertices()
    }

    pub fn indices(&self) -> &'static [u16] {
        self.geometry.indices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_rectangle_walkthrough() {
        let config = AppConfig::default();
        assert_eq!(config.window_title, "Draw Rectangle");
        assert_eq!((config.window_width, config.window_height), (800, 600));
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.indices(), &[0, 1, 2, 2, 3, 0]);
        assert_eq!(config.vertices().len(), 4);
        assert_eq!(config.device_extensions, &[c"VK_KHR_swapchain"]);
        assert_eq!(
            config.validation.required_validation_layers,
            &[c"VK_LAYER_KHRONOS_validation"]
        );
    }

    #[test]
    fn shader_paths_use_fixed_file_names() {
        let config = AppConfig::default();
        assert!(config.vertex_shader_path().ends_with("vert.spv"));
        assert!(config.fragment_shader_path().ends_with("frag.spv"));
    }

    #[test]
    fn shader_dir_does_not_depend_on_working_directory() {
        let config = AppConfig::default();
        assert!(config.shader_dir.is_absolute());
        assert!(config.vertex_shader_path().is_file());
        assert!(config.fragment_shader_path().is_file());
    }

    #[test]
    fn every_index_refers_to_a_vertex() {
        for geometry in [Geometry::Triangle, Geometry::Rectangle] {
            let count = geometry.vertices().len() as u16;
            assert!(geometry.indices().iter().all(|&i| i < count));
            assert_eq!(geometry.indices().len() % 3, 0);
        }
    }
}
