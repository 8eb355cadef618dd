use crate::lv;
use ash::vk;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// Reads a SPIR-V binary as 32-bit words. A missing or malformed file is fatal
/// to the run.
fn read_shader_code(shader_path: &Path) -> lv::Result<Vec<u32>> {
    let shader_io = |source| lv::Error::ShaderIo {
        path: shader_path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(shader_path).map_err(shader_io)?;
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(shader_io)
}

pub struct Shader {
    pub handle: vk::ShaderModule,
    device: Arc<lv::Device>,
}

impl Shader {
    pub fn new(path: &Path, device: Arc<lv::Device>) -> lv::Result<Shader> {
        let shader_code = read_shader_code(path)?;
        let shader_ci = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            code_size: shader_code.len() * std::mem::size_of::<u32>(),
            p_code: shader_code.as_ptr(),
            ..Default::default()
        };
        let shader = unsafe { device.handle.create_shader_module(&shader_ci, None)? };
        Ok(Shader {
            handle: shader,
            device,
        })
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device.handle.destroy_shader_module(self.handle, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_shader_reports_its_path() {
        let path = Path::new("definitely/not/here/vert.spv");
        match read_shader_code(path) {
            Err(lv::Error::ShaderIo { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other.map(|words| words.len())),
        }
    }

    #[test]
    fn reads_little_endian_words() {
        let dir = std::env::temp_dir().join(format!("hello_rectangle_spv_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("frag.spv");
        // SPIR-V magic number followed by one more word
        std::fs::write(&path, [0x03, 0x02, 0x23, 0x07, 0x01, 0x00, 0x00, 0x00]).unwrap();

        let words = read_shader_code(&path).unwrap();
        assert_eq!(words, vec![0x0723_0203, 1]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    /// Execution model of the first `OpEntryPoint` in `words`.
    fn entry_point_model(words: &[u32]) -> Option<u32> {
        let mut i = 5;
        while i < words.len() {
            let (word_count, opcode) = ((words[i] >> 16) as usize, words[i] & 0xffff);
            if opcode == 15 {
                return words.get(i + 1).copied();
            }
            if word_count == 0 {
                return None;
            }
            i += word_count;
        }
        None
    }

    #[test]
    fn bundled_shaders_load_from_default_config() {
        let config = crate::config::AppConfig::default();

        let vert = read_shader_code(&config.vertex_shader_path()).unwrap();
        let frag = read_shader_code(&config.fragment_shader_path()).unwrap();
        assert_eq!(vert[0], 0x0723_0203);
        assert_eq!(frag[0], 0x0723_0203);
        // ExecutionModel: 0 = Vertex, 4 = Fragment
        assert_eq!(entry_point_model(&vert), Some(0));
        assert_eq!(entry_point_model(&frag), Some(4));
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let dir = std::env::temp_dir().join(format!("hello_rectangle_bad_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vert.spv");
        std::fs::write(&path, [0x03, 0x02, 0x23]).unwrap();

        assert!(matches!(
            read_shader_code(&path),
            Err(lv::Error::ShaderIo { .. })
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
