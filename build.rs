#[cfg(feature = "shaderc")]
extern crate shaderc;

#[allow(unused_imports)]
use std::fs;
#[allow(unused_imports)]
use std::path::Path;

#[cfg(feature = "shaderc")]
use shaderc::{CompileOptions, EnvVersion, TargetEnv};

#[cfg(feature = "shaderc")]
fn compile_shader(path: &Path, kind: shaderc::ShaderKind, output: &Path) {
    let compiler = shaderc::Compiler::new().unwrap();
    let mut options = CompileOptions::new().unwrap();
    options.set_target_env(TargetEnv::Vulkan, EnvVersion::Vulkan1_0 as u32);

    let source = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("Failed to read shader {:?}: {}", path, err));
    let binary = compiler
        .compile_into_spirv(
            &source,
            kind,
            path.as_os_str().to_str().unwrap(),
            "main",
            Some(&options),
        )
        .expect("Ran into an error while compiling GLSL");
    fs::write(output, binary.as_binary_u8())
        .unwrap_or_else(|err| panic!("Failed to write {:?}: {}", output, err));
}

fn main() {
    #[cfg(feature = "shaderc")]
    {
        let paths = fs::read_dir("./shaders").unwrap();
        for path in paths {
            let path = path.unwrap().path();
            if !path.is_file() {
                continue;
            }
            let Some(extension) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };

            // The application loads the stages by fixed name: vert.spv / frag.spv
            let (shader_kind, output_name) = match extension {
                "vert" => (shaderc::ShaderKind::Vertex, "vert.spv"),
                "frag" => (shaderc::ShaderKind::Fragment, "frag.spv"),
                _ => continue,
            };

            println!("cargo:rerun-if-changed={}", path.display());
            let output = path.with_file_name(output_name);
            println!("Building shader: {:?}", path.file_name().unwrap());
            compile_shader(&path, shader_kind, &output);
        }
    }
}
