use crate::config::{AppConfig, ValidationInfo};
use crate::{lv, utility};
use ash::vk;
use log::{info, warn};
use std::ffi::{c_char, c_void, CString};
use std::ptr;
use std::sync::Arc;

pub struct Instance {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
}

impl Instance {
    /// `required_extensions` are the window system's surface extensions; the
    /// debug-utils extension is appended when validation is enabled.
    pub fn new(
        config: &AppConfig,
        mut required_extensions: Vec<*const c_char>,
    ) -> lv::Result<Arc<Self>> {
        let entry = unsafe { ash::Entry::load()? };
        let validation = &config.validation;
        if validation.is_enabled {
            Instance::check_validation_layer_support(&entry, validation)?;
            required_extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        let app_name = CString::new(config.window_title).unwrap_or_default();
        let engine_name = c"No Engine";
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_next: ptr::null(),
            p_application_name: app_name.as_ptr(),
            application_version: vk::make_api_version(0, 1, 0, 0),
            p_engine_name: engine_name.as_ptr(),
            engine_version: vk::make_api_version(0, 1, 0, 0),
            api_version: vk::API_VERSION_1_0,
        };

        let enabled_layer_names = utility::tools::as_ptrs(validation.required_validation_layers);
        let debug_create_info = lv::DebugMessenger::get_debug_create_info();

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_next: if validation.is_enabled {
                &debug_create_info as *const vk::DebugUtilsMessengerCreateInfoEXT
                    as *const c_void
            } else {
                ptr::null()
            },
            flags: vk::InstanceCreateFlags::empty(),
            p_application_info: &app_info,
            enabled_layer_count: if validation.is_enabled {
                enabled_layer_names.len()
            } else {
                0
            } as u32,
            pp_enabled_layer_names: if validation.is_enabled {
                enabled_layer_names.as_ptr()
            } else {
                ptr::null()
            },
            pp_enabled_extension_names: required_extensions.as_ptr(),
            enabled_extension_count: required_extensions.len() as u32,
        };

        let instance: ash::Instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Created Vulkan instance (validation {})",
            if validation.is_enabled { "on" } else { "off" }
        );

        Ok(Arc::new(Self { entry, instance }))
    }

    pub fn check_validation_layer_support(
        entry: &ash::Entry,
        validation: &ValidationInfo,
    ) -> lv::Result<()> {
        let layer_properties = entry.enumerate_instance_layer_properties()?;
        if layer_properties.is_empty() {
            warn!("No instance layers are available.");
        }

        for required_layer in validation.required_validation_layers {
            let required_layer_name = required_layer.to_string_lossy();
            let is_layer_found = layer_properties.iter().any(|layer_property| {
                utility::tools::vk_to_string(&layer_property.layer_name) == required_layer_name
            });

            if !is_layer_found {
                return Err(lv::Error::MissingValidationLayer(
                    required_layer_name.into_owned(),
                ));
            }
        }

        Ok(())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}
