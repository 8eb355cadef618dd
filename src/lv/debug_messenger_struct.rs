use crate::lv;
use ash::vk;
use log::{debug, error, trace, warn};
use std::borrow::Cow;
use std::ffi::{c_void, CStr};
use std::ptr;
use std::sync::Arc;

unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let types = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        _ => "[Unknown]",
    };
    let message = if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*p_callback_data).p_message).to_string_lossy()
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("{} {}", types, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("{} {}", types, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => debug!("{} {}", types, message),
        _ => trace!("{} {}", types, message),
    }

    vk::FALSE
}

pub struct DebugMessenger {
    loader: ash::extensions::ext::DebugUtils,
    handle: vk::DebugUtilsMessengerEXT,

    // Reference-counting
    _instance: Arc<lv::Instance>,
}

impl DebugMessenger {
    /// Also chained into instance creation so that instance creation and
    /// destruction themselves are validated.
    pub fn get_debug_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
        vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            p_next: ptr::null(),
            flags: vk::DebugUtilsMessengerCreateFlagsEXT::empty(),
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(vulkan_debug_utils_callback),
            p_user_data: ptr::null_mut(),
        }
    }

    pub fn new(instance: Arc<lv::Instance>) -> lv::Result<DebugMessenger> {
        let debug_utils_loader =
            ash::extensions::ext::DebugUtils::new(&instance.entry, &instance.instance);

        let create_info = DebugMessenger::get_debug_create_info();
        let utils_messenger =
            unsafe { debug_utils_loader.create_debug_utils_messenger(&create_info, None)? };

        Ok(DebugMessenger {
            loader: debug_utils_loader,
            handle: utils_messenger,
            _instance: instance,
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.handle, None);
        };
    }
}
