use crate::lv;
use crate::lv::SwapchainSupportDetails;
use crate::utility::tools::{as_ptrs, vk_to_string};
use ash::vk;
use log::{info, warn};
use std::collections::HashSet;
use std::ffi::CStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first. Empty while incomplete.
    pub fn unique(&self) -> Vec<u32> {
        match (self.graphics_family, self.present_family) {
            (Some(graphics), Some(present)) if graphics == present => vec![graphics],
            (Some(graphics), Some(present)) => vec![graphics, present],
            _ => Vec::new(),
        }
    }
}

pub struct PhysicalDevice {
    pub handle: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: QueueFamilyIndices,

    // Reference-counting
    instance: Arc<lv::Instance>,
}

impl PhysicalDevice {
    pub fn new(vk_device: vk::PhysicalDevice, instance: Arc<lv::Instance>) -> PhysicalDevice {
        let properties = unsafe { instance.instance.get_physical_device_properties(vk_device) };

        PhysicalDevice {
            handle: vk_device,
            properties,
            queue_families: QueueFamilyIndices::default(),
            instance,
        }
    }

    /// First device with graphics and present support, every extension in
    /// `required_extensions`, and at least one surface format and present mode.
    pub fn pick(
        instance: Arc<lv::Instance>,
        surface: &lv::Surface,
        required_extensions: &[&CStr],
    ) -> lv::Result<Arc<PhysicalDevice>> {
        let physical_devices = unsafe { instance.instance.enumerate_physical_devices()? };
        for physical_device in physical_devices {
            let mut candidate = PhysicalDevice::new(physical_device, instance.clone());
            let name = vk_to_string(&candidate.properties.device_name);
            if candidate.is_suitable(surface, required_extensions)? {
                info!("Selected physical device `{}`", name);
                return Ok(Arc::new(candidate));
            }
            warn!("Skipping physical device `{}`", name);
        }
        Err(lv::Error::NoSuitableDevice)
    }

    fn is_suitable(
        &mut self,
        surface: &lv::Surface,
        required_extensions: &[&CStr],
    ) -> lv::Result<bool> {
        self.find_queue_families(surface)?;
        if !self.queue_families.is_complete() || !self.has_extensions(required_extensions)? {
            return Ok(false);
        }
        let swapchain_support = self.get_swapchain_support(surface)?;
        Ok(!swapchain_support.formats.is_empty() && !swapchain_support.present_modes.is_empty())
    }

    pub fn find_queue_families(&mut self, surface: &lv::Surface) -> lv::Result<()> {
        let queue_family_properties = unsafe {
            self.instance
                .instance
                .get_physical_device_queue_family_properties(self.handle)
        };
        let mut indices = QueueFamilyIndices::default();
        for (index, queue_family) in queue_family_properties.iter().enumerate() {
            let index = index as u32;
            if indices.graphics_family.is_none()
                && queue_family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics_family = Some(index);
            }
            let present_support = unsafe {
                surface.loader.get_physical_device_surface_support(
                    self.handle,
                    index,
                    surface.handle,
                )?
            };
            if indices.present_family.is_none() && present_support {
                indices.present_family = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }
        self.queue_families = indices;
        Ok(())
    }

    pub fn has_extensions(&self, extensions: &[&CStr]) -> lv::Result<bool> {
        let available_extensions = unsafe {
            self.instance
                .instance
                .enumerate_device_extension_properties(self.handle)?
        };

        let mut required_extensions: HashSet<String> = extensions
            .iter()
            .map(|extension| extension.to_string_lossy().into_owned())
            .collect();
        for extension in available_extensions.iter() {
            required_extensions.remove(&vk_to_string(&extension.extension_name));
        }

        Ok(required_extensions.is_empty())
    }

    pub fn get_swapchain_support(
        &self,
        surface: &lv::Surface,
    ) -> lv::Result<SwapchainSupportDetails> {
        unsafe {
            Ok(SwapchainSupportDetails {
                capabilities: surface
                    .loader
                    .get_physical_device_surface_capabilities(self.handle, surface.handle)?,
                formats: surface
                    .loader
                    .get_physical_device_surface_formats(self.handle, surface.handle)?,
                present_modes: surface
                    .loader
                    .get_physical_device_surface_present_modes(self.handle, surface.handle)?,
            })
        }
    }

    pub fn instance(&self) -> &Arc<lv::Instance> {
        &self.instance
    }
}

pub struct Device {
    pub handle: ash::Device,
    pub graphics_queue: lv::Queue,
    pub present_queue: lv::Queue,

    // Reference-count
    physical_device: Arc<PhysicalDevice>,
}

impl Device {
    pub fn new(
        physical_device: Arc<PhysicalDevice>,
        required_extensions: &[&CStr],
    ) -> lv::Result<Arc<Device>> {
        let queue_families = physical_device.queue_families;
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(lv::Error::NoSuitableDevice);
        };

        let queue_priorities = [1.0_f32];
        let queue_cis: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|queue_family_index| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index,
                queue_count: 1,
                p_queue_priorities: queue_priorities.as_ptr(),
                ..vk::DeviceQueueCreateInfo::default()
            })
            .collect();

        let extension_names = as_ptrs(required_extensions);
        let physical_device_features = vk::PhysicalDeviceFeatures::default();
        let device_ci = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            p_queue_create_infos: queue_cis.as_ptr(),
            queue_create_info_count: queue_cis.len() as u32,
            p_enabled_features: &physical_device_features,
            enabled_extension_count: extension_names.len() as u32,
            pp_enabled_extension_names: extension_names.as_ptr(),
            ..vk::DeviceCreateInfo::default()
        };
        let device = unsafe {
            physical_device
                .instance
                .instance
                .create_device(physical_device.handle, &device_ci, None)?
        };
        let graphics_queue = lv::Queue::new(graphics_family, &device);
        let present_queue = lv::Queue::new(present_family, &device);

        Ok(Arc::new(Device {
            handle: device,
            graphics_queue,
            present_queue,
            physical_device,
        }))
    }

    pub fn physical_device(&self) -> &Arc<PhysicalDevice> {
        &self.physical_device
    }

    pub fn wait_idle(&self) -> lv::Result<()> {
        unsafe { self.handle.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.handle.destroy_device(None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_is_listed_once() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(shared.is_complete());
        assert_eq!(shared.unique(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique(), vec![0, 2]);
    }

    #[test]
    fn incomplete_families_have_no_queues() {
        let missing_present = QueueFamilyIndices {
            graphics_family: Some(1),
            present_family: None,
        };
        assert!(!missing_present.is_complete());
        assert!(missing_present.unique().is_empty());
    }
}
