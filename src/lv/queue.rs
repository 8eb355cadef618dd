use ash::vk;

#[derive(Clone, Copy, Debug)]
pub struct Queue {
    pub handle: vk::Queue,
    pub family_index: u32,
}

impl Queue {
    pub fn new(family_index: u32, device: &ash::Device) -> Queue {
        let handle = unsafe { device.get_device_queue(family_index, 0) };

        Queue {
            handle,
            family_index,
        }
    }
}
