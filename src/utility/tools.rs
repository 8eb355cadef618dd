use std::ffi::{c_char, CStr};

/// Converts a fixed-size, nul-terminated name array (layer names, extension
/// names, device names) into an owned string.
pub fn vk_to_string(raw_string_array: &[c_char]) -> String {
    let end = raw_string_array
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(raw_string_array.len());
    let bytes: Vec<u8> = raw_string_array[..end].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Borrows the pointer of each C string, for `pp_enabled_*_names` fields.
pub fn as_ptrs(names: &[&CStr]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_to_string_stops_at_nul() {
        let mut raw = [0 as c_char; 16];
        for (dst, src) in raw.iter_mut().zip(b"VK_KHR_swapchain".iter()) {
            *dst = *src as c_char;
        }
        assert_eq!(vk_to_string(&raw), "VK_KHR_swapchain");

        let mut short = [0 as c_char; 8];
        short[0] = b'a' as c_char;
        short[1] = b'b' as c_char;
        assert_eq!(vk_to_string(&short), "ab");
    }
}
