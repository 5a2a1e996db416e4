//! Device memory helpers
//!
//! Memory type selection and alignment math shared by buffers and images.

use ash::vk;

use super::{VulkanError, VulkanResult};

/// Find the first memory type allowed by `type_bits` whose property flags
/// contain `flags`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(flags)
        })
        .ok_or(VulkanError::NoSuitableMemoryType { type_bits, flags })
}

/// Round `size` up to the next multiple of `alignment` (a power of two, or 0
/// for "no requirement")
pub fn align_up(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment == 0 {
        return size;
    }
    debug_assert!(alignment.is_power_of_two(), "alignment {alignment} is not a power of two");
    (size + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Flags = vk::MemoryPropertyFlags;

    /// Memory layout of a typical discrete GPU
    fn discrete_gpu() -> vk::PhysicalDeviceMemoryProperties {
        let types = [
            Flags::DEVICE_LOCAL,
            Flags::HOST_VISIBLE | Flags::HOST_COHERENT,
            Flags::HOST_VISIBLE | Flags::HOST_COHERENT | Flags::HOST_CACHED,
            Flags::DEVICE_LOCAL | Flags::HOST_VISIBLE | Flags::HOST_COHERENT,
            Flags::empty(),
        ];
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn test_selected_type_satisfies_request_for_all_pairs() {
        let props = discrete_gpu();
        let requests = [
            Flags::empty(),
            Flags::DEVICE_LOCAL,
            Flags::HOST_VISIBLE,
            Flags::HOST_VISIBLE | Flags::HOST_COHERENT,
            Flags::HOST_CACHED,
            Flags::DEVICE_LOCAL | Flags::HOST_VISIBLE,
            Flags::LAZILY_ALLOCATED,
        ];

        for type_bits in 0u32..(1 << props.memory_type_count) {
            for &flags in &requests {
                let expected = (0..props.memory_type_count).any(|i| {
                    type_bits & (1 << i) != 0
                        && props.memory_types[i as usize].property_flags.contains(flags)
                });
                match find_memory_type(&props, type_bits, flags) {
                    Ok(index) => {
                        assert!(expected);
                        assert_ne!(type_bits & (1 << index), 0);
                        assert!(props.memory_types[index as usize].property_flags.contains(flags));
                    }
                    Err(VulkanError::NoSuitableMemoryType { .. }) => assert!(!expected),
                    Err(other) => panic!("unexpected error {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_first_fit() {
        let props = discrete_gpu();
        // Types 1, 2 and 3 are all host visible; the lowest allowed wins
        assert_eq!(find_memory_type(&props, 0b1110, Flags::HOST_VISIBLE).unwrap(), 1);
        assert_eq!(find_memory_type(&props, 0b1100, Flags::HOST_VISIBLE).unwrap(), 2);
    }

    #[test]
    fn test_types_beyond_count_are_ignored() {
        let props = discrete_gpu();
        assert!(find_memory_type(&props, 1 << 10, Flags::empty()).is_err());
    }

    #[test]
    fn test_align_up_matches_mask_formula() {
        for shift in 0..9 {
            let alignment: vk::DeviceSize = 1 << shift;
            for size in 0..1000 {
                let aligned = align_up(size, alignment);
                assert_eq!(aligned, (size + alignment - 1) & !(alignment - 1));
                assert_eq!(aligned % alignment, 0);
                assert!(aligned >= size && aligned - size < alignment);
            }
        }
    }

    #[test]
    fn test_align_up_zero_alignment() {
        assert_eq!(align_up(13, 0), 13);
    }
}
