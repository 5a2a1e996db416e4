//! Descriptor set layouts, pools and per-frame sets
//!
//! A [`DescriptorSetGroup`] owns one layout, a pool sized for it and one set
//! per frame slot. The highest-numbered binding may be a variable-count
//! array (`PARTIALLY_BOUND | VARIABLE_DESCRIPTOR_COUNT`): its layout count is
//! an upper bound and each set is allocated with the number of elements
//! actually in use, so shaders can index a texture table sized at load time.

use std::collections::BTreeSet;

use ash::{vk, Device};

use super::{VkResultExt, VulkanError, VulkanResult};

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDesc {
    /// Binding number in the shader
    pub binding: u32,
    /// Descriptor type
    pub ty: vk::DescriptorType,
    /// Stages that read the binding
    pub stages: vk::ShaderStageFlags,
    /// Array length, or the upper bound for a variable binding
    pub count: u32,
    /// Whether the array length is chosen at allocation time
    pub variable: bool,
}

impl BindingDesc {
    /// Single descriptor of the given type
    pub fn new(binding: u32, ty: vk::DescriptorType, stages: vk::ShaderStageFlags) -> Self {
        Self {
            binding,
            ty,
            stages,
            count: 1,
            variable: false,
        }
    }

    /// Uniform buffer binding
    pub fn uniform_buffer(binding: u32, stages: vk::ShaderStageFlags) -> Self {
        Self::new(binding, vk::DescriptorType::UNIFORM_BUFFER, stages)
    }

    /// Storage buffer binding
    pub fn storage_buffer(binding: u32, stages: vk::ShaderStageFlags) -> Self {
        Self::new(binding, vk::DescriptorType::STORAGE_BUFFER, stages)
    }

    /// Combined image sampler binding
    pub fn sampler(binding: u32, stages: vk::ShaderStageFlags) -> Self {
        Self::new(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stages)
    }

    /// Variable-count combined image sampler array with at most `max` elements
    pub fn sampler_array(binding: u32, stages: vk::ShaderStageFlags, max: u32) -> Self {
        Self {
            count: max,
            variable: true,
            ..Self::sampler(binding, stages)
        }
    }
}

/// Reject layouts the group cannot build
pub fn validate_bindings(bindings: &[BindingDesc]) -> VulkanResult<()> {
    let invalid = |reason: String| Err(VulkanError::InvalidOperation { reason });

    if bindings.is_empty() {
        return invalid("descriptor set layout needs at least one binding".to_string());
    }
    let mut seen = BTreeSet::new();
    for desc in bindings {
        if !seen.insert(desc.binding) {
            return invalid(format!("binding {} declared twice", desc.binding));
        }
        if desc.count == 0 {
            return invalid(format!("binding {} has zero descriptors", desc.binding));
        }
    }

    let highest = bindings.iter().map(|d| d.binding).max().unwrap_or_default();
    let variable: Vec<_> = bindings.iter().filter(|d| d.variable).collect();
    match variable.as_slice() {
        [] => Ok(()),
        [desc] if desc.binding == highest => Ok(()),
        [desc] => invalid(format!(
            "variable binding {} must be the highest-numbered (highest is {})",
            desc.binding, highest
        )),
        _ => invalid("only one binding may have a variable descriptor count".to_string()),
    }
}

/// Elements each set gets for its variable binding: `requested` capped by
/// the layout's upper bound, or 0 without a variable binding
pub fn effective_variable_count(bindings: &[BindingDesc], requested: u32) -> u32 {
    bindings
        .iter()
        .find(|d| d.variable)
        .map_or(0, |d| requested.min(d.count))
}

/// Per-set counts passed to `vkAllocateDescriptorSets`; empty when the layout
/// has no variable binding
pub fn variable_counts(bindings: &[BindingDesc], frames: usize, requested: u32) -> Vec<u32> {
    if bindings.iter().any(|d| d.variable) {
        vec![effective_variable_count(bindings, requested); frames]
    } else {
        Vec::new()
    }
}

/// Pool sizes for `frames` sets, one entry per descriptor type
pub fn pool_sizes(bindings: &[BindingDesc], frames: usize, variable_count: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for desc in bindings {
        let per_set = if desc.variable {
            effective_variable_count(bindings, variable_count)
        } else {
            desc.count
        };
        let count = per_set * frames as u32;
        match sizes.iter_mut().find(|size| size.ty == desc.ty) {
            Some(size) => size.descriptor_count += count,
            None => sizes.push(vk::DescriptorPoolSize {
                ty: desc.ty,
                descriptor_count: count,
            }),
        }
    }
    // A zero-sized entry is invalid; an empty variable array needs none
    sizes.retain(|size| size.descriptor_count > 0);
    sizes
}

/// Layout bindings and their per-binding flags
pub fn layout_bindings(bindings: &[BindingDesc]) -> (Vec<vk::DescriptorSetLayoutBinding>, Vec<vk::DescriptorBindingFlags>) {
    bindings
        .iter()
        .map(|desc| {
            let binding = vk::DescriptorSetLayoutBinding::builder()
                .binding(desc.binding)
                .descriptor_type(desc.ty)
                .descriptor_count(desc.count)
                .stage_flags(desc.stages)
                .build();
            let flags = if desc.variable {
                vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT
            } else {
                vk::DescriptorBindingFlags::empty()
            };
            (binding, flags)
        })
        .unzip()
}

/// One write per array element, covering elements `[0, infos.len())`
///
/// The writes point into `infos`, which must outlive their use.
pub fn image_array_writes(
    set: vk::DescriptorSet,
    binding: u32,
    ty: vk::DescriptorType,
    infos: &[vk::DescriptorImageInfo],
) -> Vec<vk::WriteDescriptorSet> {
    infos
        .iter()
        .enumerate()
        .map(|(element, info)| {
            vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(element as u32)
                .descriptor_type(ty)
                .image_info(std::slice::from_ref(info))
                .build()
        })
        .collect()
}

/// Descriptor pool, layout and one set per frame slot
pub struct DescriptorSetGroup {
    device: Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    sets: Vec<vk::DescriptorSet>,
    bindings: Vec<BindingDesc>,
    variable_count: u32,
}

impl DescriptorSetGroup {
    /// Create the layout, a pool for `frames` sets and the sets themselves
    ///
    /// `variable_count` is the number of elements each set gets for the
    /// variable binding (capped by its upper bound); ignored without one.
    pub fn new(device: Device, bindings: &[BindingDesc], frames: usize, variable_count: u32) -> VulkanResult<Self> {
        validate_bindings(bindings)?;
        if frames == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "descriptor group needs at least one frame".to_string(),
            });
        }

        let (layout_bindings, binding_flags) = layout_bindings(bindings);
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder()
            .binding_flags(&binding_flags)
            .build();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(&layout_bindings)
            .push_next(&mut flags_info);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .during("creating descriptor set layout")?;

        // From here on `group` owns what exists, so early returns clean up
        let mut group = Self {
            device,
            pool: vk::DescriptorPool::null(),
            layout,
            sets: Vec::new(),
            bindings: bindings.to_vec(),
            variable_count: effective_variable_count(bindings, variable_count),
        };

        let sizes = pool_sizes(bindings, frames, variable_count);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(frames as u32)
            .pool_sizes(&sizes);
        group.pool = unsafe { group.device.create_descriptor_pool(&pool_info, None) }
            .during("creating descriptor pool")?;

        let layouts = vec![layout; frames];
        let counts = variable_counts(bindings, frames, variable_count);
        let mut count_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::builder()
            .descriptor_counts(&counts)
            .build();
        let mut alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(group.pool)
            .set_layouts(&layouts);
        if !counts.is_empty() {
            alloc_info = alloc_info.push_next(&mut count_info);
        }

        group.sets = unsafe { group.device.allocate_descriptor_sets(&alloc_info) }
            .during("allocating descriptor sets")?;

        log::debug!(
            "Created descriptor group: {} binding(s), {} set(s), variable count {}",
            bindings.len(),
            frames,
            group.variable_count
        );

        Ok(group)
    }

    fn binding(&self, binding: u32) -> VulkanResult<&BindingDesc> {
        self.bindings
            .iter()
            .find(|desc| desc.binding == binding)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("descriptor group has no binding {binding}"),
            })
    }

    fn set(&self, slot: usize) -> VulkanResult<vk::DescriptorSet> {
        self.sets.get(slot).copied().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("descriptor group has {} set(s), asked for slot {}", self.sets.len(), slot),
        })
    }

    /// Point a buffer binding of one slot's set at `info`
    pub fn write_buffer(&self, slot: usize, binding: u32, info: vk::DescriptorBufferInfo) -> VulkanResult<()> {
        let desc = self.binding(binding)?;
        let infos = [info];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(self.set(slot)?)
            .dst_binding(binding)
            .dst_array_element(0)
            .descriptor_type(desc.ty)
            .buffer_info(&infos)
            .build();
        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        Ok(())
    }

    /// Point an image binding of one slot's set at `info`
    pub fn write_image(&self, slot: usize, binding: u32, info: vk::DescriptorImageInfo) -> VulkanResult<()> {
        self.write_image_array(slot, binding, &[info])
    }

    /// Fill elements `[0, infos.len())` of an image array binding
    pub fn write_image_array(&self, slot: usize, binding: u32, infos: &[vk::DescriptorImageInfo]) -> VulkanResult<()> {
        let desc = self.binding(binding)?;
        let capacity = if desc.variable { self.variable_count } else { desc.count };
        if infos.len() as u32 > capacity {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "{} image(s) written to binding {} holding {}",
                    infos.len(),
                    binding,
                    capacity
                ),
            });
        }

        let writes = image_array_writes(self.set(slot)?, binding, desc.ty, infos);
        unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        Ok(())
    }

    /// Layout handle, for pipeline layouts
    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Set for a frame slot
    pub fn set_for(&self, slot: usize) -> vk::DescriptorSet {
        self.sets[slot % self.sets.len()]
    }

    /// Elements allocated for the variable binding in every set
    pub fn variable_count(&self) -> u32 {
        self.variable_count
    }

    /// Number of sets (one per frame slot)
    pub fn frames(&self) -> usize {
        self.sets.len()
    }
}

impl Drop for DescriptorSetGroup {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its sets
            if self.pool != vk::DescriptorPool::null() {
                self.device.destroy_descriptor_pool(self.pool, None);
            }
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    const FRAGMENT: vk::ShaderStageFlags = vk::ShaderStageFlags::FRAGMENT;
    const VERTEX: vk::ShaderStageFlags = vk::ShaderStageFlags::VERTEX;

    fn bindless(max: u32) -> Vec<BindingDesc> {
        vec![
            BindingDesc::uniform_buffer(0, VERTEX | FRAGMENT),
            BindingDesc::storage_buffer(1, VERTEX),
            BindingDesc::sampler_array(2, FRAGMENT, max),
        ]
    }

    #[test]
    fn test_variable_count_matches_loaded_textures_for_every_slot() {
        let bindings = bindless(64);
        for textures in [0, 1, 7, 64] {
            for frames in 1..=3 {
                let counts = variable_counts(&bindings, frames, textures);
                assert_eq!(counts.len(), frames);
                assert!(counts.iter().all(|&c| c == textures));
            }
        }
    }

    #[test]
    fn test_variable_count_capped_by_bound() {
        let bindings = bindless(16);
        assert_eq!(effective_variable_count(&bindings, 100), 16);
        assert_eq!(variable_counts(&bindings, 2, 100), vec![16, 16]);
    }

    #[test]
    fn test_no_variable_binding_means_no_counts() {
        let bindings = [BindingDesc::uniform_buffer(0, VERTEX)];
        assert!(variable_counts(&bindings, 2, 5).is_empty());
        assert_eq!(effective_variable_count(&bindings, 5), 0);
    }

    #[test]
    fn test_array_writes_are_contiguous_from_zero() {
        let set = vk::DescriptorSet::from_raw(0x1234);
        for k in [1usize, 3, 12] {
            let infos: Vec<vk::DescriptorImageInfo> = (0..k)
                .map(|i| vk::DescriptorImageInfo {
                    sampler: vk::Sampler::from_raw(i as u64 + 1),
                    image_view: vk::ImageView::from_raw(i as u64 + 100),
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                })
                .collect();
            let writes = image_array_writes(set, 2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, &infos);

            assert_eq!(writes.len(), k);
            let elements: Vec<u32> = writes.iter().map(|w| w.dst_array_element).collect();
            assert_eq!(elements, (0..k as u32).collect::<Vec<_>>());
            for (write, info) in writes.iter().zip(&infos) {
                assert_eq!(write.dst_set, set);
                assert_eq!(write.dst_binding, 2);
                assert_eq!(write.descriptor_count, 1);
                assert_eq!(write.p_image_info, info as *const _);
            }
        }
    }

    #[test]
    fn test_layout_flags_only_on_variable_binding() {
        let (bindings, flags) = layout_bindings(&bindless(32));
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[2].descriptor_count, 32);
        assert_eq!(flags[0], vk::DescriptorBindingFlags::empty());
        assert_eq!(flags[1], vk::DescriptorBindingFlags::empty());
        assert_eq!(
            flags[2],
            vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT
        );
    }

    #[test]
    fn test_pool_sizes_scale_with_frames() {
        let bindings = [
            BindingDesc::uniform_buffer(0, VERTEX),
            BindingDesc::uniform_buffer(1, FRAGMENT),
            BindingDesc::sampler_array(2, FRAGMENT, 32),
        ];
        let sizes = pool_sizes(&bindings, 3, 5);
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 6);
        assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 15);

        // Empty texture table leaves no sampler entry behind
        let sizes = pool_sizes(&bindings, 2, 0);
        assert_eq!(sizes.len(), 1);
    }

    #[test]
    fn test_binding_validation() {
        assert!(validate_bindings(&bindless(8)).is_ok());
        assert!(validate_bindings(&[]).is_err());

        let duplicate = [BindingDesc::uniform_buffer(0, VERTEX), BindingDesc::sampler(0, FRAGMENT)];
        assert!(validate_bindings(&duplicate).is_err());

        let variable_not_last = [
            BindingDesc::sampler_array(0, FRAGMENT, 8),
            BindingDesc::uniform_buffer(1, VERTEX),
        ];
        assert!(validate_bindings(&variable_not_last).is_err());

        let two_variable = [
            BindingDesc::sampler_array(0, FRAGMENT, 8),
            BindingDesc::sampler_array(1, FRAGMENT, 8),
        ];
        assert!(validate_bindings(&two_variable).is_err());

        let empty_array = [BindingDesc {
            count: 0,
            ..BindingDesc::sampler(0, FRAGMENT)
        }];
        assert!(validate_bindings(&empty_array).is_err());
    }
}
