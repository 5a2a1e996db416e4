//! Vulkan context management
//!
//! Instance, surface, physical device selection and the logical device with
//! its queues. Everything here lives for the whole program; the swapchain and
//! its dependents are owned by the renderer and rebuilt independently.

use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface as SurfaceLoader, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};

use super::commands::CommandPool;
use super::image::select_depth_format;
use super::{VkResultExt, VulkanError, VulkanResult};
use crate::render::window::Window;

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a Vulkan 1.2 instance with the window system's extensions
    ///
    /// When `enable_validation` is set and the Khronos layer is installed,
    /// validation messages are routed into `log`.
    pub fn new(required_extensions: &[String], app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::Loading(e.to_string()))?;

        let app_name = CString::new(app_name)
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid application name: {e}")))?;
        let engine_name = CString::new("vk_boilerplate")
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_2);

        let extension_names = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VulkanError::InitializationFailed(format!("Invalid extension name: {e}")))?;
        let mut extensions: Vec<*const std::os::raw::c_char> =
            extension_names.iter().map(|ext| ext.as_ptr()).collect();

        let validation = enable_validation && Self::validation_layer_available(&entry)?;
        if enable_validation && !validation {
            log::warn!("Validation requested but {} is not installed", VALIDATION_LAYER.to_string_lossy());
        }

        let mut layers = Vec::new();
        if validation {
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(DebugUtils::name().as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None) }.during("creating instance")?;

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!(
            "Created Vulkan instance ({} extension(s), validation {})",
            extensions.len(),
            if validation { "on" } else { "off" }
        );

        Ok(Self { entry, instance, debug })
    }

    /// Whether the debug messenger is active
    pub fn validation_enabled(&self) -> bool {
        self.debug.is_some()
    }

    fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .during("enumerating instance layers")?;
        Ok(layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER
        }))
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .during("creating debug messenger")
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Window surface with its extension loader
pub struct Surface {
    loader: SurfaceLoader,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create the presentation surface for `window`
    pub fn new(instance: &VulkanInstance, window: &mut Window) -> VulkanResult<Self> {
        let loader = SurfaceLoader::new(&instance.entry, &instance.instance);
        let surface = window
            .create_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;
        Ok(Self { loader, surface })
    }

    /// Get the surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Get the surface loader
    pub fn loader(&self) -> &SurfaceLoader {
        &self.loader
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .during("querying surface capabilities")
    }

    /// Get surface formats for a physical device
    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.surface)
        }
        .during("querying surface formats")
    }

    /// Get surface present modes for a physical device
    pub fn present_modes(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.surface)
        }
        .during("querying present modes")
    }

    /// Check if a queue family can present to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
        }
        .during("querying present support")
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// What one queue family can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyCaps {
    /// Capability flags reported by the driver
    pub flags: vk::QueueFlags,
    /// Number of queues in the family
    pub queue_count: u32,
    /// Whether the family can present to the target surface
    pub present: bool,
}

impl QueueFamilyCaps {
    fn supports(&self, flags: vk::QueueFlags) -> bool {
        self.queue_count > 0 && self.flags.contains(flags)
    }

    // Graphics and compute queues implicitly accept transfer work
    fn supports_transfer(&self) -> bool {
        self.queue_count > 0
            && self
                .flags
                .intersects(vk::QueueFlags::TRANSFER | vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
    }
}

/// Selected queue family indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for rendering and uploads
    pub graphics: u32,
    /// Family for compute work
    pub compute: u32,
    /// Family for transfer work
    pub transfer: u32,
    /// Family used for presentation
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Distinct family indices, in ascending order
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.compute, self.transfer, self.present]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Pick graphics, compute, transfer and present families
///
/// Each role prefers a family not already taken by an earlier role and falls
/// back to sharing one when the device has nothing distinct to offer.
/// Returns `None` when some role has no capable family at all.
pub fn select_queue_families(families: &[QueueFamilyCaps]) -> Option<QueueFamilyIndices> {
    fn pick(families: &[QueueFamilyCaps], taken: &[u32], capable: impl Fn(&QueueFamilyCaps) -> bool) -> Option<u32> {
        let candidates: Vec<u32> = families
            .iter()
            .enumerate()
            .filter_map(|(index, caps)| capable(caps).then_some(index as u32))
            .collect();
        candidates
            .iter()
            .copied()
            .find(|index| !taken.contains(index))
            .or_else(|| candidates.first().copied())
    }

    let graphics = pick(families, &[], |f| f.supports(vk::QueueFlags::GRAPHICS))?;
    let compute = pick(families, &[graphics], |f| f.supports(vk::QueueFlags::COMPUTE))?;
    let transfer = pick(families, &[graphics, compute], QueueFamilyCaps::supports_transfer)?;
    let present = pick(families, &[graphics, compute, transfer], |f| f.queue_count > 0 && f.present)?;

    Some(QueueFamilyIndices {
        graphics,
        compute,
        transfer,
        present,
    })
}

/// Everything device selection looks at, gathered up front
#[derive(Debug, Clone, Default)]
pub struct DeviceSupport {
    /// Device API version
    pub api_version: u32,
    /// Per-family capabilities against the target surface
    pub queue_families: Vec<QueueFamilyCaps>,
    /// `VK_KHR_swapchain` is available
    pub swapchain_extension: bool,
    /// Partially bound, variable count, runtime sized sampler arrays
    pub descriptor_indexing: bool,
    /// Number of surface formats reported
    pub surface_formats: usize,
    /// Number of present modes reported
    pub present_modes: usize,
}

impl DeviceSupport {
    /// Queue families to use, or the reason the device is rejected
    pub fn qualify(&self) -> Result<QueueFamilyIndices, &'static str> {
        if self.api_version < vk::API_VERSION_1_2 {
            return Err("Vulkan 1.2 not supported");
        }
        if !self.swapchain_extension {
            return Err("VK_KHR_swapchain not supported");
        }
        if !self.descriptor_indexing {
            return Err("descriptor indexing not supported");
        }
        if self.surface_formats == 0 || self.present_modes == 0 {
            return Err("no surface formats or present modes");
        }
        select_queue_families(&self.queue_families).ok_or("missing graphics, compute, transfer or present queue")
    }
}

/// Return the first candidate that qualifies, with its queue families
///
/// No ranking: enumeration order decides. A candidate whose support could
/// not be queried is skipped like any other unqualified device.
pub fn select_first_qualifying<T>(
    candidates: impl IntoIterator<Item = (T, VulkanResult<DeviceSupport>)>,
) -> Result<(T, QueueFamilyIndices), VulkanError> {
    let mut examined = 0;
    for (candidate, support) in candidates {
        examined += 1;
        let support = match support {
            Ok(support) => support,
            Err(err) => {
                log::warn!("Skipping device #{}: support query failed: {}", examined - 1, err);
                continue;
            }
        };
        match support.qualify() {
            Ok(families) => return Ok((candidate, families)),
            Err(reason) => log::debug!("Skipping device #{}: {}", examined - 1, reason),
        }
    }
    Err(VulkanError::NoSuitableDevice { examined })
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device name as reported by the driver
    pub name: String,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory types and heaps
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Supported core features
    pub features: vk::PhysicalDeviceFeatures,
    /// Selected queue families
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Select the first physical device that can drive `surface`
    pub fn select_suitable_device(instance: &Instance, surface: &Surface) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.during("enumerating physical devices")?;
        log::debug!("Found {} physical device(s)", devices.len());

        let candidates = devices
            .into_iter()
            .map(|device| (device, Self::query_support(instance, device, surface)));
        let (device, queue_families) = select_first_qualifying(candidates)?;

        let properties = unsafe { instance.get_physical_device_properties(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        log::info!("Selected GPU: {} ({:?})", name, queue_families);

        Ok(Self {
            device,
            name,
            properties,
            memory_properties,
            features,
            queue_families,
        })
    }

    fn query_support(instance: &Instance, device: vk::PhysicalDevice, surface: &Surface) -> VulkanResult<DeviceSupport> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut queue_families = Vec::with_capacity(families.len());
        for (index, family) in families.iter().enumerate() {
            queue_families.push(QueueFamilyCaps {
                flags: family.queue_flags,
                queue_count: family.queue_count,
                present: surface.supports_present(device, index as u32)?,
            });
        }

        let extensions =
            unsafe { instance.enumerate_device_extension_properties(device) }.during("enumerating device extensions")?;
        let swapchain_extension = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });

        let descriptor_indexing = properties.api_version >= vk::API_VERSION_1_2 && {
            let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
            {
                let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut indexing);
                unsafe { instance.get_physical_device_features2(device, &mut features2) };
            }
            indexing.descriptor_binding_partially_bound == vk::TRUE
                && indexing.descriptor_binding_variable_descriptor_count == vk::TRUE
                && indexing.runtime_descriptor_array == vk::TRUE
                && indexing.shader_sampled_image_array_non_uniform_indexing == vk::TRUE
        };

        Ok(DeviceSupport {
            api_version: properties.api_version,
            queue_families,
            swapchain_extension,
            descriptor_indexing,
            surface_formats: surface.formats(device)?.len(),
            present_modes: surface.present_modes(device)?.len(),
        })
    }

    /// Device limits
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Compute queue
    pub compute_queue: vk::Queue,
    /// Transfer queue
    pub transfer_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Family indices the queues come from
    pub families: QueueFamilyIndices,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the logical device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device.queue_families;
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&[1.0])
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let core_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical_device.features.sampler_anisotropy == vk::TRUE)
            .build();
        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::builder()
            .descriptor_binding_partially_bound(true)
            .descriptor_binding_variable_descriptor_count(true)
            .runtime_descriptor_array(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .build();
        let mut features2 = vk::PhysicalDeviceFeatures2::builder()
            .features(core_features)
            .push_next(&mut indexing)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .push_next(&mut features2);

        let device = unsafe { instance.create_device(physical_device.device, &create_info, None) }
            .during("creating logical device")?;

        let queue = |family| unsafe { device.get_device_queue(family, 0) };
        let graphics_queue = queue(families.graphics);
        let compute_queue = queue(families.compute);
        let transfer_queue = queue(families.transfer);
        let present_queue = queue(families.present);

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!("Created logical device with {} queue family(ies)", queue_infos.len());

        Ok(Self {
            device,
            graphics_queue,
            compute_queue,
            transfer_queue,
            present_queue,
            families,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context that owns all long-lived Vulkan objects
///
/// Fields drop top to bottom: the upload pool before the device, the device
/// before the surface, the surface before the instance.
pub struct VulkanContext {
    upload_pool: CommandPool,
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    depth_format: vk::Format,
    surface: Surface,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create a new Vulkan context for the window
    pub fn new(window: &mut Window, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;
        let instance = VulkanInstance::new(&extensions, app_name, enable_validation)?;
        let surface = Surface::new(&instance, window)?;
        let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, &surface)?;
        let depth_format = select_depth_format(&instance.instance, physical_device.device)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;
        let upload_pool = CommandPool::new(
            device.device.clone(),
            device.families.graphics,
            device.graphics_queue,
        )?;

        Ok(Self {
            upload_pool,
            device,
            physical_device,
            depth_format,
            surface,
            instance,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the presentation surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the logical device
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get a clone of the raw `Device` handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Selected queue families
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.device.families
    }

    /// Memory types of the selected device
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical_device.memory_properties
    }

    /// Format used for depth attachments
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Pool used for one-time upload command buffers
    pub fn upload_pool(&self) -> &CommandPool {
        &self.upload_pool
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle() }.during("waiting for device idle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Q = vk::QueueFlags;

    fn family(flags: vk::QueueFlags, present: bool) -> QueueFamilyCaps {
        QueueFamilyCaps {
            flags,
            queue_count: 1,
            present,
        }
    }

    #[test]
    fn test_distinct_families_preferred() {
        // Typical discrete GPU: universal family, async compute, DMA
        let families = [
            family(Q::GRAPHICS | Q::COMPUTE | Q::TRANSFER, true),
            family(Q::COMPUTE | Q::TRANSFER, true),
            family(Q::TRANSFER, false),
            family(Q::GRAPHICS | Q::COMPUTE | Q::TRANSFER, true),
        ];
        let selected = select_queue_families(&families).unwrap();
        assert_eq!(
            selected,
            QueueFamilyIndices {
                graphics: 0,
                compute: 1,
                transfer: 2,
                present: 3,
            }
        );
        assert_eq!(selected.unique(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_single_universal_family_is_shared() {
        let families = [family(Q::GRAPHICS | Q::COMPUTE | Q::TRANSFER, true)];
        let selected = select_queue_families(&families).unwrap();
        assert_eq!(selected.graphics, 0);
        assert_eq!(selected.compute, 0);
        assert_eq!(selected.transfer, 0);
        assert_eq!(selected.present, 0);
        assert_eq!(selected.unique(), vec![0]);
    }

    #[test]
    fn test_partial_overlap() {
        let families = [
            family(Q::GRAPHICS | Q::COMPUTE | Q::TRANSFER, true),
            family(Q::TRANSFER, false),
        ];
        let selected = select_queue_families(&families).unwrap();
        assert_eq!(selected.graphics, 0);
        assert_eq!(selected.compute, 0);
        assert_eq!(selected.transfer, 1);
        assert_eq!(selected.present, 0);
    }

    #[test]
    fn test_missing_role_fails() {
        let no_present = [family(Q::GRAPHICS | Q::COMPUTE, false)];
        assert!(select_queue_families(&no_present).is_none());

        let no_graphics = [family(Q::COMPUTE | Q::TRANSFER, true)];
        assert!(select_queue_families(&no_graphics).is_none());
    }

    #[test]
    fn test_empty_family_is_ignored() {
        let families = [
            QueueFamilyCaps {
                flags: Q::GRAPHICS | Q::COMPUTE,
                queue_count: 0,
                present: true,
            },
            family(Q::GRAPHICS | Q::COMPUTE, true),
        ];
        let selected = select_queue_families(&families).unwrap();
        assert_eq!(selected.graphics, 1);
    }

    fn capable() -> DeviceSupport {
        DeviceSupport {
            api_version: vk::API_VERSION_1_3,
            queue_families: vec![family(Q::GRAPHICS | Q::COMPUTE | Q::TRANSFER, true)],
            swapchain_extension: true,
            descriptor_indexing: true,
            surface_formats: 2,
            present_modes: 1,
        }
    }

    #[test]
    fn test_first_qualifying_device_wins() {
        let no_modes = DeviceSupport {
            present_modes: 0,
            ..capable()
        };
        let (picked, _) =
            select_first_qualifying([("a", Ok(no_modes)), ("b", Ok(capable())), ("c", Ok(capable()))]).unwrap();
        assert_eq!(picked, "b");
    }

    #[test]
    fn test_failed_query_skips_device() {
        let lost = Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR));
        let (picked, families) = select_first_qualifying([("lost", lost), ("ok", Ok(capable()))]).unwrap();
        assert_eq!(picked, "ok");
        assert_eq!(families.graphics, 0);

        let lost = Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST));
        let err = select_first_qualifying([((), lost)]).unwrap_err();
        assert!(matches!(err, VulkanError::NoSuitableDevice { examined: 1 }));
    }

    #[test]
    fn test_no_device_is_fatal() {
        let err = select_first_qualifying(Vec::<((), VulkanResult<DeviceSupport>)>::new()).unwrap_err();
        assert!(matches!(err, VulkanError::NoSuitableDevice { examined: 0 }));

        let old = DeviceSupport {
            api_version: vk::API_VERSION_1_0,
            ..capable()
        };
        let no_indexing = DeviceSupport {
            descriptor_indexing: false,
            ..capable()
        };
        let err = select_first_qualifying([(0, Ok(old)), (1, Ok(no_indexing))]).unwrap_err();
        assert!(matches!(err, VulkanError::NoSuitableDevice { examined: 2 }));
    }
}
