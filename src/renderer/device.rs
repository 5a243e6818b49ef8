// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection (first GPU that can present to the surface)
// - Queue family discovery (graphics + present)
// - Logical device + queue creation with the swapchain extension
//
// Pure setup: nothing here runs per frame.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{c_char, CStr};
use std::sync::Arc;

use super::instance::Instance;
use super::surface::Surface;

/// Device extensions every candidate must support.
fn required_extensions() -> [&'static CStr; 1] {
    [khr::Swapchain::name()]
}

/// Graphics and present queue families of one physical device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan `families` for a graphics family and, independently, a family that
    /// can present. Stops as soon as both are known.
    pub fn find<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> Result<Self>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }

            if supports_present(index)? {
                indices.present = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// (graphics, present) once both are known.
    pub fn resolved(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.present?))
    }

    /// Distinct families among graphics and present, ascending.
    pub fn unique_families(&self) -> Vec<u32> {
        self.graphics
            .into_iter()
            .chain(self.present)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Logical device wrapper with automatic cleanup
pub struct Device {
    pub handle: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub swapchain_loader: khr::Swapchain,

    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_family: u32,
    present_family: u32,

    // Device properties (cached for logging)
    pub properties: vk::PhysicalDeviceProperties,
}

impl Device {
    pub fn new(instance: &Instance, surface: &Surface) -> Result<Arc<Self>> {
        let (physical_device, indices) = Self::pick_physical_device(instance, surface)?;
        let (graphics_family, present_family) = indices
            .resolved()
            .context("Selected GPU has incomplete queue families")?;

        let handle = Self::create_logical_device(instance, physical_device, &indices)?;

        let graphics_queue = unsafe { handle.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { handle.get_device_queue(present_family, 0) };
        let swapchain_loader = khr::Swapchain::new(&instance.handle, &handle);

        let properties = unsafe { instance.handle.get_physical_device_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::info!(
            "Queue families: graphics {}, present {}",
            graphics_family,
            present_family
        );

        Ok(Arc::new(Self {
            handle,
            physical_device,
            swapchain_loader,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
            properties,
        }))
    }

    pub fn get(&self) -> &ash::Device {
        &self.handle
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn queue_family_indices(&self) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics: Some(self.graphics_family),
            present: Some(self.present_family),
        }
    }

    /// Block until the device is idle (e.g. before destroying or recreating resources)
    pub fn wait(&self) -> Result<()> {
        unsafe { self.handle.device_wait_idle() }.context("Failed to wait for device idle")?;
        Ok(())
    }

    fn pick_physical_device(
        instance: &Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
        let devices = unsafe { instance.handle.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        if devices.is_empty() {
            anyhow::bail!("Failed to find a GPU with Vulkan support");
        }

        for device in devices {
            if let Some(indices) = Self::is_device_suitable(instance, surface, device)? {
                return Ok((device, indices));
            }
        }

        anyhow::bail!("Failed to find a suitable GPU")
    }

    /// Queue families of `device` if it can drive the surface, `None` otherwise.
    fn is_device_suitable(
        instance: &Instance,
        surface: &Surface,
        device: vk::PhysicalDevice,
    ) -> Result<Option<QueueFamilyIndices>> {
        let families = unsafe {
            instance
                .handle
                .get_physical_device_queue_family_properties(device)
        };
        let indices = QueueFamilyIndices::find(&families, |index| {
            surface.supports_present(device, index)
        })?;

        let extensions = unsafe { instance.handle.enumerate_device_extension_properties(device) }
            .context("Failed to enumerate device extensions")?;
        let missing = missing_extensions(&extensions, &required_extensions());
        if !missing.is_empty() {
            log::debug!("Skipping GPU without extensions {:?}", missing);
            return Ok(None);
        }

        let has_formats = !surface.formats(device)?.is_empty();
        let has_present_modes = !surface.present_modes(device)?.is_empty();

        Ok((indices.is_complete() && has_formats && has_present_modes).then_some(indices))
    }

    fn create_logical_device(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        indices: &QueueFamilyIndices,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = indices
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let extensions: Vec<*const c_char> = required_extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.handle.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        Ok(device)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        if let Err(e) = self.wait() {
            log::error!("Device wait failed during shutdown: {:#}", e);
        }
        unsafe {
            self.handle.destroy_device(None);
        }
    }
}

/// Names from `required` that `available` does not list.
pub(crate) fn missing_extensions<'a>(
    available: &[vk::ExtensionProperties],
    required: &[&'a CStr],
) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|name| {
            !available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == *name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, &src) in props.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn single_family_serving_both_stops_immediately() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let queried = RefCell::new(Vec::new());

        let indices = QueueFamilyIndices::find(&families, |index| {
            queried.borrow_mut().push(index);
            Ok(true)
        })
        .unwrap();

        assert_eq!(indices.resolved(), Some((0, 0)));
        assert_eq!(*queried.borrow(), vec![0]);
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn split_families_are_both_found() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];

        let indices = QueueFamilyIndices::find(&families, |index| Ok(index == 1)).unwrap();

        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
        assert_eq!(indices.unique_families(), vec![0, 1]);
    }

    #[test]
    fn no_present_family_is_incomplete() {
        let families = [family(vk::QueueFlags::GRAPHICS)];

        let indices = QueueFamilyIndices::find(&families, |_| Ok(false)).unwrap();

        assert!(!indices.is_complete());
        assert_eq!(indices.resolved(), None);
    }

    #[test]
    fn present_query_failure_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS)];

        let result = QueueFamilyIndices::find(&families, |_| anyhow::bail!("surface lost"));

        assert!(result.is_err());
    }

    #[test]
    fn swapchain_extension_is_required() {
        let with_swapchain = [
            extension(c"VK_KHR_maintenance1"),
            extension(khr::Swapchain::name()),
        ];
        assert!(missing_extensions(&with_swapchain, &required_extensions()).is_empty());

        let without = [extension(c"VK_KHR_maintenance1")];
        assert_eq!(
            missing_extensions(&without, &required_extensions()),
            vec![khr::Swapchain::name()]
        );
    }
}
