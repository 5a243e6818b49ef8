// Presentation surface for the window
//
// Created from the window's native handles, destroyed before the instance.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;

use super::instance::Instance;
use crate::platform::Window;

pub struct Surface {
    pub loader: khr::Surface,
    pub handle: vk::SurfaceKHR,
}

/// What a physical device can do with this surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl Surface {
    pub fn new(instance: &Instance, window: &dyn Window) -> Result<Self> {
        let handle = window.create_surface(&instance.entry, &instance.handle)?;
        let loader = khr::Surface::new(&instance.entry, &instance.handle);

        Ok(Self { loader, handle })
    }

    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        let supported = unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family,
                self.handle,
            )
        }
        .context("Failed to query surface present support")?;

        Ok(supported)
    }

    pub fn formats(&self, physical_device: vk::PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>> {
        let formats = unsafe {
            self.loader
                .get_physical_device_surface_formats(physical_device, self.handle)
        }
        .context("Failed to query surface formats")?;

        Ok(formats)
    }

    pub fn present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::PresentModeKHR>> {
        let modes = unsafe {
            self.loader
                .get_physical_device_surface_present_modes(physical_device, self.handle)
        }
        .context("Failed to query surface present modes")?;

        Ok(modes)
    }

    pub fn query_support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        let capabilities = unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.handle)
        }
        .context("Failed to query surface capabilities")?;

        Ok(SurfaceSupport {
            capabilities,
            formats: self.formats(physical_device)?,
            present_modes: self.present_modes(physical_device)?,
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        log::debug!("Destroyed surface");
    }
}
