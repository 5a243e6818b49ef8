// Vulkan instance + debug messenger
//
// Responsibilities:
// - Load the Vulkan library
// - Instance creation with the window's surface extensions
// - Validation layer probing (best effort, never required)
// - Routing validation messages into `log`

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::{c_char, CStr, CString};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the loader, the instance and the optional debug messenger.
/// Dropping it destroys the messenger, then the instance.
pub struct Instance {
    pub entry: Entry,
    pub handle: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Create the instance.
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `platform_extensions` - Surface extensions required by the window
    /// * `enable_validation` - Request validation layers if they are installed
    pub fn new(
        app_name: &str,
        platform_extensions: &[&'static CStr],
        enable_validation: bool,
    ) -> Result<Self> {
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        let validation = enable_validation && Self::is_validation_layer_supported(&entry)?;
        if enable_validation && !validation {
            log::warn!(
                "Validation layer {} not available, continuing without it",
                VALIDATION_LAYER.to_string_lossy()
            );
        }

        let handle = Self::create_instance(&entry, app_name, platform_extensions, validation)?;

        let mut instance = Self {
            entry,
            handle,
            debug_utils: None,
        };

        if validation {
            instance.setup_debug_messenger()?;
        }

        Ok(instance)
    }

    /// Probe the installed instance layers for the validation layer by name.
    pub fn is_validation_layer_supported(entry: &Entry) -> Result<bool> {
        let available = entry
            .enumerate_instance_layer_properties()
            .context("Failed to enumerate instance layers")?;

        Ok(has_layer(&available, VALIDATION_LAYER))
    }

    pub fn is_validation_enabled(&self) -> bool {
        self.debug_utils.is_some()
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        platform_extensions: &[&'static CStr],
        validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&app_name_cstr)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let extensions = instance_extensions(platform_extensions, validation);
        let extension_ptrs: Vec<*const c_char> = extensions.iter().map(|e| e.as_ptr()).collect();

        let layer_names = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        // Chained so instance creation and destruction are covered too
        let mut debug_info = debug_messenger_info();

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_names);

        if validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        log::info!(
            "Created Vulkan instance ({} extensions, validation {})",
            extensions.len(),
            if validation { "on" } else { "off" }
        );

        Ok(instance)
    }

    fn setup_debug_messenger(&mut self) -> Result<()> {
        let debug_utils = DebugUtils::new(&self.entry, &self.handle);
        let create_info = debug_messenger_info();

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to set up debug messenger")?;

        self.debug_utils = Some((debug_utils, messenger));
        Ok(())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.handle.destroy_instance(None);
        }
        log::debug!("Destroyed Vulkan instance");
    }
}

/// Window extensions plus debug utils when validation is on, without duplicates.
pub(crate) fn instance_extensions(platform: &[&'static CStr], validation: bool) -> Vec<&'static CStr> {
    let mut extensions = platform.to_vec();
    if validation && !extensions.contains(&DebugUtils::name()) {
        extensions.push(DebugUtils::name());
    }
    extensions
}

pub(crate) fn has_layer(available: &[vk::LayerProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == name)
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &CStr) -> vk::LayerProperties {
        let mut props = vk::LayerProperties::default();
        for (dst, &src) in props.layer_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        props
    }

    #[test]
    fn validation_layer_is_found_by_name() {
        let available = [layer(c"VK_LAYER_MESA_device_select"), layer(VALIDATION_LAYER)];
        assert!(has_layer(&available, VALIDATION_LAYER));
    }

    #[test]
    fn missing_validation_layer_is_reported() {
        let available = [layer(c"VK_LAYER_MESA_device_select")];
        assert!(!has_layer(&available, VALIDATION_LAYER));
        assert!(!has_layer(&[], VALIDATION_LAYER));
    }

    #[test]
    fn debug_utils_added_only_with_validation() {
        let platform = [c"VK_KHR_surface", c"VK_KHR_xlib_surface"];

        assert_eq!(instance_extensions(&platform, false), platform.to_vec());

        let with_validation = instance_extensions(&platform, true);
        assert_eq!(with_validation.len(), 3);
        assert_eq!(with_validation[2], DebugUtils::name());
    }

    #[test]
    fn debug_utils_not_duplicated() {
        let platform = [c"VK_KHR_surface", DebugUtils::name()];
        assert_eq!(instance_extensions(&platform, true).len(), 2);
    }
}
