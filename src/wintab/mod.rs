//! Wintab tablet support.
//!
//! The driver is optional: it is a shared library that may or may not be installed. When it
//! loads, every tablet it reports gets a context opened on a hidden window that receives the
//! packet messages, and every usable cursor of the tablet becomes a tool device.

use std::path::PathBuf;

use cdk_input_config::Config;
use serde::Serialize;

use crate::backend::{NativeHandle, Platform};
use crate::device::manager::NewTool;
use crate::device::wintab::tool_axes;
use crate::device::{DeviceId, DeviceManager, InputMode, InputSource, WintabDevice};

#[cfg(windows)]
pub mod dll;
pub mod driver;
pub mod ffi;
pub mod simulated;

use driver::{CursorInfo, ToolKind, WintabDriver};
use ffi::{ContextHandle, LogContext, Packet};
use simulated::SimulatedDriver;

/// Wacom drivers report cursors that do not exist on this device with a zero physical ID.
const PHANTOM_CURSOR_DEVICE: &str = "WACOM Tablet";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("tablet support is disabled")]
    Disabled,
    #[error("the system directory could not be found")]
    NoSystemDirectory,
    #[error("failed to load {}: {message}", path.display())]
    Library { path: PathBuf, message: String },
    #[error("the driver does not export {0}")]
    MissingSymbol(&'static str),
    #[error("the driver reports it is not available")]
    NotAvailable,
    #[error("there is no tablet driver on this platform")]
    Unsupported,
}

/// Where the tablet driver comes from.
#[derive(Debug)]
pub enum DriverSource {
    /// The driver library installed in the system directory.
    #[cfg(windows)]
    System,
    Simulated(SimulatedDriver),
    None,
}

/// Load and probe the tablet driver.
pub fn load_driver(
    source: DriverSource,
    platform: &dyn Platform,
    config: &Config,
) -> Result<Box<dyn WintabDriver>, LoadError> {
    if config.tablet.disable {
        return Err(LoadError::Disabled);
    }
    let directory = platform
        .system_directory()
        .ok_or(LoadError::NoSystemDirectory)?;

    let driver: Box<dyn WintabDriver> = match source {
        #[cfg(windows)]
        DriverSource::System => {
            let path = directory.join(&config.tablet.library_name);
            Box::new(dll::DllDriver::load(&path)?)
        }
        DriverSource::Simulated(driver) => {
            trace!(?directory, "Using the simulated tablet driver");
            Box::new(driver)
        }
        DriverSource::None => return Err(LoadError::Unsupported),
    };

    if !driver.is_available() {
        return Err(LoadError::NotAvailable);
    }
    Ok(driver)
}

/// An open tablet context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabletContext {
    pub handle: ContextHandle,
    pub device_index: u32,
    pub first_cursor: u32,
    pub cursor_count: u32,
    /// The packet queue size the driver accepted, if any.
    pub queue_size: Option<i32>,
    /// The tool devices created for this context.
    pub tools: Vec<DeviceId>,
}

/// The open contexts of the tablet driver.
///
/// Contexts are disabled and closed when the manager is dropped.
#[derive(Debug)]
pub struct TabletManager {
    driver: Box<dyn WintabDriver>,
    window: NativeHandle,
    contexts: Vec<TabletContext>,
}

impl TabletManager {
    /// Open a context per tablet and register its tools in `devices`.
    ///
    /// Returns `None` if the window receiving tablet messages could not be created. A context
    /// that fails to open stops the discovery, tablets found before it are kept.
    pub fn init(
        driver: Box<dyn WintabDriver>,
        platform: &dyn Platform,
        devices: &mut DeviceManager,
        config: &Config,
    ) -> Option<Self> {
        let spec_version = driver.spec_version();
        let device_count = driver.device_count();
        info!(
            version = %format!("{}.{}", spec_version >> 8, spec_version & 0xFF),
            devices = device_count,
            cursors = driver.cursor_count(),
            "Initializing Wintab"
        );

        let Some(window) = platform.create_tablet_window() else {
            warn!("Failed to create the tablet window");
            return None;
        };

        let mut manager = Self {
            driver,
            window,
            contexts: Vec::new(),
        };

        for device_index in 0..device_count {
            if !manager.open_device(device_index, spec_version, devices, config) {
                break;
            }
        }

        Some(manager)
    }

    /// Open the context of a tablet and add its tools.
    ///
    /// Returns `false` when the context could not be opened.
    fn open_device(
        &mut self,
        device_index: u32,
        spec_version: u16,
        devices: &mut DeviceManager,
        config: &Config,
    ) -> bool {
        let driver = &*self.driver;
        let print_contexts = config.debug.print_contexts;

        let Some(info) = driver.device_info(device_index) else {
            warn!(device_index, "Tablet reported without a description");
            return true;
        };
        debug!(device_index, name = %info.name, "Found tablet");

        // Some drivers claim 1.1 without providing the device contexts.
        let mut context = if spec_version >= 0x0101 {
            let context = driver.default_context(Some(device_index));
            if context.is_none() {
                debug!(device_index, "No device specific default context");
            }
            context
        } else {
            None
        };
        if context.is_none() {
            context = driver.default_context(None);
        }
        let Some(mut context) = context else {
            warn!(device_index, "No default tablet context");
            return true;
        };

        if print_contexts {
            dump_context("Default context", &context);
        }
        context.rewrite_for_messages();
        if print_contexts {
            dump_context("Rewritten context", &context);
        }

        let Some(handle) = driver.open(self.window, &context, true) else {
            warn!(device_index, "Failed to open the tablet context");
            return false;
        };
        debug!(?handle, device_index, "Opened tablet context");

        driver.overlap(handle, true);
        if print_contexts {
            if let Some(opened) = driver.get_context(handle) {
                dump_context("Opened context", &opened);
            }
        }

        // Bigger queues lose fewer packets, the driver tells us what it can do.
        let queue_size = std::iter::successors(Some(config.tablet.max_queue_size.max(1)), |&size| {
            (size > 1).then_some(size / 2)
        })
        .find(|&size| driver.set_queue_size(handle, size));
        match queue_size {
            Some(size) => debug!(?handle, size, "Set tablet queue size"),
            None => debug!(?handle, "No tablet queue size could be set"),
        }

        let mut tools = Vec::new();
        let last_cursor = info.first_cursor.saturating_add(info.cursor_types);
        for cursor in info.first_cursor..last_cursor {
            let Some(cursor_info) = driver.cursor_info(cursor) else {
                continue;
            };
            if print_contexts {
                dump_cursor(cursor, &cursor_info);
            }
            if !cursor_info.active {
                continue;
            }
            if config.tablet.skip_phantom_cursors
                && info.name == PHANTOM_CURSOR_DEVICE
                && cursor_info.physical_id == 0
            {
                debug!(cursor, name = %cursor_info.name, "Skipping phantom cursor");
                continue;
            }

            let name = format!("{} {}", info.name, cursor_info.name);
            let sends_core = context.sends_core();
            let axes = tool_axes(cursor_info.packet_data, &info.x, &info.y, &info.pressure);
            let tool = WintabDevice::new(
                handle,
                cursor,
                cursor_info.packet_data,
                [info.orientation[0], info.orientation[1]],
                sends_core,
                axes.len(),
            );
            let new = NewTool {
                mode: config.device_mode(&name).unwrap_or(InputMode::Screen),
                name,
                source: match cursor_info.kind {
                    ToolKind::Pen => InputSource::Pen,
                    ToolKind::Eraser => InputSource::Eraser,
                    ToolKind::Cursor => InputSource::Cursor,
                },
                sends_core,
                axes,
            };

            let num_axes = new.axes.len();
            let id = devices.add_tool(new, tool);
            debug!(%id, cursor, sends_core, num_axes, "Added tablet tool");
            tools.push(id);
        }

        self.contexts.push(TabletContext {
            handle,
            device_index,
            first_cursor: info.first_cursor,
            cursor_count: info.cursor_types,
            queue_size,
            tools,
        });
        true
    }

    /// Bring every context to the top of the overlap order.
    ///
    /// Called when one of our windows gets activated.
    pub fn set_tablet_active(&self) {
        if self.contexts.is_empty() {
            return;
        }

        trace!("Bringing tablet contexts to the top");
        for context in &self.contexts {
            self.driver.overlap(context.handle, true);
        }
    }

    /// Fetch a packet the driver told us about.
    pub fn packet(&self, context: ContextHandle, serial: u32) -> Option<Packet> {
        self.driver.packet(context, serial)
    }

    pub fn contexts(&self) -> &[TabletContext] {
        &self.contexts
    }

    /// The hidden window receiving tablet messages.
    pub fn window(&self) -> NativeHandle {
        self.window
    }
}

impl Drop for TabletManager {
    fn drop(&mut self) {
        for context in self.contexts.drain(..) {
            self.driver.enable(context.handle, false);
            if !self.driver.close(context.handle) {
                warn!(handle = ?context.handle, "Failed to close tablet context");
            }
        }
    }
}

fn dump_context(label: &str, context: &LogContext) {
    debug!(
        name = %context.name(),
        options = ?context.option_names(),
        status = context.lcStatus,
        device = context.lcDevice,
        pkt_data = %format!("{:#x}", context.lcPktData),
        pkt_mode = %format!("{:#x}", context.lcPktMode),
        in_org = ?(context.lcInOrgX, context.lcInOrgY),
        in_ext = ?(context.lcInExtX, context.lcInExtY),
        out_org = ?(context.lcOutOrgX, context.lcOutOrgY),
        out_ext = ?(context.lcOutExtX, context.lcOutExtY),
        "{label}"
    );
}

fn dump_cursor(cursor: u32, info: &CursorInfo) {
    debug!(
        cursor,
        name = %info.name,
        active = info.active,
        pkt_data = ?info.packet_data,
        buttons = info.buttons,
        physid = %format!("{:#x}", info.physical_id),
        kind = ?info.kind,
        "Tablet cursor"
    );
}
