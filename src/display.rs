//! The display, owner of all the input state.

use std::collections::VecDeque;

use cdk_input_config::Config;
use glam::{DVec2, IVec2};

use crate::backend::{CursorHandle, NativeHandle, Platform};
use crate::device::wintab::translate_axes;
use crate::device::{
    AxisInfo, DeviceId, DeviceManager, DeviceType, InputMode, Notification, TranslateTarget,
};
use crate::event::{Event, EventMask, ModifierType};
use crate::glue::{self, PointerState};
use crate::grab::{GrabRecord, GrabStatus, GrabTable};
use crate::router::RouterState;
use crate::window::{WindowId, WindowKind, WindowTable};
use crate::wintab::{self, DriverSource, TabletManager};

/// Device state as seen from a window.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// Position relative to the window.
    pub position: DVec2,
    /// Axis values, for pointing devices.
    pub axes: Option<Vec<f64>>,
    pub mask: ModifierType,
}

/// A display connection.
///
/// Owns the device registry, the open tablet contexts, the grabs and the router state. There is
/// exactly one of each per display, everything runs on the thread that owns it.
#[derive(Debug)]
pub struct Display {
    pub(crate) platform: Box<dyn Platform>,
    pub(crate) windows: WindowTable,
    pub(crate) devices: DeviceManager,
    pub(crate) grabs: GrabTable,
    pub(crate) tablet: Option<TabletManager>,
    /// Where the tablet driver comes from, until tablet initialization ran.
    driver_source: Option<DriverSource>,
    pub(crate) router: RouterState,
    /// Whether a window is being moved or resized by the user.
    pub(crate) modal_operation: bool,
    pub(crate) events: VecDeque<Event>,
    pub(crate) config: Config,
}

impl Display {
    /// Create a display with its core devices.
    ///
    /// Tablets are not looked for yet, this happens once the display becomes the default one.
    pub fn new(platform: Box<dyn Platform>, driver_source: DriverSource, config: Config) -> Self {
        let windows = WindowTable::new(platform.desktop_window());
        Self {
            platform,
            windows,
            devices: DeviceManager::new(),
            grabs: GrabTable::default(),
            tablet: None,
            driver_source: Some(driver_source),
            router: RouterState::default(),
            modal_operation: false,
            events: VecDeque::new(),
            config,
        }
    }

    /// Load the tablet driver and open a context per tablet.
    ///
    /// Only the first call does something. Any failure leaves the display with the core devices
    /// only.
    pub fn init_tablet(&mut self) {
        let Some(source) = self.driver_source.take() else {
            return;
        };

        let driver = match wintab::load_driver(source, &*self.platform, &self.config) {
            Ok(driver) => driver,
            Err(err) => {
                info!(%err, "Tablet support is not available");
                return;
            }
        };

        self.tablet = TabletManager::init(driver, &*self.platform, &mut self.devices, &self.config);
    }

    pub fn platform(&self) -> &dyn Platform {
        &*self.platform
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn tablet(&self) -> Option<&TabletManager> {
        self.tablet.as_ref()
    }

    pub fn windows(&self) -> &WindowTable {
        &self.windows
    }

    pub fn grabs(&self) -> &GrabTable {
        &self.grabs
    }

    /// Register a native window with the display.
    pub fn add_window(
        &mut self,
        native: NativeHandle,
        parent: WindowId,
        kind: WindowKind,
        scale: i32,
    ) -> WindowId {
        let id = self.windows.insert(native, parent, kind, scale);
        trace!(native, %id, ?kind, scale, "Added window");
        id
    }

    pub fn remove_window(&mut self, window: WindowId) {
        if self.windows.remove(window).is_some() {
            self.grabs.window_destroyed(window);
        }
    }

    pub fn set_window_events(&mut self, window: WindowId, events: EventMask) {
        self.windows.set_events(window, events);
    }

    pub fn set_window_device_events(
        &mut self,
        window: WindowId,
        device: DeviceId,
        events: EventMask,
    ) {
        self.windows.set_device_events(window, device, events);
    }

    pub fn set_window_cursor(&mut self, window: WindowId, cursor: Option<CursorHandle>) {
        if let Some(window) = self.windows.get_mut(window) {
            window.cursor = cursor;
        }
    }

    /// Mark the start or end of a user move or resize of a window.
    ///
    /// No pointer event is produced from tablet packets while one is in progress.
    pub fn set_modal_operation(&mut self, in_progress: bool) {
        self.modal_operation = in_progress;
    }

    pub fn list_devices(&self, device_type: DeviceType) -> Vec<DeviceId> {
        self.devices.list_devices(device_type)
    }

    pub fn client_pointer(&self) -> DeviceId {
        self.devices.client_pointer()
    }

    /// Axes of a device, master devices report the ones of their active slave.
    pub fn device_axes(&self, device: DeviceId) -> &[AxisInfo] {
        self.devices
            .get(device)
            .map(|device| device.axes.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_device_mode(&mut self, device: DeviceId, mode: InputMode) -> bool {
        self.devices.set_mode(device, mode)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.devices.take_notifications()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    /// Number of tablet tools currently driving the cursor.
    pub fn ignore_core(&self) -> u32 {
        self.router.ignore_core
    }

    /// Proximity entries not resolved to a tool yet.
    pub fn entered_proximity(&self) -> u32 {
        self.router.entered_proximity
    }

    /// The device state queries of master devices forward to their active slave.
    fn resolve_slave(&self, device: DeviceId) -> Option<DeviceId> {
        let device = self.devices.get(device)?;
        if device.is_virtual() {
            return device.active_slave();
        }
        Some(device.id)
    }

    /// Geometry used to translate tablet axes for `window`.
    pub(crate) fn translate_target(&self, window: WindowId) -> TranslateTarget {
        let platform = &*self.platform;
        let scale = self.windows.scale(window);
        let origin = glue::window_origin(platform, &self.windows, window);
        let native = self.windows.native(window);

        let size = native
            .and_then(|native| platform.client_rect(native))
            .map_or(IVec2::ZERO, |rect| rect.size / scale);
        let screen = native
            .map(|native| platform.monitor_work_area(native).size)
            .unwrap_or(IVec2::ZERO);

        TranslateTarget {
            origin: origin.as_dvec2(),
            size: size.as_dvec2(),
            screen: screen.as_dvec2(),
        }
    }

    /// State of a device relative to `window`.
    ///
    /// Tablet tools report their last packet, the system devices read the hardware.
    pub fn device_state(&self, device: DeviceId, window: WindowId) -> Option<DeviceState> {
        let slave = self.resolve_slave(device)?;
        let device = self.devices.get(slave)?;
        let platform = &*self.platform;

        if let Some(tool) = device.as_tool() {
            let target = self.translate_target(window);
            let (axes, position) = translate_axes(device, &tool.last_axis_data, &target);
            let mask = glue::current_keyboard_mask(platform)
                | ModifierType::from_button_state(tool.button_state);
            return Some(DeviceState {
                position,
                axes: Some(axes),
                mask,
            });
        }

        if device.is_keyboard() {
            return Some(DeviceState {
                position: DVec2::ZERO,
                axes: None,
                mask: glue::current_keyboard_mask(platform),
            });
        }

        let state = glue::query_state(platform, &self.windows, window)?;
        Some(DeviceState {
            position: state.position,
            axes: Some(vec![state.position.x, state.position.y]),
            mask: state.mask,
        })
    }

    /// Pointer position relative to `window` with the child window under it.
    pub fn device_query_state(&self, device: DeviceId, window: WindowId) -> Option<PointerState> {
        let slave = self.resolve_slave(device)?;
        if self.devices.get(slave)?.is_keyboard() {
            return None;
        }
        glue::query_state(&*self.platform, &self.windows, window)
    }

    /// The window under the pointer, with the position relative to it and the modifiers held.
    pub fn device_window_at_position(
        &self,
        device: DeviceId,
        include_toplevel: bool,
    ) -> Option<(WindowId, DVec2, ModifierType)> {
        let slave = self.resolve_slave(device)?;
        if self.devices.get(slave)?.is_keyboard() {
            return None;
        }

        let platform = &*self.platform;
        let (window, position) = glue::window_at_point(platform, &self.windows, include_toplevel)?;
        Some((window, position, glue::current_keyboard_mask(platform)))
    }

    /// Move the system cursor, in root coordinates.
    pub fn device_warp(&self, position: IVec2) {
        glue::warp(&*self.platform, position);
    }

    /// Grab a device on `window`.
    ///
    /// Grabbing the master pointer captures the native pointer on the window and displays the
    /// grab cursor, the window cursor or the arrow, in that order.
    #[allow(clippy::too_many_arguments)]
    pub fn device_grab(
        &mut self,
        device: DeviceId,
        window: WindowId,
        owner_events: bool,
        event_mask: EventMask,
        confine_to: Option<WindowId>,
        cursor: Option<CursorHandle>,
        time: u32,
    ) -> GrabStatus {
        let Some(target) = self.windows.get(window) else {
            return GrabStatus::NotViewable;
        };
        let (native, window_cursor) = (target.native, target.cursor);
        let Some(grabbed) = self.devices.get(device) else {
            return GrabStatus::Failed;
        };
        let captures = grabbed.is_virtual() && !grabbed.is_keyboard();

        let status = self.grabs.add(GrabRecord {
            device,
            window,
            native_window: window,
            event_mask,
            confine_to,
            owner_events,
            cursor,
            time,
            serial_start: 0,
            serial_end: None,
        });
        if status != GrabStatus::Success {
            debug!(%device, %window, ?status, "Grab refused");
            return status;
        }

        if captures {
            let platform = &*self.platform;
            let previous = self.devices.grab_cursor();
            let shown = cursor
                .or(window_cursor)
                .unwrap_or_else(|| platform.arrow_cursor());
            glue::set_cursor(platform, previous, Some(shown));
            self.devices.set_grab_cursor(cursor);
            platform.set_capture(native);
        }

        debug!(%device, %window, owner_events, "Grabbed device");
        status
    }

    /// End the grab of a device.
    pub fn device_ungrab(&mut self, device: DeviceId) {
        let Some(grabbed) = self.devices.get(device) else {
            return;
        };

        if grabbed.is_virtual() && !grabbed.is_keyboard() {
            let platform = &*self.platform;
            if let Some(cursor) = self.devices.grab_cursor() {
                if platform.cursor() == Some(cursor) {
                    platform.set_cursor(Some(platform.arrow_cursor()));
                }
            }
            self.devices.set_grab_cursor(None);
            platform.release_capture();
        }

        if self.grabs.end(device).is_some() {
            debug!(%device, "Ungrabbed device");
        }
    }
}

impl Drop for Display {
    fn drop(&mut self) {
        if let Some(tablet) = self.tablet.take() {
            let window = tablet.window();
            // Contexts go before the window they post to.
            drop(tablet);
            self.platform.destroy_window(window);
        }
    }
}

/// Tracks the default display.
///
/// Tablets are discovered the first time a default display is set, later displays only get the
/// core devices.
#[derive(Debug, Default)]
pub struct DisplayManager {
    default_display: Option<Display>,
    default_display_opened: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default_display(&mut self, display: Display) -> &mut Display {
        let display = self.default_display.insert(display);
        if !self.default_display_opened {
            self.default_display_opened = true;
            debug!("Doing delayed tablet initialization");
            display.init_tablet();
        }
        display
    }

    pub fn default_display(&self) -> Option<&Display> {
        self.default_display.as_ref()
    }

    pub fn default_display_mut(&mut self) -> Option<&mut Display> {
        self.default_display.as_mut()
    }

    pub fn close_default_display(&mut self) -> Option<Display> {
        self.default_display.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessPlatform;
    use crate::utils::Rect;
    use crate::wintab::simulated::{SimulatedCursor, SimulatedDriver, SimulatedTablet};

    fn tablet() -> SimulatedTablet {
        SimulatedTablet {
            cursors: vec![SimulatedCursor::default()],
            ..Default::default()
        }
    }

    fn display(driver: &SimulatedDriver) -> (Display, HeadlessPlatform) {
        let platform = HeadlessPlatform::new(Rect::new(0, 0, 1920, 1080));
        let display = Display::new(
            Box::new(platform.clone()),
            DriverSource::Simulated(driver.clone()),
            Config::default(),
        );
        (display, platform)
    }

    #[test]
    fn tablets_are_found_with_the_first_default_display() {
        let driver = SimulatedDriver::new(vec![tablet()]);
        let (first, _) = display(&driver);
        let (second, _) = display(&driver);
        let mut manager = DisplayManager::new();

        let display = manager.set_default_display(first);
        assert!(display.tablet().is_some());
        assert_eq!(display.list_devices(DeviceType::Slave).len(), 3);

        let display = manager.set_default_display(second);
        assert!(display.tablet().is_none());
        assert_eq!(display.list_devices(DeviceType::Slave).len(), 2);
    }

    #[test]
    fn tablet_initialization_runs_once() {
        let driver = SimulatedDriver::new(vec![tablet()]);
        let (mut display, _) = display(&driver);
        display.init_tablet();
        display.init_tablet();
        assert_eq!(display.tablet().unwrap().contexts().len(), 1);
    }

    #[test]
    fn dropping_the_display_closes_the_tablet() {
        let driver = SimulatedDriver::new(vec![tablet()]);
        let (mut display, _) = display(&driver);
        display.init_tablet();
        let handle = driver.context_handle(0).unwrap();
        assert!(driver.is_open(handle));

        drop(display);
        assert!(!driver.is_open(handle));
    }

    #[test]
    fn master_pointer_grab_captures_and_sets_the_cursor() {
        let driver = SimulatedDriver::new(Vec::new());
        let (mut display, platform) = display(&driver);
        let native = platform.add_window(None, Rect::new(10, 10, 100, 100));
        let window = display.add_window(native, WindowId::ROOT, WindowKind::Toplevel, 1);
        display.set_window_cursor(window, Some(77));
        let pointer = display.client_pointer();

        let status =
            display.device_grab(pointer, window, false, EventMask::empty(), None, None, 10);
        assert_eq!(status, GrabStatus::Success);
        assert_eq!(platform.captured(), Some(native));
        assert_eq!(platform.cursor(), Some(77));

        let status =
            display.device_grab(pointer, window, true, EventMask::empty(), None, Some(5), 20);
        assert_eq!(status, GrabStatus::Success);
        assert_eq!(platform.cursor(), Some(5));
        assert!(display.grabs().last_grab(pointer).unwrap().owner_events);

        display.device_ungrab(pointer);
        assert_eq!(platform.captured(), None);
        assert_eq!(platform.cursor(), Some(platform.arrow_cursor()));
        assert!(display.grabs().last_grab(pointer).is_none());
    }

    #[test]
    fn grabs_need_a_known_window() {
        let driver = SimulatedDriver::new(Vec::new());
        let (mut display, platform) = display(&driver);
        let pointer = display.client_pointer();

        let status =
            display.device_grab(pointer, WindowId(9), false, EventMask::empty(), None, None, 0);
        assert_eq!(status, GrabStatus::NotViewable);
        assert_eq!(platform.captured(), None);
    }

    #[test]
    fn older_grabs_move_the_capture() {
        let driver = SimulatedDriver::new(Vec::new());
        let (mut display, platform) = display(&driver);
        let first = platform.add_window(None, Rect::new(10, 10, 100, 100));
        let second = platform.add_window(None, Rect::new(200, 10, 100, 100));
        let first = display.add_window(first, WindowId::ROOT, WindowKind::Toplevel, 1);
        let second_id = display.add_window(second, WindowId::ROOT, WindowKind::Toplevel, 1);
        let pointer = display.client_pointer();

        display.device_grab(pointer, first, false, EventMask::empty(), None, None, 100);
        let status =
            display.device_grab(pointer, second_id, false, EventMask::empty(), None, None, 50);
        assert_eq!(status, GrabStatus::Success);
        assert_eq!(platform.captured(), Some(second));
        assert_eq!(display.grabs().last_grab(pointer).unwrap().window, second_id);
    }

    #[test]
    fn master_pointer_state_forwards_to_the_system_pointer() {
        let driver = SimulatedDriver::new(Vec::new());
        let (mut display, platform) = display(&driver);
        let native = platform.add_window(None, Rect::new(100, 100, 200, 200));
        let window = display.add_window(native, WindowId::ROOT, WindowKind::Toplevel, 2);
        platform.move_cursor(IVec2::new(150, 120));

        let state = display
            .device_state(display.client_pointer(), window)
            .unwrap();
        assert_eq!(state.position, DVec2::new(25.0, 10.0));
        assert_eq!(state.axes, Some(vec![25.0, 10.0]));

        let (hit, position, _) = display
            .device_window_at_position(display.client_pointer(), false)
            .unwrap();
        assert_eq!(hit, window);
        assert_eq!(position, DVec2::new(25.0, 10.0));

        let keyboard = display.devices().core_keyboard();
        assert!(display.device_window_at_position(keyboard, false).is_none());
        assert_eq!(display.device_state(keyboard, window).unwrap().axes, None);
    }

    #[test]
    fn removed_windows_end_their_grabs() {
        let driver = SimulatedDriver::new(Vec::new());
        let (mut display, platform) = display(&driver);
        let native = platform.add_window(None, Rect::new(10, 10, 100, 100));
        let window = display.add_window(native, WindowId::ROOT, WindowKind::Toplevel, 1);
        let pointer = display.client_pointer();

        display.device_grab(pointer, window, false, EventMask::empty(), None, None, 0);
        display.remove_window(window);
        assert!(display.grabs().last_grab(pointer).is_none());
        assert_eq!(display.windows().lookup(native), None);
    }
}
