//! The device registry of a display.

use super::{
    AxisInfo, AxisUse, Device, DeviceId, DeviceKind, DeviceType, InputMode, InputSource,
    WintabDevice,
};
use crate::backend::CursorHandle;
use crate::seat::{Seat, SeatId};
use crate::wintab::ffi::ContextHandle;

/// Registry changes the widget layer is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The axes or the active slave of a device changed.
    Changed(DeviceId),
    Added(DeviceId),
}

/// Description of a new tablet tool.
#[derive(Debug, Clone)]
pub struct NewTool {
    pub name: String,
    pub source: InputSource,
    pub mode: InputMode,
    pub sends_core: bool,
    pub axes: Vec<AxisInfo>,
}

#[derive(Debug)]
pub struct DeviceManager {
    /// In creation order.
    devices: Vec<Device>,
    core_pointer: DeviceId,
    core_keyboard: DeviceId,
    system_pointer: DeviceId,
    system_keyboard: DeviceId,
    seat: Seat,
    notifications: Vec<Notification>,
    /// Cursor shown while a virtual device holds a grab.
    grab_cursor: Option<CursorHandle>,
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceManager {
    pub fn new() -> Self {
        let core_pointer = DeviceId(0);
        let system_pointer = DeviceId(1);
        let core_keyboard = DeviceId(2);
        let system_keyboard = DeviceId(3);

        let mut pointer = Device::new(
            core_pointer,
            "Virtual Core Pointer",
            DeviceType::Master,
            InputSource::Mouse,
            DeviceKind::Virtual { active_slave: None },
        );
        pointer.has_cursor = true;
        let mut system = Device::new(
            system_pointer,
            "System Aggregated Pointer",
            DeviceType::Slave,
            InputSource::Mouse,
            DeviceKind::System,
        );
        system.axes = vec![
            AxisInfo::new(AxisUse::X, 0.0, 0.0, 1.0),
            AxisInfo::new(AxisUse::Y, 0.0, 0.0, 1.0),
        ];
        let keyboard = Device::new(
            core_keyboard,
            "Virtual Core Keyboard",
            DeviceType::Master,
            InputSource::Keyboard,
            DeviceKind::Virtual { active_slave: None },
        );
        let system_kbd = Device::new(
            system_keyboard,
            "System Aggregated Keyboard",
            DeviceType::Slave,
            InputSource::Keyboard,
            DeviceKind::System,
        );

        let mut manager = Self {
            devices: vec![pointer, system, keyboard, system_kbd],
            core_pointer,
            core_keyboard,
            system_pointer,
            system_keyboard,
            seat: Seat::new(SeatId(0), core_pointer, core_keyboard),
            notifications: Vec::new(),
            grab_cursor: None,
        };

        manager.set_active_slave(core_pointer, system_pointer);
        manager.attach(system_pointer, core_pointer);
        manager.set_active_slave(core_keyboard, system_keyboard);
        manager.attach(system_keyboard, core_keyboard);

        manager.set_associated(core_pointer, core_keyboard);
        manager.set_associated(core_keyboard, core_pointer);

        manager.seat.add_slave(system_pointer);
        manager.seat.add_slave(system_keyboard);

        // Nobody could have observed the construction.
        manager.notifications.clear();
        manager
    }

    fn set_associated(&mut self, device: DeviceId, associated: DeviceId) {
        if let Some(device) = self.get_mut(device) {
            device.associated = Some(associated);
        }
    }

    /// Make `slave` a slave of `master`.
    fn attach(&mut self, slave: DeviceId, master: DeviceId) {
        self.set_associated(slave, master);
        if let Some(master) = self.get_mut(master) {
            if !master.slaves.contains(&slave) {
                master.slaves.push(slave);
            }
        }
    }

    /// Devices of one type.
    ///
    /// Masters come as pointer then keyboard, slaves as system pointer, system keyboard then
    /// tablet tools in discovery order.
    pub fn list_devices(&self, device_type: DeviceType) -> Vec<DeviceId> {
        self.devices
            .iter()
            .filter(|device| device.device_type == device_type)
            .map(|device| device.id)
            .collect()
    }

    pub fn client_pointer(&self) -> DeviceId {
        self.core_pointer
    }

    pub fn core_pointer(&self) -> DeviceId {
        self.core_pointer
    }

    pub fn core_keyboard(&self) -> DeviceId {
        self.core_keyboard
    }

    pub fn system_pointer(&self) -> DeviceId {
        self.system_pointer
    }

    pub fn system_keyboard(&self) -> DeviceId {
        self.system_keyboard
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|device| device.id == id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.iter_mut().find(|device| device.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn seat(&self) -> &Seat {
        &self.seat
    }

    /// The seat a device belongs to.
    pub fn device_seat(&self, device: DeviceId) -> Option<SeatId> {
        self.seat.contains(device).then_some(self.seat.id)
    }

    pub fn active_slave(&self, device: DeviceId) -> Option<DeviceId> {
        self.get(device).and_then(Device::active_slave)
    }

    /// Point a virtual device at another slave.
    ///
    /// Pointer masters take over the axes of the slave, keyboards never have any.
    pub fn set_active_slave(&mut self, device: DeviceId, slave: DeviceId) {
        let Some(slave_axes) = self.get(slave).map(|slave| slave.axes.clone()) else {
            warn!(%device, %slave, "Unknown slave device");
            return;
        };
        let Some(virtual_device) = self.get_mut(device) else {
            return;
        };
        let is_keyboard = virtual_device.is_keyboard();
        let DeviceKind::Virtual { active_slave } = &mut virtual_device.kind else {
            warn!(%device, "Not a virtual device");
            return;
        };
        if *active_slave == Some(slave) {
            return;
        }

        *active_slave = Some(slave);
        if !is_keyboard {
            virtual_device.axes = slave_axes;
        }

        debug!(%device, %slave, "Active slave changed");
        self.notifications.push(Notification::Changed(device));
    }

    /// Register a tablet tool.
    ///
    /// Tools that drive the system cursor become slaves of the master pointer, the others float.
    pub fn add_tool(&mut self, new: NewTool, tool: WintabDevice) -> DeviceId {
        let id = DeviceId(self.devices.iter().map(|device| device.id.0 + 1).max().unwrap_or(0));
        let device_type = if new.sends_core {
            DeviceType::Slave
        } else {
            DeviceType::Floating
        };

        let mut device = Device::new(
            id,
            new.name,
            device_type,
            new.source,
            DeviceKind::Tool(Box::new(tool)),
        );
        device.mode = new.mode;
        device.has_cursor = new.sends_core;
        device.axes = new.axes;
        self.devices.push(device);

        if new.sends_core {
            self.attach(id, self.core_pointer);
        }
        self.seat.add_slave(id);
        self.notifications.push(Notification::Added(id));
        id
    }

    /// Tablet tools, in discovery order.
    pub fn tools(&self) -> impl Iterator<Item = (&Device, &WintabDevice)> {
        self.devices
            .iter()
            .filter_map(|device| device.as_tool().map(|tool| (device, tool)))
    }

    /// Find the tool a packet was produced by.
    pub fn find_tool(&self, context: ContextHandle, cursor: u32) -> Option<DeviceId> {
        self.tools()
            .find(|(_, tool)| tool.context == context && tool.cursor == cursor)
            .map(|(device, _)| device.id)
    }

    pub fn set_mode(&mut self, device: DeviceId, mode: InputMode) -> bool {
        let Some(device) = self.get_mut(device) else {
            return false;
        };
        if device.mode == mode {
            return true;
        }
        // Only tools can switch, core devices always follow the screen.
        if device.as_tool().is_none() {
            return false;
        }

        device.mode = mode;
        let id = device.id;
        self.notifications.push(Notification::Changed(id));
        true
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn grab_cursor(&self) -> Option<CursorHandle> {
        self.grab_cursor
    }

    pub fn set_grab_cursor(&mut self, cursor: Option<CursorHandle>) {
        self.grab_cursor = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::wintab::tests::tool_with_axes;

    #[test]
    fn construction() {
        let manager = DeviceManager::new();
        let pointer = manager.client_pointer();

        assert_eq!(
            manager.list_devices(DeviceType::Master),
            vec![pointer, manager.core_keyboard()]
        );
        assert_eq!(
            manager.list_devices(DeviceType::Slave),
            vec![manager.system_pointer(), manager.system_keyboard()]
        );
        assert!(manager.list_devices(DeviceType::Floating).is_empty());

        assert_eq!(manager.active_slave(pointer), Some(manager.system_pointer()));
        assert_eq!(
            manager.active_slave(manager.core_keyboard()),
            Some(manager.system_keyboard())
        );

        let core = manager.get(pointer).unwrap();
        assert_eq!(core.associated, Some(manager.core_keyboard()));
        assert_eq!(core.slaves, vec![manager.system_pointer()]);
        assert_eq!(core.axes, manager.get(manager.system_pointer()).unwrap().axes);
        assert!(manager.get(manager.core_keyboard()).unwrap().axes.is_empty());

        assert_eq!(
            manager.get(manager.system_keyboard()).unwrap().associated,
            Some(manager.core_keyboard())
        );
        for device in manager.iter() {
            assert_eq!(manager.device_seat(device.id), Some(SeatId(0)));
        }
    }

    #[test]
    fn construction_is_not_notified() {
        let mut manager = DeviceManager::new();
        assert!(manager.take_notifications().is_empty());
    }

    #[test]
    fn active_slave_copies_axes() {
        let mut manager = DeviceManager::new();
        let pointer = manager.core_pointer();
        let (new, tool) = tool_with_axes(true);
        let tool_axes = new.axes.clone();
        let id = manager.add_tool(new, tool);
        manager.take_notifications();

        manager.set_active_slave(pointer, id);
        assert_eq!(manager.get(pointer).unwrap().axes, tool_axes);
        assert_eq!(manager.take_notifications(), vec![Notification::Changed(pointer)]);

        // Same slave again is not a change.
        manager.set_active_slave(pointer, id);
        assert!(manager.take_notifications().is_empty());

        let system = manager.system_pointer();
        manager.set_active_slave(pointer, system);
        assert_eq!(manager.get(pointer).unwrap().axes.len(), 2);
    }

    #[test]
    fn keyboards_never_take_axes() {
        let mut manager = DeviceManager::new();
        let keyboard = manager.core_keyboard();
        manager.set_active_slave(keyboard, manager.system_pointer());
        assert!(manager.get(keyboard).unwrap().axes.is_empty());
        assert_eq!(manager.active_slave(keyboard), Some(manager.system_pointer()));
    }

    #[test]
    fn tools_are_listed_by_type() {
        let mut manager = DeviceManager::new();
        let (core_tool, tool) = tool_with_axes(true);
        let slave = manager.add_tool(core_tool, tool);
        let (floating_tool, mut tool) = tool_with_axes(false);
        tool.cursor = 2;
        let floating = manager.add_tool(floating_tool, tool);

        assert_eq!(
            manager.list_devices(DeviceType::Slave),
            vec![manager.system_pointer(), manager.system_keyboard(), slave]
        );
        assert_eq!(manager.list_devices(DeviceType::Floating), vec![floating]);
        assert!(manager
            .get(manager.core_pointer())
            .unwrap()
            .slaves
            .contains(&slave));
        assert!(manager.seat().contains(floating));

        let context = manager.get(slave).unwrap().as_tool().unwrap().context;
        assert_eq!(manager.find_tool(context, 2), Some(floating));
        assert_eq!(manager.find_tool(context, 7), None);
    }

    #[test]
    fn only_tools_change_mode() {
        let mut manager = DeviceManager::new();
        let (new, tool) = tool_with_axes(true);
        let id = manager.add_tool(new, tool);
        manager.take_notifications();

        assert!(manager.set_mode(id, InputMode::Window));
        assert_eq!(manager.get(id).unwrap().mode, InputMode::Window);
        assert_eq!(manager.take_notifications(), vec![Notification::Changed(id)]);
        assert!(!manager.set_mode(manager.system_pointer(), InputMode::Disabled));
    }
}
