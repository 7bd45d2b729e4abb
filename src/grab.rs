//! Device grabs.
//!
//! Only the bookkeeping lives here, acquiring the native capture is done by the device that is
//! grabbed.

use std::collections::HashMap;

use crate::backend::CursorHandle;
use crate::device::DeviceId;
use crate::event::EventMask;
use crate::window::WindowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabStatus {
    Success,
    /// Unused on this platform, grabs on a viewable window always succeed.
    InvalidTime,
    NotViewable,
    Frozen,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrabRecord {
    pub device: DeviceId,
    pub window: WindowId,
    /// The window that holds the native capture.
    pub native_window: WindowId,
    pub event_mask: EventMask,
    pub confine_to: Option<WindowId>,
    pub owner_events: bool,
    pub cursor: Option<CursorHandle>,
    pub time: u32,
    pub serial_start: u64,
    /// Serial at which the grab ended, `None` while it is active.
    pub serial_end: Option<u64>,
}

impl GrabRecord {
    pub fn is_active(&self) -> bool {
        self.serial_end.is_none()
    }
}

/// Every grab a display has seen, per device.
#[derive(Debug, Default)]
pub struct GrabTable {
    grabs: HashMap<DeviceId, Vec<GrabRecord>>,
    serial: u64,
}

impl GrabTable {
    /// Advance and get the request serial.
    pub fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }

    /// Start a grab, ending the active one of the same device whatever its time.
    pub fn add(&mut self, mut grab: GrabRecord) -> GrabStatus {
        let serial = self.next_serial();
        let grabs = self.grabs.entry(grab.device).or_default();

        if let Some(last) = grabs.last_mut().filter(|last| last.is_active()) {
            trace!(device = ?grab.device, window = %last.window, "Superseding grab");
            last.serial_end = Some(serial);
        }

        grab.serial_start = serial;
        grab.serial_end = None;
        grabs.push(grab);
        GrabStatus::Success
    }

    /// The active grab of a device.
    pub fn last_grab(&self, device: DeviceId) -> Option<&GrabRecord> {
        self.grabs
            .get(&device)
            .and_then(|grabs| grabs.last())
            .filter(|grab| grab.is_active())
    }

    /// End the active grab of a device, returning it.
    pub fn end(&mut self, device: DeviceId) -> Option<&GrabRecord> {
        let serial = self.next_serial();
        let grab = self
            .grabs
            .get_mut(&device)
            .and_then(|grabs| grabs.last_mut())
            .filter(|grab| grab.is_active())?;
        grab.serial_end = Some(serial);
        Some(&*grab)
    }

    /// Forget grabs on windows that are going away.
    pub fn window_destroyed(&mut self, window: WindowId) {
        let serial = self.next_serial();
        for grab in self.grabs.values_mut().flat_map(|grabs| grabs.iter_mut()) {
            if grab.is_active() && (grab.window == window || grab.native_window == window) {
                grab.serial_end = Some(serial);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grab(device: u32, window: u32, time: u32) -> GrabRecord {
        GrabRecord {
            device: DeviceId(device),
            window: WindowId(window),
            native_window: WindowId(window),
            event_mask: EventMask::POINTER_MOTION,
            confine_to: None,
            owner_events: false,
            cursor: None,
            time,
            serial_start: 0,
            serial_end: None,
        }
    }

    #[test]
    fn new_grab_supersedes_the_old_one() {
        let mut table = GrabTable::default();
        assert_eq!(table.add(grab(0, 1, 10)), GrabStatus::Success);
        assert_eq!(table.add(grab(0, 2, 20)), GrabStatus::Success);
        assert_eq!(table.last_grab(DeviceId(0)).unwrap().window, WindowId(2));

        // At most one active grab: ending it leaves none behind.
        table.end(DeviceId(0));
        assert!(table.last_grab(DeviceId(0)).is_none());
    }

    #[test]
    fn older_grabs_still_supersede() {
        let mut table = GrabTable::default();
        assert_eq!(table.add(grab(0, 1, 100)), GrabStatus::Success);
        assert_eq!(table.add(grab(0, 2, 50)), GrabStatus::Success);
        assert_eq!(table.last_grab(DeviceId(0)).unwrap().window, WindowId(2));
        assert_eq!(table.add(grab(0, 3, 0)), GrabStatus::Success);
        assert_eq!(table.last_grab(DeviceId(0)).unwrap().window, WindowId(3));
    }

    #[test]
    fn ending_a_grab_marks_its_serial() {
        let mut table = GrabTable::default();
        table.add(grab(3, 1, 10));
        let ended = table.end(DeviceId(3)).unwrap();
        assert!(ended.serial_end.is_some());
        assert!(table.last_grab(DeviceId(3)).is_none());
        assert!(table.end(DeviceId(3)).is_none());
    }

    #[test]
    fn destroyed_windows_lose_their_grabs() {
        let mut table = GrabTable::default();
        table.add(grab(0, 4, 10));
        table.add(grab(1, 5, 10));
        table.window_destroyed(WindowId(4));
        assert!(table.last_grab(DeviceId(0)).is_none());
        assert!(table.last_grab(DeviceId(1)).is_some());
    }
}
