//! A scriptable Wintab driver.
//!
//! Used by the replay tool and tests. Like [`HeadlessPlatform`](crate::backend::headless), it is
//! a shared handle: tests keep a clone to post packets while the display owns another.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use serde::Deserialize;

use super::driver::{CursorInfo, DeviceInfo, ToolKind, WintabDriver};
use super::ffi::{
    Axis, ContextHandle, LogContext, Packet, PacketFields, CXO_SYSTEM, PACKET_DATA,
};
use crate::backend::NativeHandle;

const FIRST_CONTEXT: isize = 0x0003_0000;

/// A tablet as the simulated driver reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulatedTablet {
    pub name: String,
    pub x: Axis,
    pub y: Axis,
    pub pressure: Axis,
    pub orientation: [Axis; 3],
    /// Whether the default context drives the system cursor.
    pub sends_core: bool,
    /// Whether a device specific default context is provided.
    pub device_context: bool,
    /// Reported instead of the real index of the first cursor.
    pub first_cursor: Option<u32>,
    pub cursors: Vec<SimulatedCursor>,
}

impl Default for SimulatedTablet {
    fn default() -> Self {
        Self {
            name: "Simulated Tablet".to_string(),
            x: Axis {
                min: 0,
                max: 15199,
                units: 2,
                resolution: 2540 << 16,
            },
            y: Axis {
                min: 0,
                max: 9499,
                units: 2,
                resolution: 2540 << 16,
            },
            pressure: Axis {
                min: 0,
                max: 1023,
                units: 0,
                resolution: 0,
            },
            orientation: [
                Axis {
                    min: 0,
                    max: 3599,
                    units: 1,
                    resolution: 3600 << 16,
                },
                Axis {
                    min: -900,
                    max: 900,
                    units: 1,
                    resolution: 3600 << 16,
                },
                Axis::default(),
            ],
            sends_core: true,
            device_context: true,
            first_cursor: None,
            cursors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulatedCursor {
    pub name: String,
    pub active: bool,
    pub physical_id: u32,
    pub kind: ToolKind,
    pub packet_data: PacketFields,
    pub buttons: u32,
}

impl Default for SimulatedCursor {
    fn default() -> Self {
        Self {
            name: "Pressure Stylus".to_string(),
            active: true,
            physical_id: 1,
            kind: ToolKind::Pen,
            packet_data: PACKET_DATA,
            buttons: 3,
        }
    }
}

#[derive(Debug)]
struct OpenContext {
    handle: ContextHandle,
    window: NativeHandle,
    context: LogContext,
    open: bool,
    enabled: bool,
    overlaps: u32,
    queue_size: Option<i32>,
    queue: VecDeque<(u32, Packet)>,
}

#[derive(Debug)]
struct Driver {
    available: bool,
    spec_version: u16,
    tablets: Vec<SimulatedTablet>,
    contexts: Vec<OpenContext>,
    max_queue_size: i32,
    failing_devices: HashSet<u32>,
    next_serial: u32,
}

impl Driver {
    /// Index of the first cursor of a tablet, cursors are numbered across all tablets.
    fn first_cursor(&self, device: u32) -> u32 {
        self.tablets
            .iter()
            .take(device as usize)
            .map(|tablet| tablet.cursors.len() as u32)
            .sum()
    }

    fn cursor(&self, cursor: u32) -> Option<&SimulatedCursor> {
        self.tablets
            .iter()
            .flat_map(|tablet| tablet.cursors.iter())
            .nth(cursor as usize)
    }

    fn context(&self, handle: ContextHandle) -> Option<&OpenContext> {
        self.contexts
            .iter()
            .find(|context| context.handle == handle && context.open)
    }

    fn context_mut(&mut self, handle: ContextHandle) -> Option<&mut OpenContext> {
        self.contexts
            .iter_mut()
            .find(|context| context.handle == handle && context.open)
    }

    fn log_context(&self, device: u32) -> Option<LogContext> {
        let tablet = self.tablets.get(device as usize)?;
        let mut context = LogContext {
            lcOptions: if tablet.sends_core { CXO_SYSTEM } else { 0 },
            lcDevice: device,
            lcInOrgX: tablet.x.min,
            lcInOrgY: tablet.y.min,
            lcInExtX: tablet.x.max - tablet.x.min + 1,
            lcInExtY: tablet.y.max - tablet.y.min + 1,
            ..Default::default()
        };
        context.set_name(&format!("{} Context", tablet.name));
        Some(context)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    inner: Rc<RefCell<Driver>>,
}

impl SimulatedDriver {
    pub fn new(tablets: Vec<SimulatedTablet>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Driver {
                available: true,
                spec_version: 0x0101,
                tablets,
                contexts: Vec::new(),
                max_queue_size: 128,
                failing_devices: HashSet::new(),
                next_serial: 1,
            })),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.inner.borrow_mut().available = available;
    }

    pub fn set_spec_version(&self, version: u16) {
        self.inner.borrow_mut().spec_version = version;
    }

    /// The largest packet queue the driver accepts, `0` to refuse every size.
    pub fn set_max_queue_size(&self, size: i32) {
        self.inner.borrow_mut().max_queue_size = size;
    }

    /// Make opening a context on this tablet fail.
    pub fn fail_open(&self, device: u32) {
        self.inner.borrow_mut().failing_devices.insert(device);
    }

    pub fn first_cursor(&self, device: u32) -> u32 {
        self.inner.borrow().first_cursor(device)
    }

    /// The open context of a tablet.
    pub fn context_handle(&self, device: u32) -> Option<ContextHandle> {
        self.inner
            .borrow()
            .contexts
            .iter()
            .find(|context| context.open && context.context.lcDevice == device)
            .map(|context| context.handle)
    }

    /// The context as it was opened, after our rewrite.
    pub fn opened_context(&self, context: ContextHandle) -> Option<LogContext> {
        self.inner.borrow().context(context).map(|c| c.context)
    }

    /// The window a context posts its messages to.
    pub fn context_window(&self, context: ContextHandle) -> Option<NativeHandle> {
        self.inner.borrow().context(context).map(|c| c.window)
    }

    pub fn is_open(&self, context: ContextHandle) -> bool {
        self.inner.borrow().context(context).is_some()
    }

    pub fn is_enabled(&self, context: ContextHandle) -> bool {
        self.inner
            .borrow()
            .context(context)
            .is_some_and(|context| context.enabled)
    }

    pub fn queue_size(&self, context: ContextHandle) -> Option<i32> {
        self.inner
            .borrow()
            .context(context)
            .and_then(|context| context.queue_size)
    }

    /// How many times a context was brought to the top.
    pub fn overlap_count(&self, context: ContextHandle) -> u32 {
        self.inner
            .borrow()
            .context(context)
            .map_or(0, |context| context.overlaps)
    }

    /// Queue a packet on a context, returning the serial the driver would post with it.
    ///
    /// The queue behaves like the driver one, when it is full the oldest packet is dropped.
    pub fn push_packet(&self, context: ContextHandle, mut packet: Packet) -> Option<u32> {
        let mut inner = self.inner.borrow_mut();
        let serial = inner.next_serial;
        let open = inner.context_mut(context)?;
        packet.context = context.0;

        let capacity = open.queue_size.unwrap_or(8).max(1) as usize;
        if open.queue.len() == capacity {
            open.queue.pop_front();
        }
        open.queue.push_back((serial, packet));
        inner.next_serial = serial.wrapping_add(1);
        Some(serial)
    }
}

impl WintabDriver for SimulatedDriver {
    fn is_available(&self) -> bool {
        self.inner.borrow().available
    }

    fn spec_version(&self) -> u16 {
        self.inner.borrow().spec_version
    }

    fn device_count(&self) -> u32 {
        self.inner.borrow().tablets.len() as u32
    }

    fn cursor_count(&self) -> u32 {
        let inner = self.inner.borrow();
        inner.first_cursor(inner.tablets.len() as u32)
    }

    fn device_info(&self, device: u32) -> Option<DeviceInfo> {
        let inner = self.inner.borrow();
        let tablet = inner.tablets.get(device as usize)?;
        Some(DeviceInfo {
            name: tablet.name.clone(),
            cursor_types: tablet.cursors.len() as u32,
            first_cursor: tablet
                .first_cursor
                .unwrap_or_else(|| inner.first_cursor(device)),
            x: tablet.x,
            y: tablet.y,
            pressure: tablet.pressure,
            orientation: tablet.orientation,
        })
    }

    fn cursor_info(&self, cursor: u32) -> Option<CursorInfo> {
        let inner = self.inner.borrow();
        let simulated = inner.cursor(cursor)?;
        Some(CursorInfo {
            name: simulated.name.clone(),
            active: simulated.active,
            packet_data: simulated.packet_data,
            buttons: simulated.buttons,
            physical_id: simulated.physical_id,
            kind: simulated.kind,
        })
    }

    fn default_context(&self, device: Option<u32>) -> Option<LogContext> {
        let inner = self.inner.borrow();
        match device {
            Some(device) => inner
                .tablets
                .get(device as usize)
                .filter(|tablet| tablet.device_context)
                .and_then(|_| inner.log_context(device)),
            None => {
                let mut context = inner.log_context(0)?;
                context.lcOptions |= CXO_SYSTEM;
                context.set_name("System Context");
                Some(context)
            }
        }
    }

    fn open(
        &self,
        window: NativeHandle,
        context: &LogContext,
        enable: bool,
    ) -> Option<ContextHandle> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing_devices.contains(&context.lcDevice) {
            return None;
        }

        let handle = ContextHandle(FIRST_CONTEXT + inner.contexts.len() as isize);
        inner.contexts.push(OpenContext {
            handle,
            window,
            context: *context,
            open: true,
            enabled: enable,
            overlaps: 0,
            queue_size: None,
            queue: VecDeque::new(),
        });
        Some(handle)
    }

    fn close(&self, context: ContextHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(context) = inner.context_mut(context) else {
            return false;
        };
        context.open = false;
        context.queue.clear();
        true
    }

    fn enable(&self, context: ContextHandle, enable: bool) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(context) = inner.context_mut(context) else {
            return false;
        };
        context.enabled = enable;
        true
    }

    fn overlap(&self, context: ContextHandle, to_top: bool) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(context) = inner.context_mut(context) else {
            return false;
        };
        if to_top {
            context.overlaps += 1;
        }
        true
    }

    fn set_queue_size(&self, context: ContextHandle, size: i32) -> bool {
        let mut inner = self.inner.borrow_mut();
        let max = inner.max_queue_size;
        let Some(context) = inner.context_mut(context) else {
            return false;
        };
        if size > max || size < 1 {
            return false;
        }
        context.queue_size = Some(size);
        true
    }

    fn get_context(&self, context: ContextHandle) -> Option<LogContext> {
        self.opened_context(context)
    }

    fn packet(&self, context: ContextHandle, serial: u32) -> Option<Packet> {
        let mut inner = self.inner.borrow_mut();
        let open = inner.context_mut(context)?;
        let position = open.queue.iter().position(|&(s, _)| s == serial)?;
        // Older packets go away with the one asked for.
        open.queue.drain(..=position).last().map(|(_, packet)| packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> SimulatedDriver {
        SimulatedDriver::new(vec![
            SimulatedTablet {
                cursors: vec![SimulatedCursor::default(), SimulatedCursor::default()],
                ..Default::default()
            },
            SimulatedTablet {
                device_context: false,
                cursors: vec![SimulatedCursor::default()],
                ..Default::default()
            },
        ])
    }

    #[test]
    fn cursors_are_numbered_across_tablets() {
        let driver = driver();
        assert_eq!(driver.device_count(), 2);
        assert_eq!(driver.cursor_count(), 3);
        assert_eq!(driver.device_info(1).unwrap().first_cursor, 2);
        assert!(driver.cursor_info(2).is_some());
        assert!(driver.cursor_info(3).is_none());
    }

    #[test]
    fn device_contexts() {
        let driver = driver();
        let context = driver.default_context(Some(0)).unwrap();
        assert_eq!(context.lcInExtX, 15200);
        assert_eq!(context.lcDevice, 0);
        assert!(driver.default_context(Some(1)).is_none());
        assert!(driver.default_context(None).unwrap().sends_core());
    }

    #[test]
    fn packets_discard_older_ones() {
        let driver = driver();
        let context = driver.default_context(Some(0)).unwrap();
        let handle = driver.open(1, &context, true).unwrap();
        assert!(driver.set_queue_size(handle, 16));

        let first = driver.push_packet(handle, Packet::default()).unwrap();
        let second = driver
            .push_packet(
                handle,
                Packet {
                    x: 5,
                    ..Default::default()
                },
            )
            .unwrap();

        let packet = driver.packet(handle, second).unwrap();
        assert_eq!(packet.x, 5);
        assert_eq!(packet.context, handle.0);
        assert!(driver.packet(handle, first).is_none());
        assert!(driver.packet(handle, second).is_none());
    }

    #[test]
    fn queue_size_limit() {
        let driver = driver();
        driver.set_max_queue_size(32);
        let context = driver.default_context(Some(0)).unwrap();
        let handle = driver.open(1, &context, true).unwrap();
        assert!(!driver.set_queue_size(handle, 64));
        assert!(driver.set_queue_size(handle, 32));
        assert_eq!(driver.queue_size(handle), Some(32));

        assert!(driver.close(handle));
        assert!(!driver.is_open(handle));
        assert!(!driver.set_queue_size(handle, 8));
    }
}
