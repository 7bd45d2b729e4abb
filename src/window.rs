//! The windows the input core knows about.
//!
//! The core never owns native windows, it only needs to map native handles back to logical
//! windows, walk parents, read scale factors and the event masks each window selected.

use std::collections::HashMap;

use serde::Serialize;

use crate::backend::{CursorHandle, NativeHandle};
use crate::device::DeviceId;
use crate::event::EventMask;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl WindowId {
    /// The synthetic root window covering the whole desktop.
    pub const ROOT: Self = Self(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Root,
    Toplevel,
    Child,
    Temp,
    /// A native window created by someone else.
    Foreign,
}

#[derive(Debug, Clone)]
pub struct Window {
    pub id: WindowId,
    pub native: NativeHandle,
    pub parent: Option<WindowId>,
    pub kind: WindowKind,
    /// Integer multiplier between logical and native pixels.
    pub scale: i32,
    /// Events selected for every device.
    pub events: EventMask,
    /// Events selected for a single device only.
    pub device_events: HashMap<DeviceId, EventMask>,
    pub cursor: Option<CursorHandle>,
}

impl Window {
    pub fn device_events(&self, device: DeviceId) -> EventMask {
        self.device_events
            .get(&device)
            .copied()
            .unwrap_or(EventMask::empty())
    }
}

/// Native handle to logical window table.
#[derive(Debug)]
pub struct WindowTable {
    windows: HashMap<WindowId, Window>,
    by_native: HashMap<NativeHandle, WindowId>,
    next_id: u32,
}

impl WindowTable {
    /// Create the table with the root window mapped to the native desktop window.
    pub fn new(desktop: NativeHandle) -> Self {
        let root = Window {
            id: WindowId::ROOT,
            native: desktop,
            parent: None,
            kind: WindowKind::Root,
            scale: 1,
            events: EventMask::empty(),
            device_events: HashMap::new(),
            cursor: None,
        };

        Self {
            windows: HashMap::from([(WindowId::ROOT, root)]),
            by_native: HashMap::from([(desktop, WindowId::ROOT)]),
            next_id: 1,
        }
    }

    /// Register a native window.
    ///
    /// Registering the same native handle twice returns the existing window.
    pub fn insert(
        &mut self,
        native: NativeHandle,
        parent: WindowId,
        kind: WindowKind,
        scale: i32,
    ) -> WindowId {
        if let Some(&id) = self.by_native.get(&native) {
            warn!(native, %id, "Native window is already registered");
            return id;
        }

        let id = WindowId(self.next_id);
        self.next_id += 1;
        let window = Window {
            id,
            native,
            parent: Some(parent),
            kind,
            scale: scale.max(1),
            events: EventMask::empty(),
            device_events: HashMap::new(),
            cursor: None,
        };
        self.windows.insert(id, window);
        self.by_native.insert(native, id);
        id
    }

    pub fn remove(&mut self, id: WindowId) -> Option<Window> {
        if id.is_root() {
            return None;
        }
        let window = self.windows.remove(&id)?;
        self.by_native.remove(&window.native);
        Some(window)
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    pub fn root(&self) -> &Window {
        &self.windows[&WindowId::ROOT]
    }

    /// Find the logical window of a native handle.
    pub fn lookup(&self, native: NativeHandle) -> Option<WindowId> {
        self.by_native.get(&native).copied()
    }

    pub fn native(&self, id: WindowId) -> Option<NativeHandle> {
        self.get(id).map(|window| window.native)
    }

    pub fn parent(&self, id: WindowId) -> Option<WindowId> {
        self.get(id).and_then(|window| window.parent)
    }

    pub fn scale(&self, id: WindowId) -> i32 {
        self.get(id).map_or(1, |window| window.scale)
    }

    pub fn set_events(&mut self, id: WindowId, events: EventMask) {
        if let Some(window) = self.get_mut(id) {
            window.events = events;
        }
    }

    pub fn set_device_events(&mut self, id: WindowId, device: DeviceId, events: EventMask) {
        if let Some(window) = self.get_mut(id) {
            if events.is_empty() {
                window.device_events.remove(&device);
            } else {
                window.device_events.insert(device, events);
            }
        }
    }

    /// The toplevel ancestor of a window, the window itself if it is a toplevel.
    pub fn toplevel(&self, id: WindowId) -> Option<WindowId> {
        let mut current = id;
        loop {
            let window = self.get(current)?;
            match window.parent {
                None => return None,
                Some(parent) if parent.is_root() => return Some(current),
                Some(parent) => current = parent,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_parents() {
        let mut table = WindowTable::new(1);
        let top = table.insert(10, WindowId::ROOT, WindowKind::Toplevel, 2);
        let child = table.insert(11, top, WindowKind::Child, 2);

        assert_eq!(table.lookup(1), Some(WindowId::ROOT));
        assert_eq!(table.lookup(11), Some(child));
        assert_eq!(table.lookup(12), None);
        assert_eq!(table.parent(child), Some(top));
        assert_eq!(table.toplevel(child), Some(top));
        assert_eq!(table.toplevel(WindowId::ROOT), None);
        assert_eq!(table.scale(child), 2);

        // Same native handle maps to the same window.
        assert_eq!(table.insert(11, top, WindowKind::Child, 1), child);
    }

    #[test]
    fn per_device_events() {
        let mut table = WindowTable::new(1);
        let top = table.insert(10, WindowId::ROOT, WindowKind::Toplevel, 1);
        let device = DeviceId(4);

        table.set_device_events(top, device, EventMask::POINTER_MOTION);
        let window = table.get(top).unwrap();
        assert_eq!(window.device_events(device), EventMask::POINTER_MOTION);
        assert_eq!(window.device_events(DeviceId(5)), EventMask::empty());

        table.set_device_events(top, device, EventMask::empty());
        assert!(table.get(top).unwrap().device_events.is_empty());
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut table = WindowTable::new(1);
        assert!(table.remove(WindowId::ROOT).is_none());
        let top = table.insert(10, WindowId::ROOT, WindowKind::Toplevel, 1);
        assert!(table.remove(top).is_some());
        assert_eq!(table.lookup(10), None);
    }
}
