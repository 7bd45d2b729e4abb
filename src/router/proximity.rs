//! Which device drives the system cursor.
//!
//! A sends-core tool entering proximity makes the system cursor move too, those moves must not
//! produce events twice. While `ignore_core` is non-zero the tool is the active slave of the
//! master pointer and native mouse messages are dropped.

use crate::device::{DeviceId, InputMode};
use crate::display::Display;
use crate::wintab::ffi::ContextHandle;

impl Display {
    /// Whether a tool drives the master pointer when it is in proximity.
    fn drives_core(&self, tool: DeviceId) -> bool {
        self.devices.get(tool).is_some_and(|device| {
            device.mode != InputMode::Disabled
                && device.as_tool().is_some_and(|tool| tool.sends_core)
        })
    }

    fn activate_tool(&mut self, tool: DeviceId) {
        let pointer = self.devices.core_pointer();
        self.devices.set_active_slave(pointer, tool);
        self.router.ignore_core += 1;
        debug!(%tool, ignore_core = self.router.ignore_core, "Tablet tool drives the pointer");
    }

    /// Resolve a pending proximity entry with the tool of a packet.
    ///
    /// Drivers that do not send a cursor change after a tool entered proximity get it resolved
    /// by the first packet instead.
    pub(super) fn packet_proximity(&mut self, tool: Option<DeviceId>) {
        let tool = tool.filter(|&tool| self.drives_core(tool));

        if self.router.entered_proximity > 0 {
            self.router.entered_proximity -= 1;
            if let Some(tool) = tool {
                self.activate_tool(tool);
            }
            return;
        }

        // With an enabled and a disabled tool in proximity at the same time, the disabled one
        // leaving looks like the enabled one did. Packets still coming from the enabled tool
        // mean it is still there.
        let Some(tool) = tool else {
            return;
        };
        let pointer = self.devices.core_pointer();
        if self.router.ignore_core == 0 && self.devices.active_slave(pointer) != Some(tool) {
            trace!(%tool, "Reactivating tablet tool");
            self.activate_tool(tool);
        }
    }

    /// A tool changed, with the serial of the first packet it sent.
    pub(super) fn cursor_change(&mut self, context: ContextHandle, serial: u32) -> bool {
        let Some(packet) = self
            .tablet
            .as_ref()
            .and_then(|tablet| tablet.packet(context, serial))
        else {
            trace!(?context, serial, "Cursor change without a packet");
            return false;
        };

        let pending = self.router.entered_proximity > 0;
        self.router.entered_proximity = self.router.entered_proximity.saturating_sub(1);

        let Some(tool) = self.devices.find_tool(context, packet.cursor) else {
            trace!(?context, cursor = packet.cursor, "Cursor change for an unknown tool");
            return false;
        };
        if pending && self.drives_core(tool) {
            self.activate_tool(tool);
        }

        false
    }

    /// A tool entered or left the proximity of a tablet.
    ///
    /// Entering only counts, the tool is known with the next cursor change or packet.
    pub(super) fn proximity(&mut self, context: ContextHandle, entering: bool) -> bool {
        if entering {
            self.router.entered_proximity += 1;
            trace!(?context, entered = self.router.entered_proximity, "Tool entered proximity");
            return false;
        }

        if self.router.ignore_core > 0 {
            self.router.ignore_core -= 1;
            if self.router.ignore_core == 0 {
                let pointer = self.devices.core_pointer();
                let system = self.devices.system_pointer();
                self.devices.set_active_slave(pointer, system);
                debug!("System pointer drives the pointer again");
            }
        }

        false
    }
}
