//! Native messages to events.
//!
//! Every message produces at most one event, appended to the display event queue. Messages that
//! produce nothing are dropped without any error, at most with a log line.

use glam::IVec2;

use crate::backend::NativeHandle;
use crate::device::wintab::translate_axes;
use crate::device::{DeviceId, DeviceType, InputMode};
use crate::display::Display;
use crate::event::{Event, EventKind, EventMask, ModifierType};
use crate::glue;
use crate::utils::TickClock;
use crate::window::WindowId;
use crate::wintab::ffi::ContextHandle;

mod buttons;
mod proximity;

pub use buttons::{decode_buttons, translate_buttons};

/// A native message the input core handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub window: NativeHandle,
    /// Message time in milliseconds, zero if unknown.
    pub time: u32,
    /// Cursor position in screen coordinates when the message was posted.
    pub pt: IVec2,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `client` is relative to the message window, `keys` are the `MK_*` flags.
    MouseMove { client: IVec2, keys: u32 },
    ButtonDown { button: u32, client: IVec2, keys: u32 },
    ButtonUp { button: u32, client: IVec2, keys: u32 },
    Activate { active: bool },
    /// A packet is waiting in the context queue.
    Packet { context: ContextHandle, serial: u32 },
    /// Another tool is in use, the packet carries its cursor.
    CursorChange { context: ContextHandle, serial: u32 },
    Proximity { context: ContextHandle, entering: bool },
}

/// State the router keeps between messages.
#[derive(Debug, Default)]
pub struct RouterState {
    /// Tablet tools currently driving the system cursor.
    pub ignore_core: u32,
    /// Tools that entered proximity and were not matched to a packet yet.
    pub entered_proximity: u32,
    /// Root position of the last mouse move.
    pub current_root: Option<IVec2>,
    pub clock: TickClock,
}

fn button_modifier(button: u32) -> ModifierType {
    match button {
        1..=5 => ModifierType::from_button_state(1 << (button - 1)),
        _ => ModifierType::empty(),
    }
}

impl Display {
    /// Handle a native message.
    ///
    /// Returns whether an event was produced.
    pub fn dispatch(&mut self, msg: &Message) -> bool {
        match msg.kind {
            MessageKind::MouseMove { client, keys } => {
                self.core_pointer_event(msg, EventKind::MotionNotify, client, keys)
            }
            MessageKind::ButtonDown {
                button,
                client,
                keys,
            } => self.core_pointer_event(msg, EventKind::ButtonPress { button }, client, keys),
            MessageKind::ButtonUp {
                button,
                client,
                keys,
            } => self.core_pointer_event(msg, EventKind::ButtonRelease { button }, client, keys),
            MessageKind::Activate { active } => {
                if active {
                    if let Some(tablet) = &self.tablet {
                        tablet.set_tablet_active();
                    }
                }
                false
            }
            MessageKind::Packet { context, serial } => {
                self.is_tablet_window(msg.window) && self.tablet_packet(msg, context, serial)
            }
            MessageKind::CursorChange { context, serial } => {
                self.is_tablet_window(msg.window) && self.cursor_change(context, serial)
            }
            MessageKind::Proximity { context, entering } => {
                self.is_tablet_window(msg.window) && self.proximity(context, entering)
            }
        }
    }

    fn is_tablet_window(&self, window: NativeHandle) -> bool {
        let expected = self.tablet.as_ref().map(|tablet| tablet.window());
        if expected != Some(window) {
            warn!(window, ?expected, "Tablet message not for the tablet window");
            return false;
        }
        true
    }

    fn next_tick(&mut self, suggested: u32) -> u32 {
        let platform = &*self.platform;
        self.router
            .clock
            .next_tick(suggested, || platform.tick_count())
    }

    /// Native mouse messages, driving the master pointer through the system pointer.
    fn core_pointer_event(
        &mut self,
        msg: &Message,
        kind: EventKind,
        client: IVec2,
        keys: u32,
    ) -> bool {
        let Some(reported) = self.windows.lookup(msg.window) else {
            trace!(window = msg.window, "Mouse message for an unknown window");
            return false;
        };
        let Some((window, client)) = self.core_event_window(reported, msg.pt, client) else {
            return false;
        };
        let scale = self.windows.scale(window);
        let root = glue::screen_to_root(&*self.platform, msg.pt, scale);

        if kind == EventKind::MotionNotify {
            // Native moves also come when a window appears under a still cursor.
            if self.router.current_root == Some(root) {
                return false;
            }
            self.router.current_root = Some(root);
        }

        if self.router.ignore_core > 0 {
            trace!(?kind, "Ignoring core pointer event while a tablet tool is active");
            return false;
        }

        let mut state = glue::pointer_event_state(&*self.platform, keys);
        // Button masks describe the state before the event.
        match kind {
            EventKind::ButtonPress { button } => state &= !button_modifier(button),
            EventKind::ButtonRelease { button } => state |= button_modifier(button),
            EventKind::MotionNotify => (),
        }

        let pointer = self.devices.core_pointer();
        let local = client / scale;
        let event = Event {
            kind,
            window,
            time: self.next_tick(msg.time),
            x: f64::from(local.x),
            y: f64::from(local.y),
            x_root: f64::from(root.x),
            y_root: f64::from(root.y),
            axes: None,
            state,
            device: pointer,
            source_device: self.devices.system_pointer(),
            seat: self.devices.device_seat(pointer),
        };
        trace!(?kind, %window, x = event.x, y = event.y, "Core pointer event");
        self.events.push_back(event);
        true
    }

    /// Redirect a core event to the window grabbing the master pointer.
    ///
    /// Returns the window with the client coordinates relative to it.
    fn core_event_window(
        &self,
        reported: WindowId,
        pt: IVec2,
        client: IVec2,
    ) -> Option<(WindowId, IVec2)> {
        let pointer = self.devices.core_pointer();
        let Some(grab) = self.grabs.last_grab(pointer) else {
            return Some((reported, client));
        };
        let platform = &*self.platform;

        let window = if grab.owner_events {
            platform
                .window_from_point(pt)
                .filter(|&hwnd| glue::in_client_area(platform, hwnd, pt))
                .and_then(|hwnd| self.windows.lookup(hwnd))
                .unwrap_or(grab.native_window)
        } else {
            grab.native_window
        };

        let native = self.windows.native(window)?;
        Some((window, platform.screen_to_client(native, pt)))
    }

    /// The window a tool grab or, for sends-core tools, a master pointer grab sends events to.
    fn tablet_grab_window(&self, tool: DeviceId, sends_core: bool) -> Option<WindowId> {
        let pointer = self.devices.core_pointer();
        self.grabs
            .last_grab(tool)
            .or_else(|| sends_core.then(|| self.grabs.last_grab(pointer)).flatten())
            .map(|grab| grab.window)
    }

    fn tablet_packet(&mut self, msg: &Message, context: ContextHandle, serial: u32) -> bool {
        let pointer = self.devices.core_pointer();
        let (mut window, mut local) = match self.device_window_at_position(pointer, false) {
            Some((window, position, _)) => (window, position.as_ivec2()),
            None => (WindowId::ROOT, IVec2::ZERO),
        };
        trace!(%window, ?local, "Tablet packet");

        let Some(packet) = self
            .tablet
            .as_ref()
            .and_then(|tablet| tablet.packet(context, serial))
        else {
            trace!(?context, serial, "No packet");
            return false;
        };

        let tool = self.devices.find_tool(context, packet.cursor);
        self.packet_proximity(tool);

        let Some((tool, sends_core)) = tool.and_then(|tool| {
            let device = self.devices.get(tool)?;
            let sends_core = device.as_tool()?.sends_core;
            (device.mode != InputMode::Disabled).then_some((tool, sends_core))
        }) else {
            trace!(?context, cursor = packet.cursor, "No enabled tool for packet");
            return false;
        };

        if self.modal_operation {
            trace!("Ignoring tablet packet while moving or resizing");
            return false;
        }

        if let Some(grab_window) = self.tablet_grab_window(tool, sends_core) {
            window = grab_window;
            local = self.windows.native(window).map_or(IVec2::ZERO, |native| {
                let platform = &*self.platform;
                platform.screen_to_client(native, platform.cursor_position())
                    / self.windows.scale(window)
            });
        }

        if window.is_root() {
            trace!("Tablet packet on the root window");
            return false;
        }

        let Some(wintab) = self
            .devices
            .get_mut(tool)
            .and_then(|device| device.as_tool_mut())
        else {
            return false;
        };
        wintab.store_packet(&packet);
        let kind = decode_buttons(packet.buttons, &mut wintab.button_state);
        let button_state = wintab.button_state;
        let mask = kind.required_mask(button_state);

        let Some(window) = self.propagate(tool, window, local, mask) else {
            return false;
        };

        let target = self.translate_target(window);
        let Some((device, wintab)) = self
            .devices
            .get(tool)
            .and_then(|device| Some((device, device.as_tool()?)))
        else {
            return false;
        };
        let (axes, position) = translate_axes(device, &wintab.last_axis_data, &target);
        let state = glue::modifier_key_state(&*self.platform)
            | ModifierType::from_button_state(button_state);

        let event = Event {
            kind,
            window,
            time: self.next_tick(msg.time),
            x: position.x,
            y: position.y,
            x_root: position.x + target.origin.x,
            y_root: position.y + target.origin.y,
            axes: Some(axes),
            state,
            device: if sends_core { pointer } else { tool },
            source_device: tool,
            seat: self.devices.device_seat(pointer),
        };
        trace!(?kind, %window, %tool, x = event.x, y = event.y, "Tablet event");
        self.events.push_back(event);
        true
    }

    /// Walk up from `window` to the first window that selected `mask` for `device`.
    ///
    /// Floating devices only go to the window under them. Returns `None` when the walk reaches a
    /// toplevel without finding one.
    fn propagate(
        &self,
        device: DeviceId,
        mut window: WindowId,
        mut local: IVec2,
        mask: EventMask,
    ) -> Option<WindowId> {
        let platform = &*self.platform;
        let is_slave = self
            .devices
            .get(device)
            .is_some_and(|device| device.device_type == DeviceType::Slave);

        loop {
            let current = self.windows.get(window)?;
            if current.device_events(device).intersects(mask)
                || !is_slave
                || current.events.intersects(mask)
            {
                return Some(window);
            }

            let Some(parent) = current.parent.filter(|parent| !parent.is_root()) else {
                trace!(%window, ?mask, "Event not selected up to the toplevel");
                return None;
            };
            let parent_window = self.windows.get(parent)?;

            let screen = platform.client_to_screen(current.native, local * current.scale);
            local = platform.screen_to_client(parent_window.native, screen) / parent_window.scale;
            window = parent;
            trace!(%window, ?local, "Propagating to parent");
        }
    }
}
