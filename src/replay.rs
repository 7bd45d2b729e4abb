//! Replaying recorded native message streams.
//!
//! A trace describes a desktop, the tablets a simulated driver reports and a list of steps. The
//! steps are turned into the native messages a real system would post and run through a
//! [`Display`] built on the headless backend.
//!
//! ```json
//! {
//!   "desktop": { "loc": [0, 0], "size": [1920, 1080] },
//!   "windows": [
//!     { "name": "main", "client": { "loc": [100, 100], "size": [400, 300] },
//!       "events": "POINTER_MOTION | BUTTON_PRESS" }
//!   ],
//!   "tablets": [{ "name": "Pen Tablet", "cursors": [{ "name": "Stylus" }] }],
//!   "steps": [
//!     { "type": "proximity", "tablet": 0, "entering": true },
//!     { "type": "packet", "tablet": 0, "position": [150, 140],
//!       "packet": { "x": 3000, "y": 1500, "normal-pressure": 400 } }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::{fs, io};

use cdk_input_config::Config;
use glam::IVec2;
use serde::Deserialize;

use crate::backend::headless::HeadlessPlatform;
use crate::backend::{vk, NativeHandle, Platform};
use crate::display::Display;
use crate::event::{Event, EventMask};
use crate::router::{Message, MessageKind};
use crate::utils::Rect;
use crate::window::{WindowId, WindowKind};
use crate::wintab::ffi::Packet;
use crate::wintab::simulated::{SimulatedDriver, SimulatedTablet};
use crate::wintab::DriverSource;

/// Milliseconds between two steps.
const STEP_INTERVAL: u32 = 8;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Trace {
    pub desktop: Rect,
    /// Parents come before their children.
    pub windows: Vec<TraceWindow>,
    pub tablets: Vec<SimulatedTablet>,
    pub steps: Vec<Step>,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            desktop: Rect::new(0, 0, 1920, 1080),
            windows: Vec::new(),
            tablets: Vec::new(),
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TraceWindow {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Client area in screen coordinates.
    pub client: Rect,
    #[serde(default = "default_scale")]
    pub scale: i32,
    #[serde(default = "EventMask::empty")]
    pub events: EventMask,
}

fn default_scale() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Step {
    /// Move the system cursor, posting a mouse move to the window under it.
    MouseMove { position: IVec2 },
    ButtonDown { button: u32, position: IVec2 },
    ButtonUp { button: u32, position: IVec2 },
    /// Press or release a key, by virtual key code.
    Key { key: u8, down: bool },
    Activate { window: String },
    /// A window starts or stops being moved or resized.
    ModalOperation { active: bool },
    Proximity { tablet: u32, entering: bool },
    CursorChange { tablet: u32, cursor: u32 },
    /// A packet, with where the system cursor is when it arrives.
    Packet {
        tablet: u32,
        #[serde(default)]
        position: Option<IVec2>,
        packet: Packet,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read the trace: {0}")]
    Io(#[from] io::Error),
    #[error("invalid trace: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown window {0:?}")]
    UnknownWindow(String),
}

pub fn load(path: &Path) -> Result<Trace, Error> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[derive(Debug)]
pub struct Replay {
    display: Display,
    platform: HeadlessPlatform,
    driver: SimulatedDriver,
    windows: HashMap<String, NativeHandle>,
    /// `MK_*` flags of the mouse buttons held.
    buttons: u32,
}

impl Replay {
    /// Build the desktop of a trace and initialize the tablets.
    pub fn new(trace: &Trace, config: Config) -> Result<Self, Error> {
        let platform = HeadlessPlatform::new(trace.desktop);
        let driver = SimulatedDriver::new(trace.tablets.clone());
        let mut display = Display::new(
            Box::new(platform.clone()),
            DriverSource::Simulated(driver.clone()),
            config,
        );

        let mut windows: HashMap<String, NativeHandle> = HashMap::new();
        let mut ids: HashMap<String, WindowId> = HashMap::new();
        for window in &trace.windows {
            let parent = match &window.parent {
                Some(name) => {
                    let native = windows
                        .get(name)
                        .copied()
                        .ok_or_else(|| Error::UnknownWindow(name.clone()))?;
                    Some((native, ids[name]))
                }
                None => None,
            };

            let native = platform.add_window(parent.map(|(native, _)| native), window.client);
            let (parent, kind) = match parent {
                Some((_, id)) => (id, WindowKind::Child),
                None => (WindowId::ROOT, WindowKind::Toplevel),
            };
            let id = display.add_window(native, parent, kind, window.scale);
            display.set_window_events(id, window.events);
            windows.insert(window.name.clone(), native);
            ids.insert(window.name.clone(), id);
        }

        display.init_tablet();

        Ok(Self {
            display,
            platform,
            driver,
            windows,
            buttons: 0,
        })
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Run every step, returning the events produced.
    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<Event>, Error> {
        for step in steps {
            self.platform.advance_tick(STEP_INTERVAL);
            if !self.step(step)? {
                trace!(?step, "Step produced no event");
            }
        }
        Ok(self.display.take_events())
    }

    fn step(&mut self, step: &Step) -> Result<bool, Error> {
        let produced = match *step {
            Step::MouseMove { position } => {
                self.platform.move_cursor(position);
                self.mouse_message(position, |client, keys| MessageKind::MouseMove { client, keys })
            }
            Step::ButtonDown { button, position } => {
                self.platform.move_cursor(position);
                self.buttons |= button_flag(button);
                self.mouse_message(position, |client, keys| MessageKind::ButtonDown {
                    button,
                    client,
                    keys,
                })
            }
            Step::ButtonUp { button, position } => {
                self.platform.move_cursor(position);
                self.buttons &= !button_flag(button);
                self.mouse_message(position, |client, keys| MessageKind::ButtonUp {
                    button,
                    client,
                    keys,
                })
            }
            Step::Key { key, down } => {
                let key = usize::from(key);
                self.platform.set_key_down(key, down);
                if key == vk::CAPITAL && down {
                    let toggled = self.platform.keyboard_state()[vk::CAPITAL] & 1 == 0;
                    self.platform.set_key_toggled(key, toggled);
                }
                false
            }
            Step::Activate { ref window } => {
                let native = self
                    .windows
                    .get(window)
                    .copied()
                    .ok_or_else(|| Error::UnknownWindow(window.clone()))?;
                self.post(native, MessageKind::Activate { active: true })
            }
            Step::ModalOperation { active } => {
                self.display.set_modal_operation(active);
                false
            }
            Step::Proximity { tablet, entering } => {
                let Some(context) = self.driver.context_handle(tablet) else {
                    warn!(tablet, "No context for tablet");
                    return Ok(false);
                };
                self.post_tablet(MessageKind::Proximity { context, entering })
            }
            Step::CursorChange { tablet, cursor } => {
                let Some(context) = self.driver.context_handle(tablet) else {
                    warn!(tablet, "No context for tablet");
                    return Ok(false);
                };
                let packet = Packet {
                    cursor,
                    ..Default::default()
                };
                let Some(serial) = self.driver.push_packet(context, packet) else {
                    return Ok(false);
                };
                self.post_tablet(MessageKind::CursorChange { context, serial })
            }
            Step::Packet {
                tablet,
                position,
                packet,
            } => {
                let Some(context) = self.driver.context_handle(tablet) else {
                    warn!(tablet, "No context for tablet");
                    return Ok(false);
                };
                if let Some(position) = position {
                    self.platform.move_cursor(position);
                }
                let Some(serial) = self.driver.push_packet(context, packet) else {
                    return Ok(false);
                };
                self.post_tablet(MessageKind::Packet { context, serial })
            }
        };
        Ok(produced)
    }

    /// Post a mouse message to the window under `position`, like the system does.
    fn mouse_message(
        &mut self,
        position: IVec2,
        kind: impl FnOnce(IVec2, u32) -> MessageKind,
    ) -> bool {
        let target = self
            .platform
            .captured()
            .or_else(|| self.platform.window_from_point(position));
        let Some(window) = target else {
            trace!(?position, "No window under the cursor");
            return false;
        };
        let client = self.platform.screen_to_client(window, position);
        self.post(window, kind(client, self.buttons | self.key_flags()))
    }

    fn key_flags(&self) -> u32 {
        let keys = self.platform.keyboard_state();
        let mut flags = 0;
        if keys[vk::SHIFT] & 0x80 != 0 {
            flags |= 0x0004;
        }
        if keys[vk::CONTROL] & 0x80 != 0 {
            flags |= 0x0008;
        }
        flags
    }

    fn post_tablet(&mut self, kind: MessageKind) -> bool {
        let Some(window) = self.display.tablet().map(|tablet| tablet.window()) else {
            return false;
        };
        self.post(window, kind)
    }

    fn post(&mut self, window: NativeHandle, kind: MessageKind) -> bool {
        let msg = Message {
            window,
            // Zero makes the display read the tick.
            time: 0,
            pt: self.platform.cursor_position(),
            kind,
        };
        self.display.dispatch(&msg)
    }
}

/// The `MK_*` flag of a mouse button.
fn button_flag(button: u32) -> u32 {
    match button {
        1 => 0x0001,
        2 => 0x0010,
        3 => 0x0002,
        4 => 0x0020,
        5 => 0x0040,
        _ => 0,
    }
}

/// One line describing an event.
pub fn format_event(display: &Display, event: &Event) -> String {
    let device_name = |id| {
        display
            .devices()
            .get(id)
            .map_or_else(|| id.to_string(), |device| device.name.clone())
    };

    let mut line = format!(
        "{:>8} {:?} window={} ({:.2}, {:.2}) root=({:.2}, {:.2}) device={:?} source={:?}",
        event.time,
        event.kind,
        event.window,
        event.x,
        event.y,
        event.x_root,
        event.y_root,
        device_name(event.device),
        device_name(event.source_device),
    );
    if !event.state.is_empty() {
        let _ = write!(line, " state={:?}", event.state);
    }
    if let Some(axes) = &event.axes {
        let _ = write!(line, " axes={axes:.3?}");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r#"{
        "desktop": { "loc": [0, 0], "size": [1920, 1080] },
        "windows": [
            { "name": "main", "client": { "loc": [100, 100], "size": [400, 300] },
              "events": "POINTER_MOTION | BUTTON_PRESS | BUTTON_RELEASE" },
            { "name": "canvas", "parent": "main",
              "client": { "loc": [200, 200], "size": [100, 100] } }
        ],
        "tablets": [{
            "name": "Pen Tablet",
            "x": { "min": 0, "max": 1920, "units": 2, "resolution": 65536000 },
            "y": { "min": 0, "max": 1080, "units": 2, "resolution": 65536000 },
            "cursors": [{ "name": "Stylus" }]
        }],
        "steps": [
            { "type": "mouse-move", "position": [150, 140] },
            { "type": "proximity", "tablet": 0, "entering": true },
            { "type": "packet", "tablet": 0, "position": [250, 230],
              "packet": { "x": 250, "y": 230, "buttons": 1, "normal-pressure": 400 } },
            { "type": "mouse-move", "position": [260, 230] },
            { "type": "proximity", "tablet": 0, "entering": false },
            { "type": "button-down", "button": 1, "position": [260, 230] }
        ]
    }"#;

    #[test]
    fn replays_a_trace() {
        let trace: Trace = serde_json::from_str(TRACE).unwrap();
        let mut replay = Replay::new(&trace, Config::default()).unwrap();
        let events = replay.run(&trace.steps).unwrap();

        let devices = replay.display().devices();
        let kinds: Vec<_> = events.iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::event::EventKind::MotionNotify,
                crate::event::EventKind::ButtonPress { button: 1 },
                crate::event::EventKind::ButtonPress { button: 1 },
            ]
        );
        assert_eq!(events[0].source_device, devices.system_pointer());
        assert_eq!(devices.get(events[1].source_device).unwrap().name, "Pen Tablet Stylus");
        // Propagated from the canvas.
        assert_eq!((events[1].x, events[1].y), (150.0, 130.0));
        assert_eq!(events[2].source_device, devices.system_pointer());
        assert!(events.windows(2).all(|pair| pair[0].time <= pair[1].time));

        let line = format_event(replay.display(), &events[1]);
        assert!(line.contains("Pen Tablet Stylus"));
        assert!(line.contains("axes="));
    }

    #[test]
    fn unknown_parent() {
        let trace: Trace = serde_json::from_str(
            r#"{ "windows": [{ "name": "a", "parent": "b",
                 "client": { "loc": [0, 0], "size": [10, 10] } }] }"#,
        )
        .unwrap();
        assert!(matches!(
            Replay::new(&trace, Config::default()),
            Err(Error::UnknownWindow(name)) if name == "b"
        ));
    }

    #[test]
    fn unknown_step() {
        let err = serde_json::from_str::<Trace>(r#"{ "steps": [{ "type": "scroll" }] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn key_codes_out_of_range() {
        let err = serde_json::from_str::<Trace>(
            r#"{ "steps": [{ "type": "key", "key": 300, "down": true }] }"#,
        );
        assert!(err.is_err());

        let trace: Trace = serde_json::from_str(
            r#"{ "steps": [{ "type": "key", "key": 255, "down": true }] }"#,
        )
        .unwrap();
        let mut replay = Replay::new(&trace, Config::default()).unwrap();
        assert!(replay.run(&trace.steps).unwrap().is_empty());
    }
}
