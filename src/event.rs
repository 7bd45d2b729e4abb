//! Logical input events delivered to the widget layer.

use serde::Serialize;

use crate::device::DeviceId;
use crate::seat::SeatId;
use crate::window::WindowId;

bitflags::bitflags! {
    /// The events a window selected, globally or for a single device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
    pub struct EventMask: u32 {
        const EXPOSURE = 1 << 1;
        const POINTER_MOTION = 1 << 2;
        const POINTER_MOTION_HINT = 1 << 3;
        const BUTTON_MOTION = 1 << 4;
        const BUTTON1_MOTION = 1 << 5;
        const BUTTON2_MOTION = 1 << 6;
        const BUTTON3_MOTION = 1 << 7;
        const BUTTON_PRESS = 1 << 8;
        const BUTTON_RELEASE = 1 << 9;
        const KEY_PRESS = 1 << 10;
        const KEY_RELEASE = 1 << 11;
        const ENTER_NOTIFY = 1 << 12;
        const LEAVE_NOTIFY = 1 << 13;
        const FOCUS_CHANGE = 1 << 14;
        const STRUCTURE = 1 << 15;
        const PROPERTY_CHANGE = 1 << 16;
        const VISIBILITY_NOTIFY = 1 << 17;
        const PROXIMITY_IN = 1 << 18;
        const PROXIMITY_OUT = 1 << 19;
        const SUBSTRUCTURE = 1 << 20;
        const SCROLL = 1 << 21;
        const TOUCH = 1 << 22;
        const SMOOTH_SCROLL = 1 << 23;
        const ALL_EVENTS = 0x00FF_FFFE;
    }
}

bitflags::bitflags! {
    /// Modifier keys and pointer buttons held while an event happened.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
    pub struct ModifierType: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;
        const BUTTON4 = 1 << 11;
        const BUTTON5 = 1 << 12;
    }
}

impl ModifierType {
    pub const BUTTONS: Self = Self::BUTTON1
        .union(Self::BUTTON2)
        .union(Self::BUTTON3)
        .union(Self::BUTTON4)
        .union(Self::BUTTON5);

    /// Pointer button state as event state bits, from a bitmask where bit 0 is button 1.
    pub fn from_button_state(button_state: u32) -> Self {
        Self::from_bits_truncate(button_state << 8) & Self::BUTTONS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum EventKind {
    MotionNotify,
    ButtonPress { button: u32 },
    ButtonRelease { button: u32 },
}

impl EventKind {
    /// The mask a window needs to have selected to receive this event.
    ///
    /// `button_state` is the device button bitmask, held buttons add their motion masks.
    pub fn required_mask(self, button_state: u32) -> EventMask {
        match self {
            Self::ButtonPress { .. } => EventMask::BUTTON_PRESS,
            Self::ButtonRelease { .. } => EventMask::BUTTON_RELEASE,
            Self::MotionNotify => {
                let mut mask = EventMask::POINTER_MOTION;
                for (bit, button_mask) in [
                    EventMask::BUTTON1_MOTION,
                    EventMask::BUTTON2_MOTION,
                    EventMask::BUTTON3_MOTION,
                ]
                .into_iter()
                .enumerate()
                {
                    if button_state & (1 << bit) != 0 {
                        mask |= EventMask::BUTTON_MOTION | button_mask;
                    }
                }
                mask
            }
        }
    }
}

/// A pointer event, ready to be consumed by the widget layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub window: WindowId,
    pub time: u32,
    /// Position relative to `window`, in logical pixels.
    pub x: f64,
    pub y: f64,
    pub x_root: f64,
    pub y_root: f64,
    /// Translated axis values, for devices that have axes.
    pub axes: Option<Vec<f64>>,
    pub state: ModifierType,
    pub device: DeviceId,
    pub source_device: DeviceId,
    pub seat: Option<SeatId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_buttons_add_motion_masks() {
        assert_eq!(
            EventKind::MotionNotify.required_mask(0),
            EventMask::POINTER_MOTION
        );
        assert_eq!(
            EventKind::MotionNotify.required_mask(0b101),
            EventMask::POINTER_MOTION
                | EventMask::BUTTON_MOTION
                | EventMask::BUTTON1_MOTION
                | EventMask::BUTTON3_MOTION
        );
        assert_eq!(
            EventKind::ButtonPress { button: 2 }.required_mask(0b111),
            EventMask::BUTTON_PRESS
        );
    }

    #[test]
    fn button_state_is_masked_to_five_buttons() {
        assert_eq!(
            ModifierType::from_button_state(0b1000_0001),
            ModifierType::BUTTON1
        );
        assert_eq!(
            ModifierType::from_button_state(0b1_0010),
            ModifierType::BUTTON2 | ModifierType::BUTTON5
        );
    }
}
