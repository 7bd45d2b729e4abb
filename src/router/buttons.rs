//! Tablet button decoding.

use crate::event::EventKind;

/// Tablet buttons 2 and 3 are swapped compared to pointer buttons.
const BUTTON_MAP: [u32; 8] = [0, 1, 4, 5, 2, 3, 6, 7];

/// Remap the low three bits of a packet button bitmask, higher bits are kept.
pub fn translate_buttons(raw: u32) -> u32 {
    BUTTON_MAP[(raw & 0x07) as usize] | (raw & !0x07)
}

/// Turn the buttons of a packet into an event kind, updating the tool button state.
///
/// Only the lowest button that changed is reported, the others are reported with the following
/// packets. Buttons are numbered from 1.
pub fn decode_buttons(raw: u32, button_state: &mut u32) -> EventKind {
    let translated = translate_buttons(raw);
    let diff = translated ^ *button_state;
    if diff == 0 {
        return EventKind::MotionNotify;
    }

    let bit = diff.trailing_zeros();
    let mask = 1 << bit;
    let button = bit + 1;
    *button_state ^= mask;

    if translated & mask != 0 {
        EventKind::ButtonPress { button }
    } else {
        EventKind::ButtonRelease { button }
    }
}
