//! Small policies on top of the native primitives of [`Platform`].
//!
//! Logical root coordinates have their origin at the top-left corner of the virtual desktop and
//! are divided by the scale factor of the window they are relative to.

use glam::{DVec2, IVec2};

use crate::backend::{vk, CursorHandle, NativeHandle, Platform, KEY_DOWN, KEY_TOGGLED};
use crate::event::ModifierType;
use crate::window::{WindowId, WindowKind, WindowTable};

// Key flags carried by native mouse messages.
const MK_LBUTTON: u32 = 0x0001;
const MK_RBUTTON: u32 = 0x0002;
const MK_SHIFT: u32 = 0x0004;
const MK_CONTROL: u32 = 0x0008;
const MK_MBUTTON: u32 = 0x0010;
const MK_XBUTTON1: u32 = 0x0020;
const MK_XBUTTON2: u32 = 0x0040;

/// Pointer state as seen from a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub root: DVec2,
    /// Position relative to the queried window.
    pub position: DVec2,
    /// The child window under the pointer, if it is one we know.
    pub child: Option<WindowId>,
    pub mask: ModifierType,
}

/// Modifier keys and mouse buttons currently held, from a snapshot of the keyboard state.
pub fn current_keyboard_mask(platform: &dyn Platform) -> ModifierType {
    let keys = platform.keyboard_state();
    let mut mask = ModifierType::empty();

    for (key, flag) in [
        (vk::SHIFT, ModifierType::SHIFT),
        (vk::CAPITAL, ModifierType::LOCK),
        (vk::CONTROL, ModifierType::CONTROL),
        (vk::MENU, ModifierType::MOD1),
        (vk::LBUTTON, ModifierType::BUTTON1),
        (vk::MBUTTON, ModifierType::BUTTON2),
        (vk::RBUTTON, ModifierType::BUTTON3),
    ] {
        if keys[key] & KEY_DOWN != 0 {
            mask |= flag;
        }
    }

    mask
}

/// Modifier keys only, ignoring the mouse buttons.
///
/// Caps lock counts when it is toggled on, not while it is held.
pub fn modifier_key_state(platform: &dyn Platform) -> ModifierType {
    let keys = platform.keyboard_state();
    let mut mask = ModifierType::empty();

    if keys[vk::CONTROL] & KEY_DOWN != 0 {
        mask |= ModifierType::CONTROL;
    }
    if keys[vk::SHIFT] & KEY_DOWN != 0 {
        mask |= ModifierType::SHIFT;
    }
    if keys[vk::MENU] & KEY_DOWN != 0 {
        mask |= ModifierType::MOD1;
    }
    if keys[vk::CAPITAL] & KEY_TOGGLED != 0 {
        mask |= ModifierType::LOCK;
    }

    mask
}

/// Event state of a native mouse message, from the key flags it carries.
pub fn pointer_event_state(platform: &dyn Platform, key_flags: u32) -> ModifierType {
    let keys = platform.keyboard_state();
    let mut mask = ModifierType::empty();

    for (flag, modifier) in [
        (MK_CONTROL, ModifierType::CONTROL),
        (MK_SHIFT, ModifierType::SHIFT),
        (MK_LBUTTON, ModifierType::BUTTON1),
        (MK_MBUTTON, ModifierType::BUTTON2),
        (MK_RBUTTON, ModifierType::BUTTON3),
        (MK_XBUTTON1, ModifierType::BUTTON4),
        (MK_XBUTTON2, ModifierType::BUTTON5),
    ] {
        if key_flags & flag != 0 {
            mask |= modifier;
        }
    }
    if keys[vk::MENU] & KEY_DOWN != 0 {
        mask |= ModifierType::MOD1;
    }
    if keys[vk::CAPITAL] & KEY_TOGGLED != 0 {
        mask |= ModifierType::LOCK;
    }

    mask
}

/// Replace the displayed cursor.
///
/// Hiding the cursor while it still shows `previous` would leave the system without any
/// cursor, this is refused.
pub fn set_cursor(
    platform: &dyn Platform,
    previous: Option<CursorHandle>,
    cursor: Option<CursorHandle>,
) {
    if cursor.is_none() && previous.is_some() && platform.cursor() == previous {
        warn!(?previous, "Refusing to unset the displayed cursor");
        return;
    }

    platform.set_cursor(cursor);
}

/// Move the cursor to a position in logical root coordinates.
pub fn warp(platform: &dyn Platform, position: IVec2) {
    let screen = position + platform.virtual_desktop_origin();
    trace!(?position, ?screen, "Warping cursor");
    platform.set_cursor_position(screen);
}

/// Convert a screen point to logical root coordinates for the given scale.
pub fn screen_to_root(platform: &dyn Platform, screen: IVec2, scale: i32) -> IVec2 {
    (screen - platform.virtual_desktop_origin()) / scale.max(1)
}

/// Position of a window client area in logical root coordinates.
pub fn window_origin(platform: &dyn Platform, windows: &WindowTable, window: WindowId) -> IVec2 {
    if window.is_root() {
        return IVec2::ZERO;
    }
    let Some(native) = windows.native(window) else {
        return IVec2::ZERO;
    };
    let screen = platform.client_to_screen(native, IVec2::ZERO);
    screen_to_root(platform, screen, windows.scale(window))
}

/// Whether a screen point lies inside the client area of a native window.
pub fn in_client_area(platform: &dyn Platform, native: NativeHandle, screen: IVec2) -> bool {
    platform
        .client_rect(native)
        .is_some_and(|rect| rect.contains(platform.screen_to_client(native, screen)))
}

/// Current pointer position and modifiers, relative to `window`.
pub fn query_state(
    platform: &dyn Platform,
    windows: &WindowTable,
    window: WindowId,
) -> Option<PointerState> {
    let native = windows.native(window)?;
    let scale = windows.scale(window);
    let screen = platform.cursor_position();
    let root = screen_to_root(platform, screen, scale);

    let (position, child) = if window.is_root() {
        // Look through to the toplevel under the cursor.
        let child = platform
            .window_from_point(screen)
            .and_then(|hwnd| windows.lookup(hwnd))
            .and_then(|id| windows.toplevel(id));
        (root, child)
    } else {
        let client = platform.screen_to_client(native, screen);
        let child = platform
            .child_window_from_point(native, client)
            .filter(|&hwnd| hwnd != native)
            .and_then(|hwnd| windows.lookup(hwnd));
        (client / scale, child)
    };

    Some(PointerState {
        root: root.as_dvec2(),
        position: position.as_dvec2(),
        child,
        mask: current_keyboard_mask(platform),
    })
}

/// Find the window under the cursor, with the cursor position relative to it.
///
/// With `include_toplevel` the desktop hierarchy is walked from the top, stopping at the first
/// window we know. Otherwise the deepest native window under the cursor is used. Points that are
/// not inside the client area of what was hit do not count as a hit. When nothing is hit the root
/// window is returned.
///
/// Returns `None` when the window under the cursor is not one of ours.
pub fn window_at_point(
    platform: &dyn Platform,
    windows: &WindowTable,
    include_toplevel: bool,
) -> Option<(WindowId, DVec2)> {
    let screen = platform.cursor_position();
    let root = || {
        let position = screen_to_root(platform, screen, windows.root().scale);
        (WindowId::ROOT, position.as_dvec2())
    };

    let (hwnd, window) = if include_toplevel {
        let mut hwnd = platform.desktop_window();
        loop {
            let window = windows.lookup(hwnd);
            if window
                .and_then(|id| windows.get(id))
                .is_some_and(|w| !matches!(w.kind, WindowKind::Root | WindowKind::Foreign))
            {
                break (hwnd, window);
            }

            let client = platform.screen_to_client(hwnd, screen);
            let child = platform
                .child_window_from_point(hwnd, client)
                .filter(|&child| child == hwnd || in_client_area(platform, child, screen));
            match child {
                Some(child) if child != hwnd => hwnd = child,
                _ => break (hwnd, window),
            }
        }
    } else {
        let Some(hwnd) = platform
            .window_from_point(screen)
            .filter(|&hwnd| in_client_area(platform, hwnd, screen))
        else {
            return Some(root());
        };
        (hwnd, windows.lookup(hwnd))
    };

    let window = window?;
    if window.is_root() {
        return Some(root());
    }

    let scale = windows.scale(window);
    let local = platform.screen_to_client(hwnd, screen) / scale;
    Some((window, local.as_dvec2()))
}
