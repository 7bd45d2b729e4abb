//! Native windowing primitives.
//!
//! Everything here is a thin wrapper, policies live in [`crate::glue`].

use std::fmt;
use std::path::PathBuf;

use glam::IVec2;

use crate::utils::Rect;

pub mod headless;
#[cfg(windows)]
pub mod win32;

/// A native window handle.
pub type NativeHandle = isize;
/// A native cursor handle.
pub type CursorHandle = isize;

/// Virtual key codes the input core reads from keyboard snapshots.
pub mod vk {
    pub const LBUTTON: usize = 0x01;
    pub const RBUTTON: usize = 0x02;
    pub const MBUTTON: usize = 0x04;
    pub const SHIFT: usize = 0x10;
    pub const CONTROL: usize = 0x11;
    pub const MENU: usize = 0x12;
    pub const CAPITAL: usize = 0x14;
}

/// Keyboard snapshot bit set while a key is held down.
pub const KEY_DOWN: u8 = 0x80;
/// Keyboard snapshot bit set while a toggle key is on.
pub const KEY_TOGGLED: u8 = 0x01;

/// The native platform as seen by the input core.
///
/// All methods are best-effort and never fail in a recoverable way. Coordinates are in native
/// pixels, screen coordinates are relative to the primary monitor like the native API uses them.
pub trait Platform: fmt::Debug {
    /// The system cursor position, in screen coordinates.
    fn cursor_position(&self) -> IVec2;
    fn set_cursor_position(&self, position: IVec2);

    /// The currently displayed cursor.
    fn cursor(&self) -> Option<CursorHandle>;
    fn set_cursor(&self, cursor: Option<CursorHandle>);
    /// The stock arrow cursor.
    fn arrow_cursor(&self) -> CursorHandle;

    /// The deepest visible window under a screen point.
    fn window_from_point(&self, point: IVec2) -> Option<NativeHandle>;
    /// The direct child of `parent` containing `point` (in `parent` client coordinates), skipping
    /// disabled and invisible children.
    ///
    /// Returns `parent` itself when no child contains the point, and `None` if the point is
    /// outside of `parent`.
    fn child_window_from_point(&self, parent: NativeHandle, point: IVec2) -> Option<NativeHandle>;
    fn desktop_window(&self) -> NativeHandle;

    /// Client area of a window, with its origin at zero.
    fn client_rect(&self, window: NativeHandle) -> Option<Rect>;
    fn client_to_screen(&self, window: NativeHandle, point: IVec2) -> IVec2;
    fn screen_to_client(&self, window: NativeHandle, point: IVec2) -> IVec2;
    /// Work area of the monitor nearest to a window, in screen coordinates.
    fn monitor_work_area(&self, window: NativeHandle) -> Rect;

    fn set_capture(&self, window: NativeHandle);
    fn release_capture(&self);

    /// Snapshot of the keyboard state, indexed by virtual key.
    fn keyboard_state(&self) -> [u8; 256];
    /// Milliseconds since the system started, wrapping around.
    fn tick_count(&self) -> u32;
    /// Top-left corner of the virtual desktop spanning all monitors.
    fn virtual_desktop_origin(&self) -> IVec2;

    fn system_directory(&self) -> Option<PathBuf>;
    /// Create the hidden 2x2 off-screen window receiving tablet messages.
    fn create_tablet_window(&self) -> Option<NativeHandle>;
    fn destroy_window(&self, window: NativeHandle);
}
