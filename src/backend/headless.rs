//! An in-memory desktop.
//!
//! Used by the replay tool and tests. Handles are shared, cloning a [`HeadlessPlatform`] gives
//! another view on the same desktop, so a test can keep one to move the cursor around while the
//! display owns the other.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use glam::IVec2;

use super::{CursorHandle, NativeHandle, Platform, KEY_DOWN, KEY_TOGGLED};
use crate::utils::Rect;

const DESKTOP: NativeHandle = 0x0001_0010;
const ARROW_CURSOR: CursorHandle = 0x0001_0003;
const FIRST_WINDOW: NativeHandle = 0x0002_0000;

#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    inner: Rc<RefCell<Desktop>>,
}

#[derive(Debug)]
struct Desktop {
    bounds: Rect,
    work_area: Rect,
    // Bottom to top.
    windows: Vec<NativeWindow>,
    cursor_position: IVec2,
    cursor: Option<CursorHandle>,
    capture: Option<NativeHandle>,
    keys: [u8; 256],
    tick: u32,
    system_directory: Option<PathBuf>,
    fail_tablet_window: bool,
    next_handle: NativeHandle,
}

#[derive(Debug, Clone)]
struct NativeWindow {
    handle: NativeHandle,
    parent: NativeHandle,
    /// Whole window, including the non-client area, in screen coordinates.
    frame: Rect,
    /// Client area in screen coordinates.
    client: Rect,
    visible: bool,
    enabled: bool,
}

impl Desktop {
    fn window(&self, handle: NativeHandle) -> Option<&NativeWindow> {
        self.windows.iter().find(|window| window.handle == handle)
    }

    fn window_mut(&mut self, handle: NativeHandle) -> Option<&mut NativeWindow> {
        self.windows.iter_mut().find(|window| window.handle == handle)
    }

    fn client_origin(&self, handle: NativeHandle) -> IVec2 {
        if handle == DESKTOP {
            return IVec2::ZERO;
        }
        self.window(handle)
            .map_or(IVec2::ZERO, |window| window.client.loc)
    }

    fn is_shown(&self, handle: NativeHandle) -> bool {
        let mut current = handle;
        while current != DESKTOP {
            match self.window(current) {
                Some(window) if window.visible => current = window.parent,
                _ => return false,
            }
        }
        true
    }

    /// Topmost visible and enabled child of `parent` whose frame contains `point`.
    fn child_at(&self, parent: NativeHandle, point: IVec2) -> Option<NativeHandle> {
        self.windows
            .iter()
            .rev()
            .find(|window| {
                window.parent == parent
                    && window.visible
                    && window.enabled
                    && window.frame.contains(point)
            })
            .map(|window| window.handle)
    }
}

impl HeadlessPlatform {
    /// Create a desktop spanning `bounds`, in screen coordinates.
    pub fn new(bounds: Rect) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Desktop {
                bounds,
                work_area: bounds,
                windows: Vec::new(),
                cursor_position: IVec2::ZERO,
                cursor: Some(ARROW_CURSOR),
                capture: None,
                keys: [0; 256],
                tick: 0,
                system_directory: Some(PathBuf::from(r"C:\Windows\system32")),
                fail_tablet_window: false,
                next_handle: FIRST_WINDOW,
            })),
        }
    }

    /// Add a visible window on top of its siblings.
    ///
    /// `client` is in screen coordinates, a `parent` of `None` creates a toplevel.
    pub fn add_window(&self, parent: Option<NativeHandle>, client: Rect) -> NativeHandle {
        self.add_framed_window(parent, client, client)
    }

    /// Same as [`Self::add_window`] with a non-client area around the client rectangle.
    pub fn add_framed_window(
        &self,
        parent: Option<NativeHandle>,
        frame: Rect,
        client: Rect,
    ) -> NativeHandle {
        let mut desktop = self.inner.borrow_mut();
        let handle = desktop.next_handle;
        desktop.next_handle += 0x10;
        desktop.windows.push(NativeWindow {
            handle,
            parent: parent.unwrap_or(DESKTOP),
            frame,
            client,
            visible: true,
            enabled: true,
        });
        handle
    }

    pub fn set_visible(&self, window: NativeHandle, visible: bool) {
        if let Some(window) = self.inner.borrow_mut().window_mut(window) {
            window.visible = visible;
        }
    }

    pub fn set_enabled(&self, window: NativeHandle, enabled: bool) {
        if let Some(window) = self.inner.borrow_mut().window_mut(window) {
            window.enabled = enabled;
        }
    }

    pub fn is_visible(&self, window: NativeHandle) -> bool {
        self.inner
            .borrow()
            .window(window)
            .is_some_and(|window| window.visible)
    }

    /// Move the cursor, like the user would, without going through the input core.
    pub fn move_cursor(&self, position: IVec2) {
        self.inner.borrow_mut().cursor_position = position;
    }

    pub fn set_key_down(&self, vk: usize, down: bool) {
        let keys = &mut self.inner.borrow_mut().keys;
        if down {
            keys[vk] |= KEY_DOWN;
        } else {
            keys[vk] &= !KEY_DOWN;
        }
    }

    pub fn set_key_toggled(&self, vk: usize, toggled: bool) {
        let keys = &mut self.inner.borrow_mut().keys;
        if toggled {
            keys[vk] |= KEY_TOGGLED;
        } else {
            keys[vk] &= !KEY_TOGGLED;
        }
    }

    pub fn set_tick(&self, tick: u32) {
        self.inner.borrow_mut().tick = tick;
    }

    pub fn advance_tick(&self, millis: u32) {
        let mut desktop = self.inner.borrow_mut();
        desktop.tick = desktop.tick.wrapping_add(millis);
    }

    pub fn captured(&self) -> Option<NativeHandle> {
        self.inner.borrow().capture
    }

    pub fn set_work_area(&self, work_area: Rect) {
        self.inner.borrow_mut().work_area = work_area;
    }

    pub fn set_system_directory(&self, directory: Option<PathBuf>) {
        self.inner.borrow_mut().system_directory = directory;
    }

    /// Make the next tablet window creations fail.
    pub fn fail_tablet_window(&self, fail: bool) {
        self.inner.borrow_mut().fail_tablet_window = fail;
    }
}

impl Platform for HeadlessPlatform {
    fn cursor_position(&self) -> IVec2 {
        self.inner.borrow().cursor_position
    }

    fn set_cursor_position(&self, position: IVec2) {
        let mut desktop = self.inner.borrow_mut();
        let min = desktop.bounds.loc;
        let max = desktop.bounds.loc + desktop.bounds.size - IVec2::ONE;
        desktop.cursor_position = position.clamp(min, max.max(min));
    }

    fn cursor(&self) -> Option<CursorHandle> {
        self.inner.borrow().cursor
    }

    fn set_cursor(&self, cursor: Option<CursorHandle>) {
        self.inner.borrow_mut().cursor = cursor;
    }

    fn arrow_cursor(&self) -> CursorHandle {
        ARROW_CURSOR
    }

    fn window_from_point(&self, point: IVec2) -> Option<NativeHandle> {
        let desktop = self.inner.borrow();
        let mut hit = desktop.child_at(DESKTOP, point)?;
        while let Some(child) = desktop.child_at(hit, point) {
            hit = child;
        }
        Some(hit)
    }

    fn child_window_from_point(&self, parent: NativeHandle, point: IVec2) -> Option<NativeHandle> {
        let desktop = self.inner.borrow();
        let screen = point + desktop.client_origin(parent);
        let inside = if parent == DESKTOP {
            desktop.bounds.contains(screen)
        } else {
            desktop
                .window(parent)
                .is_some_and(|window| window.frame.contains(screen))
        };
        if !inside {
            return None;
        }

        Some(desktop.child_at(parent, screen).unwrap_or(parent))
    }

    fn desktop_window(&self) -> NativeHandle {
        DESKTOP
    }

    fn client_rect(&self, window: NativeHandle) -> Option<Rect> {
        let desktop = self.inner.borrow();
        if window == DESKTOP {
            return Some(Rect {
                loc: IVec2::ZERO,
                size: desktop.bounds.size,
            });
        }
        desktop.window(window).map(|window| Rect {
            loc: IVec2::ZERO,
            size: window.client.size,
        })
    }

    fn client_to_screen(&self, window: NativeHandle, point: IVec2) -> IVec2 {
        point + self.inner.borrow().client_origin(window)
    }

    fn screen_to_client(&self, window: NativeHandle, point: IVec2) -> IVec2 {
        point - self.inner.borrow().client_origin(window)
    }

    fn monitor_work_area(&self, _window: NativeHandle) -> Rect {
        self.inner.borrow().work_area
    }

    fn set_capture(&self, window: NativeHandle) {
        let mut desktop = self.inner.borrow_mut();
        if desktop.is_shown(window) {
            desktop.capture = Some(window);
        }
    }

    fn release_capture(&self) {
        self.inner.borrow_mut().capture = None;
    }

    fn keyboard_state(&self) -> [u8; 256] {
        self.inner.borrow().keys
    }

    fn tick_count(&self) -> u32 {
        self.inner.borrow().tick
    }

    fn virtual_desktop_origin(&self) -> IVec2 {
        self.inner.borrow().bounds.loc
    }

    fn system_directory(&self) -> Option<PathBuf> {
        self.inner.borrow().system_directory.clone()
    }

    fn create_tablet_window(&self) -> Option<NativeHandle> {
        if self.inner.borrow().fail_tablet_window {
            return None;
        }
        let rect = Rect::new(-100, -100, 2, 2);
        let handle = self.add_window(None, rect);
        self.set_visible(handle, false);
        Some(handle)
    }

    fn destroy_window(&self, window: NativeHandle) {
        let mut desktop = self.inner.borrow_mut();
        let mut doomed = vec![window];
        let mut idx = 0;
        while let Some(&handle) = doomed.get(idx) {
            doomed.extend(
                desktop
                    .windows
                    .iter()
                    .filter(|window| window.parent == handle)
                    .map(|window| window.handle),
            );
            idx += 1;
        }
        desktop
            .windows
            .retain(|window| !doomed.contains(&window.handle));
        if desktop.capture.is_some_and(|capture| doomed.contains(&capture)) {
            desktop.capture = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop() -> (HeadlessPlatform, NativeHandle, NativeHandle) {
        let platform = HeadlessPlatform::new(Rect::new(0, 0, 1920, 1080));
        let top = platform.add_framed_window(
            None,
            Rect::new(100, 100, 400, 300),
            Rect::new(104, 130, 392, 266),
        );
        let child = platform.add_window(Some(top), Rect::new(200, 200, 50, 50));
        (platform, top, child)
    }

    #[test]
    fn window_from_point_finds_the_deepest_window() {
        let (platform, top, child) = desktop();
        assert_eq!(platform.window_from_point(IVec2::new(210, 210)), Some(child));
        assert_eq!(platform.window_from_point(IVec2::new(110, 140)), Some(top));
        // Non-client area still belongs to the window.
        assert_eq!(platform.window_from_point(IVec2::new(101, 101)), Some(top));
        assert_eq!(platform.window_from_point(IVec2::new(900, 900)), None);

        platform.set_visible(child, false);
        assert_eq!(platform.window_from_point(IVec2::new(210, 210)), Some(top));
    }

    #[test]
    fn child_window_from_point_skips_disabled_children() {
        let (platform, top, child) = desktop();
        let client = platform.screen_to_client(top, IVec2::new(210, 210));
        assert_eq!(client, IVec2::new(106, 80));
        assert_eq!(platform.child_window_from_point(top, client), Some(child));

        platform.set_enabled(child, false);
        assert_eq!(platform.child_window_from_point(top, client), Some(top));

        let desktop = platform.desktop_window();
        assert_eq!(
            platform.child_window_from_point(desktop, IVec2::new(210, 210)),
            Some(top)
        );
        assert_eq!(
            platform.child_window_from_point(desktop, IVec2::new(5000, 5000)),
            None
        );
    }

    #[test]
    fn coordinates_round_trip() {
        let (platform, top, _) = desktop();
        let point = IVec2::new(17, 23);
        let screen = platform.client_to_screen(top, point);
        assert_eq!(screen, IVec2::new(121, 153));
        assert_eq!(platform.screen_to_client(top, screen), point);
        assert_eq!(
            platform.client_rect(top),
            Some(Rect::new(0, 0, 392, 266))
        );
    }

    #[test]
    fn capture_needs_a_shown_window() {
        let (platform, top, child) = desktop();
        platform.set_visible(top, false);
        platform.set_capture(child);
        assert_eq!(platform.captured(), None);

        platform.set_visible(top, true);
        platform.set_capture(child);
        assert_eq!(platform.captured(), Some(child));

        platform.destroy_window(top);
        assert_eq!(platform.captured(), None);
        assert_eq!(platform.window_from_point(IVec2::new(210, 210)), None);
    }
}
