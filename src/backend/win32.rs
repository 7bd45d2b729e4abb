//! The real Win32 platform.

use std::ffi::c_void;
use std::os::windows::ffi::OsStringExt;
use std::path::PathBuf;

use glam::IVec2;
use windows::core::w;
use windows::Win32::Foundation::{HINSTANCE, HWND, POINT, RECT};
use windows::Win32::Graphics::Gdi::{
    ClientToScreen, GetMonitorInfoW, MonitorFromWindow, ScreenToClient, MONITORINFO,
    MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::SystemInformation::{GetSystemDirectoryW, GetTickCount};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyboardState, ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    ChildWindowFromPointEx, CreateWindowExW, DestroyWindow, GetClientRect, GetCursor,
    GetCursorPos, GetDesktopWindow, GetSystemMetrics, LoadCursorW, SetCursor, SetCursorPos,
    WindowFromPoint, CWP_SKIPDISABLED, CWP_SKIPINVISIBLE, HCURSOR, IDC_ARROW, MSG,
    SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN, WM_ACTIVATE, WM_LBUTTONDOWN,
    WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_XBUTTONDOWN, WM_XBUTTONUP, WS_EX_TOOLWINDOW, WS_POPUP,
};

use super::{CursorHandle, NativeHandle, Platform};
use crate::router::{Message, MessageKind};
use crate::Display;
use crate::utils::Rect;
use crate::wintab::ffi::{ContextHandle, WT_CSRCHANGE, WT_PACKET, WT_PROXIMITY};

fn hwnd(handle: NativeHandle) -> HWND {
    HWND(handle as *mut c_void)
}

fn handle(hwnd: HWND) -> Option<NativeHandle> {
    (!hwnd.0.is_null()).then_some(hwnd.0 as NativeHandle)
}

fn point(point: IVec2) -> POINT {
    POINT {
        x: point.x,
        y: point.y,
    }
}

fn low_word(value: isize) -> i32 {
    i32::from(value as u16 as i16)
}

fn high_word(value: isize) -> i32 {
    i32::from((value >> 16) as u16 as i16)
}

#[derive(Debug, Default)]
pub struct Win32Platform;

impl Win32Platform {
    pub fn new() -> Self {
        Self
    }

    /// Feed a message pulled from the thread queue to `display`.
    ///
    /// Returns `true` when the input core consumed it, the caller should not pass it on to
    /// `DispatchMessageW` then.
    pub fn dispatch_message(display: &mut Display, msg: &MSG) -> bool {
        match Self::translate_message(msg) {
            Some(message) => display.dispatch(&message),
            None => false,
        }
    }

    /// Returns `None` for messages the input core does not handle.
    fn translate_message(msg: &MSG) -> Option<Message> {
        let window = handle(msg.hwnd)?;
        let pt = IVec2::new(msg.pt.x, msg.pt.y);
        let client = IVec2::new(low_word(msg.lParam.0), high_word(msg.lParam.0));
        let keys = msg.wParam.0 as u32 & 0xFFFF;
        let xbutton = if (msg.wParam.0 >> 16) & 0xFFFF == 1 {
            4
        } else {
            5
        };

        let kind = match msg.message {
            WM_MOUSEMOVE => MessageKind::MouseMove { client, keys },
            WM_LBUTTONDOWN => MessageKind::ButtonDown { button: 1, client, keys },
            WM_MBUTTONDOWN => MessageKind::ButtonDown { button: 2, client, keys },
            WM_RBUTTONDOWN => MessageKind::ButtonDown { button: 3, client, keys },
            WM_XBUTTONDOWN => MessageKind::ButtonDown {
                button: xbutton,
                client,
                keys,
            },
            WM_LBUTTONUP => MessageKind::ButtonUp { button: 1, client, keys },
            WM_MBUTTONUP => MessageKind::ButtonUp { button: 2, client, keys },
            WM_RBUTTONUP => MessageKind::ButtonUp { button: 3, client, keys },
            WM_XBUTTONUP => MessageKind::ButtonUp {
                button: xbutton,
                client,
                keys,
            },
            WM_ACTIVATE => MessageKind::Activate {
                active: msg.wParam.0 & 0xFFFF != 0,
            },
            WT_PACKET => MessageKind::Packet {
                context: ContextHandle(msg.lParam.0),
                serial: msg.wParam.0 as u32,
            },
            WT_CSRCHANGE => MessageKind::CursorChange {
                context: ContextHandle(msg.lParam.0),
                serial: msg.wParam.0 as u32,
            },
            WT_PROXIMITY => MessageKind::Proximity {
                context: ContextHandle(msg.wParam.0 as isize),
                entering: msg.lParam.0 & 0xFFFF != 0,
            },
            _ => return None,
        };

        Some(Message {
            window,
            time: msg.time,
            pt,
            kind,
        })
    }
}

impl Platform for Win32Platform {
    fn cursor_position(&self) -> IVec2 {
        let mut pt = POINT::default();
        if let Err(err) = unsafe { GetCursorPos(&mut pt) } {
            debug!(?err, "GetCursorPos failed");
        }
        IVec2::new(pt.x, pt.y)
    }

    fn set_cursor_position(&self, position: IVec2) {
        if let Err(err) = unsafe { SetCursorPos(position.x, position.y) } {
            debug!(?err, "SetCursorPos failed");
        }
    }

    fn cursor(&self) -> Option<CursorHandle> {
        let cursor = unsafe { GetCursor() };
        (!cursor.0.is_null()).then_some(cursor.0 as CursorHandle)
    }

    fn set_cursor(&self, cursor: Option<CursorHandle>) {
        let cursor = HCURSOR(cursor.map_or(std::ptr::null_mut(), |c| c as *mut c_void));
        unsafe { SetCursor(cursor) };
    }

    fn arrow_cursor(&self) -> CursorHandle {
        match unsafe { LoadCursorW(None, IDC_ARROW) } {
            Ok(cursor) => cursor.0 as CursorHandle,
            Err(err) => {
                warn!(?err, "Failed to load the arrow cursor");
                0
            }
        }
    }

    fn window_from_point(&self, pt: IVec2) -> Option<NativeHandle> {
        handle(unsafe { WindowFromPoint(point(pt)) })
    }

    fn child_window_from_point(&self, parent: NativeHandle, pt: IVec2) -> Option<NativeHandle> {
        handle(unsafe {
            ChildWindowFromPointEx(
                hwnd(parent),
                point(pt),
                CWP_SKIPDISABLED | CWP_SKIPINVISIBLE,
            )
        })
    }

    fn desktop_window(&self) -> NativeHandle {
        unsafe { GetDesktopWindow() }.0 as NativeHandle
    }

    fn client_rect(&self, window: NativeHandle) -> Option<Rect> {
        let mut rect = RECT::default();
        unsafe { GetClientRect(hwnd(window), &mut rect) }.ok()?;
        Some(Rect::new(
            rect.left,
            rect.top,
            rect.right - rect.left,
            rect.bottom - rect.top,
        ))
    }

    fn client_to_screen(&self, window: NativeHandle, pt: IVec2) -> IVec2 {
        let mut pt = point(pt);
        let _ = unsafe { ClientToScreen(hwnd(window), &mut pt) };
        IVec2::new(pt.x, pt.y)
    }

    fn screen_to_client(&self, window: NativeHandle, pt: IVec2) -> IVec2 {
        let mut pt = point(pt);
        let _ = unsafe { ScreenToClient(hwnd(window), &mut pt) };
        IVec2::new(pt.x, pt.y)
    }

    fn monitor_work_area(&self, window: NativeHandle) -> Rect {
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        unsafe {
            let monitor = MonitorFromWindow(hwnd(window), MONITOR_DEFAULTTONEAREST);
            let _ = GetMonitorInfoW(monitor, &mut info);
        }
        let work = info.rcWork;
        Rect::new(
            work.left,
            work.top,
            work.right - work.left,
            work.bottom - work.top,
        )
    }

    fn set_capture(&self, window: NativeHandle) {
        unsafe { SetCapture(hwnd(window)) };
    }

    fn release_capture(&self) {
        if let Err(err) = unsafe { ReleaseCapture() } {
            debug!(?err, "ReleaseCapture failed");
        }
    }

    fn keyboard_state(&self) -> [u8; 256] {
        let mut keys = [0u8; 256];
        if let Err(err) = unsafe { GetKeyboardState(&mut keys) } {
            debug!(?err, "GetKeyboardState failed");
        }
        keys
    }

    fn tick_count(&self) -> u32 {
        unsafe { GetTickCount() }
    }

    fn virtual_desktop_origin(&self) -> IVec2 {
        unsafe {
            IVec2::new(
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
            )
        }
    }

    fn system_directory(&self) -> Option<PathBuf> {
        let len = unsafe { GetSystemDirectoryW(None) };
        if len == 0 {
            return None;
        }
        let mut buf = vec![0u16; len as usize];
        let written = unsafe { GetSystemDirectoryW(Some(&mut buf)) } as usize;
        if written == 0 || written > buf.len() {
            return None;
        }
        buf.truncate(written);
        Some(PathBuf::from(std::ffi::OsString::from_wide(&buf)))
    }

    fn create_tablet_window(&self) -> Option<NativeHandle> {
        let instance = unsafe { GetModuleHandleW(None) }.ok()?;
        let result = unsafe {
            CreateWindowExW(
                WS_EX_TOOLWINDOW,
                w!("STATIC"),
                w!("cdk-input tablet window"),
                WS_POPUP,
                -100,
                -100,
                2,
                2,
                None,
                None,
                HINSTANCE::from(instance),
                None,
            )
        };
        match result {
            Ok(window) => handle(window),
            Err(err) => {
                warn!(?err, "Failed to create the tablet window");
                None
            }
        }
    }

    fn destroy_window(&self, window: NativeHandle) {
        if let Err(err) = unsafe { DestroyWindow(hwnd(window)) } {
            debug!(?err, "DestroyWindow failed");
        }
    }
}
