//! The Wintab driver library, loaded at runtime.

use std::ffi::c_void;
use std::path::Path;
use std::ptr;

use libloading::Library;

use super::driver::{CursorInfo, DeviceInfo, ToolKind, WintabDriver};
use super::ffi::{
    Axis, ContextHandle, LogContext, Packet, PacketFields, CSR_ACTIVE, CSR_BUTTONS, CSR_NAME,
    CSR_PHYSID, CSR_PKTDATA, DVC_FIRSTCSR, DVC_NAME, DVC_NCSRTYPES,
    DVC_NPRESSURE, DVC_ORIENTATION, DVC_X, DVC_Y, IFC_NCURSORS, IFC_NDEVICES, IFC_SPECVERSION,
    WTI_CURSORS, WTI_DEFSYSCTX, WTI_DEVICES, WTI_DSCTXS, WTI_INTERFACE,
};
use super::LoadError;
use crate::backend::NativeHandle;

type WtInfo = unsafe extern "system" fn(u32, u32, *mut c_void) -> u32;
type WtEnable = unsafe extern "system" fn(isize, i32) -> i32;
type WtOpen = unsafe extern "system" fn(isize, *mut LogContext, i32) -> isize;
type WtContext = unsafe extern "system" fn(isize, *mut LogContext) -> i32;
type WtOverlap = unsafe extern "system" fn(isize, i32) -> i32;
type WtPacket = unsafe extern "system" fn(isize, u32, *mut c_void) -> i32;
type WtQueueSizeSet = unsafe extern "system" fn(isize, i32) -> i32;
type WtClose = unsafe extern "system" fn(isize) -> i32;

/// Entry points as resolved from the library, any of them may be missing.
struct EntryPoints {
    info_a: Option<WtInfo>,
    info_w: Option<WtInfo>,
    enable: Option<WtEnable>,
    open_a: Option<WtOpen>,
    get_a: Option<WtContext>,
    set_a: Option<WtContext>,
    overlap: Option<WtOverlap>,
    packet: Option<WtPacket>,
    queue_size_set: Option<WtQueueSizeSet>,
    close: Option<WtClose>,
}

fn resolve<T: Copy>(library: &Library, name: &str) -> Option<T> {
    let symbol = format!("{name}\0");
    // SAFETY: the signatures above are the ones from wintab.h.
    unsafe { library.get::<T>(symbol.as_bytes()) }
        .ok()
        .map(|symbol| *symbol)
}

/// The driver library with every entry point we need.
pub struct DllDriver {
    info_a: WtInfo,
    info_w: WtInfo,
    enable: WtEnable,
    open_a: WtOpen,
    get_a: WtContext,
    overlap: WtOverlap,
    packet: WtPacket,
    queue_size_set: WtQueueSizeSet,
    close: WtClose,
    // Keeps the entry points above valid, dropped last.
    _library: Library,
}

impl std::fmt::Debug for DllDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DllDriver").finish_non_exhaustive()
    }
}

impl DllDriver {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        // SAFETY: loading the driver runs its initialization code, there is nothing we can check
        // about it beforehand.
        let library = unsafe { Library::new(path) }.map_err(|err| LoadError::Library {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        let entry_points = EntryPoints {
            info_a: resolve(&library, "WTInfoA"),
            info_w: resolve(&library, "WTInfoW"),
            enable: resolve(&library, "WTEnable"),
            open_a: resolve(&library, "WTOpenA"),
            get_a: resolve(&library, "WTGetA"),
            set_a: resolve(&library, "WTSetA"),
            overlap: resolve(&library, "WTOverlap"),
            packet: resolve(&library, "WTPacket"),
            queue_size_set: resolve(&library, "WTQueueSizeSet"),
            close: resolve(&library, "WTClose"),
        };

        // Not used, still part of the set a working driver exports.
        entry_points.set_a.ok_or(LoadError::MissingSymbol("WTSetA"))?;

        Ok(Self {
            info_a: entry_points.info_a.ok_or(LoadError::MissingSymbol("WTInfoA"))?,
            info_w: entry_points.info_w.ok_or(LoadError::MissingSymbol("WTInfoW"))?,
            enable: entry_points.enable.ok_or(LoadError::MissingSymbol("WTEnable"))?,
            open_a: entry_points.open_a.ok_or(LoadError::MissingSymbol("WTOpenA"))?,
            get_a: entry_points.get_a.ok_or(LoadError::MissingSymbol("WTGetA"))?,
            overlap: entry_points.overlap.ok_or(LoadError::MissingSymbol("WTOverlap"))?,
            packet: entry_points.packet.ok_or(LoadError::MissingSymbol("WTPacket"))?,
            queue_size_set: entry_points
                .queue_size_set
                .ok_or(LoadError::MissingSymbol("WTQueueSizeSet"))?,
            close: entry_points.close.ok_or(LoadError::MissingSymbol("WTClose"))?,
            _library: library,
        })
    }

    /// Read a fixed size value from `WTInfoA`.
    fn info<T: Default>(&self, category: u32, index: u32) -> Option<T> {
        let mut value = T::default();
        // SAFETY: every (category, index) pair we query writes a `T` sized value.
        let written = unsafe { (self.info_a)(category, index, ptr::from_mut(&mut value).cast()) };
        (written > 0).then_some(value)
    }

    /// Read a string from `WTInfoW`.
    fn info_string(&self, category: u32, index: u32) -> Option<String> {
        // SAFETY: a null output asks for the size in bytes.
        let size = unsafe { (self.info_w)(category, index, ptr::null_mut()) } as usize;
        if size == 0 {
            return None;
        }
        let mut buf = vec![0u16; size / 2 + 1];
        // SAFETY: the buffer holds at least `size` bytes.
        unsafe { (self.info_w)(category, index, buf.as_mut_ptr().cast()) };
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        Some(String::from_utf16_lossy(&buf[..len]))
    }

    /// First cursor of the device a cursor belongs to.
    fn first_cursor_of(&self, cursor: u32) -> Option<u32> {
        (0..self.device_count()).find_map(|device| {
            let first: u32 = self.info(WTI_DEVICES + device, DVC_FIRSTCSR)?;
            let count: u32 = self.info(WTI_DEVICES + device, DVC_NCSRTYPES)?;
            (first..first + count).contains(&cursor).then_some(first)
        })
    }
}

impl WintabDriver for DllDriver {
    fn is_available(&self) -> bool {
        // SAFETY: the probe writes nothing.
        unsafe { (self.info_a)(0, 0, ptr::null_mut()) != 0 }
    }

    fn spec_version(&self) -> u16 {
        self.info(WTI_INTERFACE, IFC_SPECVERSION).unwrap_or(0)
    }

    fn device_count(&self) -> u32 {
        self.info(WTI_INTERFACE, IFC_NDEVICES).unwrap_or(0)
    }

    fn cursor_count(&self) -> u32 {
        self.info(WTI_INTERFACE, IFC_NCURSORS).unwrap_or(0)
    }

    fn device_info(&self, device: u32) -> Option<DeviceInfo> {
        let category = WTI_DEVICES + device;
        Some(DeviceInfo {
            name: self.info_string(category, DVC_NAME)?,
            cursor_types: self.info(category, DVC_NCSRTYPES).unwrap_or(0),
            first_cursor: self.info(category, DVC_FIRSTCSR).unwrap_or(0),
            x: self.info(category, DVC_X).unwrap_or_default(),
            y: self.info(category, DVC_Y).unwrap_or_default(),
            pressure: self.info(category, DVC_NPRESSURE).unwrap_or_default(),
            orientation: self
                .info::<[Axis; 3]>(category, DVC_ORIENTATION)
                .unwrap_or_default(),
        })
    }

    fn cursor_info(&self, cursor: u32) -> Option<CursorInfo> {
        let category = WTI_CURSORS + cursor;
        let active: i32 = self.info(category, CSR_ACTIVE).unwrap_or(0);
        let first_cursor = self.first_cursor_of(cursor).unwrap_or(0);

        Some(CursorInfo {
            name: self.info_string(category, CSR_NAME)?,
            active: active != 0,
            packet_data: PacketFields::from_bits_truncate(
                self.info(category, CSR_PKTDATA).unwrap_or(0),
            ),
            buttons: u32::from(self.info::<u8>(category, CSR_BUTTONS).unwrap_or(0)),
            physical_id: self.info(category, CSR_PHYSID).unwrap_or(0),
            kind: ToolKind::from_cursor_index(first_cursor, cursor),
        })
    }

    fn default_context(&self, device: Option<u32>) -> Option<LogContext> {
        match device {
            Some(device) => self.info(WTI_DSCTXS + device, 0),
            None => self.info(WTI_DEFSYSCTX, 0),
        }
    }

    fn open(
        &self,
        window: NativeHandle,
        context: &LogContext,
        enable: bool,
    ) -> Option<ContextHandle> {
        let mut context = *context;
        // SAFETY: the driver reads and may update the context we own.
        let handle = unsafe { (self.open_a)(window, ptr::from_mut(&mut context), i32::from(enable)) };
        let handle = ContextHandle(handle);
        (!handle.is_null()).then_some(handle)
    }

    fn close(&self, context: ContextHandle) -> bool {
        // SAFETY: plain handle call.
        unsafe { (self.close)(context.0) != 0 }
    }

    fn enable(&self, context: ContextHandle, enable: bool) -> bool {
        // SAFETY: plain handle call.
        unsafe { (self.enable)(context.0, i32::from(enable)) != 0 }
    }

    fn overlap(&self, context: ContextHandle, to_top: bool) -> bool {
        // SAFETY: plain handle call.
        unsafe { (self.overlap)(context.0, i32::from(to_top)) != 0 }
    }

    fn set_queue_size(&self, context: ContextHandle, size: i32) -> bool {
        // SAFETY: plain handle call.
        unsafe { (self.queue_size_set)(context.0, size) != 0 }
    }

    fn get_context(&self, context: ContextHandle) -> Option<LogContext> {
        let mut lc = LogContext::default();
        // SAFETY: the driver fills in a `LOGCONTEXTA`.
        let ok = unsafe { (self.get_a)(context.0, ptr::from_mut(&mut lc)) } != 0;
        ok.then_some(lc)
    }

    fn packet(&self, context: ContextHandle, serial: u32) -> Option<Packet> {
        let mut packet = Packet::default();
        // SAFETY: the context was opened with `PACKET_DATA`, which is the layout of `Packet`.
        let ok = unsafe { (self.packet)(context.0, serial, ptr::from_mut(&mut packet).cast()) } != 0;
        ok.then_some(packet)
    }
}
