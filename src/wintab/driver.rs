//! The tablet driver interface.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ffi::{Axis, ContextHandle, LogContext, Packet, PacketFields};
use crate::backend::NativeHandle;

/// What kind of tool a cursor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    /// A puck.
    Cursor,
    Pen,
    Eraser,
}

/// Description of a tablet, from `WTI_DEVICES`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub cursor_types: u32,
    pub first_cursor: u32,
    pub x: Axis,
    pub y: Axis,
    pub pressure: Axis,
    /// Azimuth, altitude and twist.
    pub orientation: [Axis; 3],
}

/// Description of a cursor, from `WTI_CURSORS`.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorInfo {
    pub name: String,
    pub active: bool,
    pub packet_data: PacketFields,
    pub buttons: u32,
    pub physical_id: u32,
    pub kind: ToolKind,
}

/// A Wintab implementation.
///
/// Mirrors the entry points of the driver library, with the info queries split per category.
/// Methods that can fail return `None`/`false` like the driver does, callers decide whether that
/// is worth a log line.
pub trait WintabDriver: fmt::Debug {
    /// The `WTInfo(0, 0, NULL)` probe.
    fn is_available(&self) -> bool;
    /// Specification version, major in the high byte.
    fn spec_version(&self) -> u16;
    fn device_count(&self) -> u32;
    fn cursor_count(&self) -> u32;

    fn device_info(&self, device: u32) -> Option<DeviceInfo>;
    fn cursor_info(&self, cursor: u32) -> Option<CursorInfo>;
    /// The default context of a device (`WTI_DSCTXS`), or the system one (`WTI_DEFSYSCTX`) for
    /// `None`.
    fn default_context(&self, device: Option<u32>) -> Option<LogContext>;

    fn open(&self, window: NativeHandle, context: &LogContext, enable: bool)
        -> Option<ContextHandle>;
    fn close(&self, context: ContextHandle) -> bool;
    fn enable(&self, context: ContextHandle, enable: bool) -> bool;
    fn overlap(&self, context: ContextHandle, to_top: bool) -> bool;
    fn set_queue_size(&self, context: ContextHandle, size: i32) -> bool;
    /// Read the context back after opening.
    fn get_context(&self, context: ContextHandle) -> Option<LogContext>;

    /// Fetch the packet with this serial, discarding older ones.
    fn packet(&self, context: ContextHandle, serial: u32) -> Option<Packet>;
}

impl ToolKind {
    /// Wacom style cursor triplets: puck, pressure stylus, eraser.
    pub fn from_cursor_index(first_cursor: u32, cursor: u32) -> Self {
        match cursor.wrapping_sub(first_cursor) % 3 {
            0 => Self::Cursor,
            1 => Self::Pen,
            _ => Self::Eraser,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_triplets() {
        assert_eq!(ToolKind::from_cursor_index(8, 8), ToolKind::Cursor);
        assert_eq!(ToolKind::from_cursor_index(8, 9), ToolKind::Pen);
        assert_eq!(ToolKind::from_cursor_index(8, 10), ToolKind::Eraser);
        assert_eq!(ToolKind::from_cursor_index(8, 13), ToolKind::Pen);
    }
}
