//! Wintab data layouts and constants.
//!
//! The layouts match `wintab.h` and `pktdef.h` for the packet fields we request, they are read
//! straight out of the driver on Windows and built by hand by the simulated driver.

#![allow(non_snake_case)]

use serde::{Deserialize, Serialize};

/// A context handle, `HCTX`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextHandle(pub isize);

impl ContextHandle {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

pub const WT_DEFBASE: u32 = 0x7FF0;
pub const WT_PACKET: u32 = WT_DEFBASE;
pub const WT_PROXIMITY: u32 = WT_DEFBASE + 5;
pub const WT_CSRCHANGE: u32 = WT_DEFBASE + 7;

// Information categories.
pub const WTI_INTERFACE: u32 = 1;
pub const WTI_DEFSYSCTX: u32 = 4;
pub const WTI_DEVICES: u32 = 100;
pub const WTI_CURSORS: u32 = 200;
pub const WTI_DSCTXS: u32 = 500;

pub const IFC_SPECVERSION: u32 = 2;
pub const IFC_NDEVICES: u32 = 4;
pub const IFC_NCURSORS: u32 = 5;

pub const DVC_NAME: u32 = 1;
pub const DVC_NCSRTYPES: u32 = 3;
pub const DVC_FIRSTCSR: u32 = 4;
pub const DVC_X: u32 = 12;
pub const DVC_Y: u32 = 13;
pub const DVC_NPRESSURE: u32 = 15;
pub const DVC_ORIENTATION: u32 = 17;

pub const CSR_NAME: u32 = 1;
pub const CSR_ACTIVE: u32 = 2;
pub const CSR_PKTDATA: u32 = 3;
pub const CSR_BUTTONS: u32 = 4;
pub const CSR_PHYSID: u32 = 15;

// Context options.
pub const CXO_SYSTEM: u32 = 0x0001;
pub const CXO_PEN: u32 = 0x0002;
pub const CXO_MESSAGES: u32 = 0x0004;
pub const CXO_CSRMESSAGES: u32 = 0x0008;
pub const CXO_MGNINSIDE: u32 = 0x4000;
pub const CXO_MARGIN: u32 = 0x8000;

pub const LCNAMELEN: usize = 40;

bitflags::bitflags! {
    /// Packet fields, `WTPKT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PacketFields: u32 {
        const CONTEXT = 0x0001;
        const STATUS = 0x0002;
        const TIME = 0x0004;
        const CHANGED = 0x0008;
        const SERIAL_NUMBER = 0x0010;
        const CURSOR = 0x0020;
        const BUTTONS = 0x0040;
        const X = 0x0080;
        const Y = 0x0100;
        const Z = 0x0200;
        const NORMAL_PRESSURE = 0x0400;
        const TANGENT_PRESSURE = 0x0800;
        const ORIENTATION = 0x1000;
        const ROTATION = 0x2000;
    }
}

/// The fields every context is opened with, the layout of [`Packet`].
pub const PACKET_DATA: PacketFields = PacketFields::CONTEXT
    .union(PacketFields::CURSOR)
    .union(PacketFields::BUTTONS)
    .union(PacketFields::X)
    .union(PacketFields::Y)
    .union(PacketFields::NORMAL_PRESSURE)
    .union(PacketFields::ORIENTATION);
/// Fields reported relative to the previous packet, none of them.
pub const PACKET_MODE: PacketFields = PacketFields::empty();

/// `AXIS`, the range of a device axis.
///
/// `resolution` is a 16.16 fixed point number of `units` per unit.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Axis {
    pub min: i32,
    pub max: i32,
    pub units: u32,
    pub resolution: u32,
}

/// `ORIENTATION`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Orientation {
    pub azimuth: i32,
    pub altitude: i32,
    pub twist: i32,
}

/// `PACKET` as defined by [`PACKET_DATA`].
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Packet {
    #[serde(skip)]
    pub context: isize,
    pub cursor: u32,
    pub buttons: u32,
    pub x: i32,
    pub y: i32,
    pub normal_pressure: u32,
    pub orientation: Orientation,
}

/// `LOGCONTEXTA`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogContext {
    pub lcName: [u8; LCNAMELEN],
    pub lcOptions: u32,
    pub lcStatus: u32,
    pub lcLocks: u32,
    pub lcMsgBase: u32,
    pub lcDevice: u32,
    pub lcPktRate: u32,
    pub lcPktData: u32,
    pub lcPktMode: u32,
    pub lcMoveMask: u32,
    pub lcBtnDnMask: u32,
    pub lcBtnUpMask: u32,
    pub lcInOrgX: i32,
    pub lcInOrgY: i32,
    pub lcInOrgZ: i32,
    pub lcInExtX: i32,
    pub lcInExtY: i32,
    pub lcInExtZ: i32,
    pub lcOutOrgX: i32,
    pub lcOutOrgY: i32,
    pub lcOutOrgZ: i32,
    pub lcOutExtX: i32,
    pub lcOutExtY: i32,
    pub lcOutExtZ: i32,
    pub lcSensX: u32,
    pub lcSensY: u32,
    pub lcSensZ: u32,
    pub lcSysMode: i32,
    pub lcSysOrgX: i32,
    pub lcSysOrgY: i32,
    pub lcSysExtX: i32,
    pub lcSysExtY: i32,
    pub lcSysSensX: u32,
    pub lcSysSensY: u32,
}

impl Default for LogContext {
    fn default() -> Self {
        Self {
            lcName: [0; LCNAMELEN],
            lcOptions: 0,
            lcStatus: 0,
            lcLocks: 0,
            lcMsgBase: 0,
            lcDevice: 0,
            lcPktRate: 0,
            lcPktData: 0,
            lcPktMode: 0,
            lcMoveMask: 0,
            lcBtnDnMask: 0,
            lcBtnUpMask: 0,
            lcInOrgX: 0,
            lcInOrgY: 0,
            lcInOrgZ: 0,
            lcInExtX: 0,
            lcInExtY: 0,
            lcInExtZ: 0,
            lcOutOrgX: 0,
            lcOutOrgY: 0,
            lcOutOrgZ: 0,
            lcOutExtX: 0,
            lcOutExtY: 0,
            lcOutExtZ: 0,
            lcSensX: 0,
            lcSensY: 0,
            lcSensZ: 0,
            lcSysMode: 0,
            lcSysOrgX: 0,
            lcSysOrgY: 0,
            lcSysExtX: 0,
            lcSysExtY: 0,
            lcSysSensX: 0,
            lcSysSensY: 0,
        }
    }
}

impl LogContext {
    pub fn name(&self) -> String {
        let len = self
            .lcName
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(LCNAMELEN);
        String::from_utf8_lossy(&self.lcName[..len]).into_owned()
    }

    pub fn set_name(&mut self, name: &str) {
        self.lcName = [0; LCNAMELEN];
        let len = name.len().min(LCNAMELEN - 1);
        self.lcName[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    pub fn sends_core(&self) -> bool {
        self.lcOptions & CXO_SYSTEM != 0
    }

    /// Ask for message delivery of absolute [`PACKET_DATA`] packets, with the output area
    /// matching the input area and Y growing downward.
    pub fn rewrite_for_messages(&mut self) {
        self.lcOptions |= CXO_MESSAGES | CXO_CSRMESSAGES;
        self.lcStatus = 0;
        self.lcMsgBase = WT_DEFBASE;
        self.lcPktRate = 0;
        self.lcPktData = PACKET_DATA.bits();
        self.lcPktMode = PACKET_MODE.bits();
        self.lcMoveMask = PACKET_DATA.bits();
        self.lcBtnDnMask = !0;
        self.lcBtnUpMask = !0;
        self.lcOutOrgX = self.lcInOrgX;
        self.lcOutOrgY = self.lcInOrgY;
        self.lcOutExtX = self.lcInExtX;
        self.lcOutExtY = self.lcInExtY.saturating_neg();
    }

    /// Human readable option names, for the context dump.
    pub fn option_names(&self) -> Vec<&'static str> {
        [
            (CXO_SYSTEM, "CXO_SYSTEM"),
            (CXO_PEN, "CXO_PEN"),
            (CXO_MESSAGES, "CXO_MESSAGES"),
            (CXO_MARGIN, "CXO_MARGIN"),
            (CXO_MGNINSIDE, "CXO_MGNINSIDE"),
            (CXO_CSRMESSAGES, "CXO_CSRMESSAGES"),
        ]
        .into_iter()
        .filter(|&(option, _)| self.lcOptions & option != 0)
        .map(|(_, name)| name)
        .collect()
    }
}
