//! Logical input devices.
//!
//! Masters are what widgets observe, slaves are the physical sources behind them. Both master
//! devices are virtual: they own no hardware and forward state queries to whichever slave is
//! currently active.

use serde::Serialize;

pub mod axis;
pub mod manager;
pub mod wintab;

pub use axis::{AxisInfo, AxisUse};
pub use cdk_input_config::InputMode;
pub use manager::{DeviceManager, Notification};
pub use wintab::{TranslateTarget, WintabDevice};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Master,
    Slave,
    /// A physical device not attached to any master.
    Floating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputSource {
    Mouse,
    Keyboard,
    Pen,
    Eraser,
    Cursor,
}

/// What a device is backed by.
#[derive(Debug, Clone)]
pub enum DeviceKind {
    /// A master device, forwarding to its active slave.
    Virtual { active_slave: Option<DeviceId> },
    /// The system-aggregated pointer or keyboard.
    System,
    /// A tablet tool.
    Tool(Box<WintabDevice>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub source: InputSource,
    pub mode: InputMode,
    pub has_cursor: bool,
    pub axes: Vec<AxisInfo>,
    /// For masters the opposite master, for slaves their master.
    pub associated: Option<DeviceId>,
    /// Slaves attached to a master.
    pub slaves: Vec<DeviceId>,
    #[serde(skip)]
    pub kind: DeviceKind,
}

impl Device {
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        device_type: DeviceType,
        source: InputSource,
        kind: DeviceKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            device_type,
            source,
            mode: InputMode::Screen,
            has_cursor: false,
            axes: Vec::new(),
            associated: None,
            slaves: Vec::new(),
            kind,
        }
    }

    pub fn is_keyboard(&self) -> bool {
        self.source == InputSource::Keyboard
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, DeviceKind::Virtual { .. })
    }

    pub fn active_slave(&self) -> Option<DeviceId> {
        match self.kind {
            DeviceKind::Virtual { active_slave } => active_slave,
            _ => None,
        }
    }

    pub fn as_tool(&self) -> Option<&WintabDevice> {
        match &self.kind {
            DeviceKind::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn as_tool_mut(&mut self) -> Option<&mut WintabDevice> {
        match &mut self.kind {
            DeviceKind::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    /// Index of the first axis with this use.
    pub fn axis_index(&self, axis_use: AxisUse) -> Option<usize> {
        self.axes.iter().position(|axis| axis.axis_use == axis_use)
    }

    /// Look up the value of an axis in an axis array produced for this device.
    pub fn axis_value(&self, axes: &[f64], axis_use: AxisUse) -> Option<f64> {
        self.axis_index(axis_use)
            .and_then(|index| axes.get(index).copied())
    }
}
