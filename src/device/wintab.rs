//! Tablet tools and the translation of their packets.

use std::f64::consts::{FRAC_PI_2, TAU};

use glam::DVec2;

use super::axis::{translate_window_coord, AxisInfo, AxisUse};
use super::{Device, InputMode};
use crate::wintab::ffi::{Axis, ContextHandle, Orientation, Packet, PacketFields};

/// The tablet side of a tool device.
#[derive(Debug, Clone)]
pub struct WintabDevice {
    pub context: ContextHandle,
    /// Cursor index, as reported in packets.
    pub cursor: u32,
    /// Packet fields the cursor reports.
    pub packet_data: PacketFields,
    /// Azimuth and altitude of the tablet.
    pub orientation_axes: [Axis; 2],
    /// Whether the tool drives the system cursor.
    pub sends_core: bool,
    /// Buttons held, bit 0 is button 1.
    pub button_state: u32,
    /// Raw values of the last packet, one per axis of the device.
    pub last_axis_data: Box<[i32]>,
}

impl WintabDevice {
    pub fn new(
        context: ContextHandle,
        cursor: u32,
        packet_data: PacketFields,
        orientation_axes: [Axis; 2],
        sends_core: bool,
        num_axes: usize,
    ) -> Self {
        Self {
            context,
            cursor,
            packet_data,
            orientation_axes,
            sends_core,
            button_state: 0,
            last_axis_data: vec![0; num_axes].into_boxed_slice(),
        }
    }

    /// Keep the axis values of a packet, in axis order: X, Y, pressure then the two tilts.
    pub fn store_packet(&mut self, packet: &Packet) {
        let mut values = Vec::with_capacity(5);
        if self.packet_data.contains(PacketFields::X) {
            values.push(packet.x);
        }
        if self.packet_data.contains(PacketFields::Y) {
            values.push(packet.y);
        }
        if self.packet_data.contains(PacketFields::NORMAL_PRESSURE) {
            values.push(packet.normal_pressure as i32);
        }
        if self.packet_data.contains(PacketFields::ORIENTATION) {
            let (x_tilt, y_tilt) = decode_tilt(&packet.orientation, &self.orientation_axes);
            values.push(x_tilt);
            values.push(y_tilt);
        }

        for (slot, value) in self.last_axis_data.iter_mut().zip(values) {
            *slot = value;
        }
    }
}

/// Axes a cursor gets, from what its packets carry.
pub fn tool_axes(packet_data: PacketFields, x: &Axis, y: &Axis, pressure: &Axis) -> Vec<AxisInfo> {
    // Resolutions are 16.16 fixed point.
    let axis = |axis_use, axis: &Axis| {
        AxisInfo::new(
            axis_use,
            f64::from(axis.min),
            f64::from(axis.max),
            f64::from(axis.resolution / 65535),
        )
    };

    let mut axes = Vec::new();
    if packet_data.contains(PacketFields::X) {
        axes.push(axis(AxisUse::X, x));
    }
    if packet_data.contains(PacketFields::Y) {
        axes.push(axis(AxisUse::Y, y));
    }
    if packet_data.contains(PacketFields::NORMAL_PRESSURE) {
        axes.push(axis(AxisUse::Pressure, pressure));
    }
    if packet_data.contains(PacketFields::ORIENTATION) {
        // Azimuth and altitude are reported as tilt in -1000..1000.
        axes.push(AxisInfo::new(AxisUse::XTilt, -1000.0, 1000.0, 1000.0));
        axes.push(AxisInfo::new(AxisUse::YTilt, -1000.0, 1000.0, 1000.0));
    }
    axes
}

/// Convert azimuth and altitude into x and y tilt in -1000..1000.
///
/// Tablets that advertise orientation without measuring it report a zero resolution, the tilt
/// is zero then.
pub fn decode_tilt(orientation: &Orientation, axes: &[Axis; 2]) -> (i32, i32) {
    let [azimuth, altitude] = axes;
    if azimuth.resolution == 0 || altitude.resolution == 0 {
        return (0, 0);
    }

    // The driver measures azimuth from a different reference direction.
    let az = TAU * f64::from(orientation.azimuth) / (f64::from(azimuth.resolution) / 65536.0)
        - FRAC_PI_2;
    let el = TAU * f64::from(orientation.altitude) / (f64::from(altitude.resolution) / 65536.0);

    (
        (az.cos() * el.cos() * 1000.0).round() as i32,
        (az.sin() * el.cos() * 1000.0).round() as i32,
    )
}

/// Geometry of the window axis values are translated for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranslateTarget {
    /// Window origin, in root coordinates.
    pub origin: DVec2,
    /// Window size, in logical pixels.
    pub size: DVec2,
    /// Work area size of the monitor the window is on.
    pub screen: DVec2,
}

/// Translate raw axis values for a window.
///
/// Coordinates end up relative to the window, mapped from the whole monitor in screen mode or
/// onto the window itself in window mode. The other axes are normalized to their logical range.
/// Returns the axis values with the translated position.
pub fn translate_axes(device: &Device, data: &[i32], target: &TranslateTarget) -> (Vec<f64>, DVec2) {
    let find = |axis_use| device.axes.iter().find(|axis| axis.axis_use == axis_use);
    let (x_axis, y_axis) = (find(AxisUse::X), find(AxisUse::Y));
    let mut position = DVec2::ZERO;

    let axes = device
        .axes
        .iter()
        .zip(data)
        .map(|(axis, &raw)| {
            let value = f64::from(raw);
            if !axis.axis_use.is_coordinate() {
                return axis.translate(value).unwrap_or(0.0);
            }

            let is_x = axis.axis_use == AxisUse::X;
            let translated = if device.mode == InputMode::Window {
                x_axis
                    .zip(y_axis)
                    .and_then(|(x, y)| translate_window_coord(x, y, target.size.into(), is_x, value))
                    .unwrap_or(0.0)
            } else if is_x {
                axis.translate_screen_coord(target.origin.x, target.screen.x, value)
            } else {
                axis.translate_screen_coord(target.origin.y, target.screen.y, value)
            };

            if is_x {
                position.x = translated;
            } else {
                position.y = translated;
            }
            translated
        })
        .collect();

    (axes, position)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::device::manager::NewTool;
    use crate::device::{DeviceId, DeviceKind, DeviceType, InputSource};
    use crate::wintab::ffi::PACKET_DATA;

    const ORIENTATION_AXES: [Axis; 2] = [
        Axis {
            min: 0,
            max: 3599,
            units: 1,
            resolution: 3600 << 16,
        },
        Axis {
            min: -900,
            max: 900,
            units: 1,
            resolution: 3600 << 16,
        },
    ];

    /// A pen on a 1000x500 tablet with pressure and tilt.
    pub(crate) fn tool_with_axes(sends_core: bool) -> (NewTool, WintabDevice) {
        let axes = tool_axes(
            PACKET_DATA,
            &Axis {
                min: 0,
                max: 1000,
                units: 2,
                resolution: 1000 << 16,
            },
            &Axis {
                min: 0,
                max: 500,
                units: 2,
                resolution: 1000 << 16,
            },
            &Axis {
                min: 0,
                max: 1023,
                units: 0,
                resolution: 0,
            },
        );
        let tool = WintabDevice::new(
            ContextHandle(0x30),
            1,
            PACKET_DATA,
            ORIENTATION_AXES,
            sends_core,
            axes.len(),
        );
        let new = NewTool {
            name: "Tablet Pressure Stylus".to_string(),
            source: InputSource::Pen,
            mode: InputMode::Screen,
            sends_core,
            axes,
        };
        (new, tool)
    }

    fn device(mode: InputMode) -> (Device, WintabDevice) {
        let (new, tool) = tool_with_axes(true);
        let mut device = Device::new(
            DeviceId(4),
            new.name,
            DeviceType::Slave,
            new.source,
            DeviceKind::Tool(Box::new(tool.clone())),
        );
        device.axes = new.axes;
        device.mode = mode;
        (device, tool)
    }

    #[test]
    fn axes_follow_packet_data() {
        let (new, tool) = tool_with_axes(true);
        let uses: Vec<_> = new.axes.iter().map(|axis| axis.axis_use).collect();
        assert_eq!(
            uses,
            [
                AxisUse::X,
                AxisUse::Y,
                AxisUse::Pressure,
                AxisUse::XTilt,
                AxisUse::YTilt
            ]
        );
        assert_eq!(tool.last_axis_data.len(), new.axes.len());
        assert_eq!(new.axes[0].resolution, 1000.0);

        let flat = Axis::default();
        let axes = tool_axes(PacketFields::X | PacketFields::Y, &flat, &flat, &flat);
        assert_eq!(axes.len(), 2);
    }

    #[test]
    fn packets_are_stored_in_axis_order() {
        let (_, mut tool) = tool_with_axes(true);
        tool.store_packet(&Packet {
            x: 100,
            y: 200,
            normal_pressure: 512,
            orientation: Orientation {
                azimuth: 900,
                altitude: 0,
                twist: 0,
            },
            ..Default::default()
        });
        assert_eq!(&*tool.last_axis_data, &[100, 200, 512, 1000, 0]);

        let mut partial = WintabDevice::new(
            ContextHandle(1),
            0,
            PacketFields::X | PacketFields::Y,
            ORIENTATION_AXES,
            false,
            2,
        );
        partial.store_packet(&Packet {
            x: 7,
            y: 8,
            normal_pressure: 512,
            ..Default::default()
        });
        assert_eq!(&*partial.last_axis_data, &[7, 8]);
    }

    #[test]
    fn tilt_decoding() {
        let straight = Orientation {
            azimuth: 0,
            altitude: 0,
            twist: 0,
        };
        assert_eq!(decode_tilt(&straight, &ORIENTATION_AXES), (0, -1000));

        let upright = Orientation {
            azimuth: 900,
            altitude: 900,
            twist: 0,
        };
        assert_eq!(decode_tilt(&upright, &ORIENTATION_AXES), (0, 0));
    }

    #[test]
    fn unmeasured_tilt_is_zero() {
        let orientation = Orientation {
            azimuth: 450,
            altitude: 300,
            twist: 0,
        };
        let mut axes = ORIENTATION_AXES;
        axes[1].resolution = 0;
        assert_eq!(decode_tilt(&orientation, &axes), (0, 0));

        let mut axes = ORIENTATION_AXES;
        axes[0].resolution = 0;
        assert_eq!(decode_tilt(&orientation, &axes), (0, 0));
    }

    #[test]
    fn tilt_stays_in_range() {
        for resolution in [1u32 << 16, 3600 << 16, 7 << 16, 1, 0xFFFF_FFFF] {
            let axes = [
                Axis {
                    resolution,
                    ..Default::default()
                },
                Axis {
                    resolution,
                    ..Default::default()
                },
            ];
            let quarter = (resolution / 4) as i32;
            let orientation = Orientation {
                azimuth: quarter,
                altitude: quarter,
                twist: 0,
            };
            let (x, y) = decode_tilt(&orientation, &axes);
            assert!((-1000..=1000).contains(&x), "{resolution}: {x}");
            assert!((-1000..=1000).contains(&y), "{resolution}: {y}");
        }
    }

    #[test]
    fn screen_mode_translation() {
        let (device, _) = device(InputMode::Screen);
        let target = TranslateTarget {
            origin: DVec2::new(100.0, 50.0),
            size: DVec2::new(300.0, 200.0),
            screen: DVec2::new(2000.0, 1000.0),
        };
        let (axes, position) = translate_axes(&device, &[500, 250, 1023, 0, -1000], &target);

        assert_eq!(position, DVec2::new(900.0, 450.0));
        assert_eq!(axes, vec![900.0, 450.0, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn window_mode_translation() {
        let (device, _) = device(InputMode::Window);
        let target = TranslateTarget {
            origin: DVec2::new(100.0, 50.0),
            size: DVec2::new(500.0, 250.0),
            screen: DVec2::new(2000.0, 1000.0),
        };
        let (axes, position) = translate_axes(&device, &[500, 250, 0, 0, 0], &target);

        assert_eq!(position, DVec2::new(250.0, 125.0));
        assert_eq!(axes[2], 0.0);
    }
}
