//! Axis descriptions and the translations from device values to logical values.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisUse {
    Ignore,
    X,
    Y,
    Pressure,
    XTilt,
    YTilt,
}

impl AxisUse {
    pub fn is_coordinate(self) -> bool {
        matches!(self, Self::X | Self::Y)
    }
}

/// One axis of a device.
///
/// `min_value..=max_value` is the range the device reports, `min_axis..=max_axis` the logical
/// range values are normalized to. Coordinate axes have no logical range, they are translated
/// into window coordinates instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisInfo {
    pub label: Option<String>,
    pub axis_use: AxisUse,
    pub min_axis: f64,
    pub max_axis: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub resolution: f64,
}

impl AxisInfo {
    pub fn new(axis_use: AxisUse, min_value: f64, max_value: f64, resolution: f64) -> Self {
        let (min_axis, max_axis) = match axis_use {
            AxisUse::X | AxisUse::Y => (0.0, 0.0),
            AxisUse::XTilt | AxisUse::YTilt => (-1.0, 1.0),
            AxisUse::Ignore | AxisUse::Pressure => (0.0, 1.0),
        };

        Self {
            label: None,
            axis_use,
            min_axis,
            max_axis,
            min_value,
            max_value,
            resolution,
        }
    }

    /// Normalize a device value into the logical range.
    ///
    /// Returns `None` for coordinate axes.
    pub fn translate(&self, value: f64) -> Option<f64> {
        if self.axis_use.is_coordinate() {
            return None;
        }

        let width = self.max_value - self.min_value;
        if width == 0.0 {
            return Some(self.min_axis);
        }

        Some(
            (self.max_axis * (value - self.min_value) + self.min_axis * (self.max_value - value))
                / width,
        )
    }

    /// Map a coordinate value onto a screen of `screen_dim` pixels, relative to a window at
    /// `window_origin` on that axis.
    pub fn translate_screen_coord(&self, window_origin: f64, screen_dim: f64, value: f64) -> f64 {
        let width = self.max_value - self.min_value;
        let scale = if width > 0.0 { screen_dim / width } else { 1.0 };
        -window_origin + scale * (value - self.min_value)
    }
}

/// Map a coordinate value into a window of `window_size` logical pixels.
///
/// The device area is scaled to cover the whole window while keeping its aspect ratio, and
/// centered so that it overflows equally on both sides of the other axis. `x` and `y` are the
/// device coordinate axes, `is_x` picks which one `value` belongs to.
pub fn translate_window_coord(
    x: &AxisInfo,
    y: &AxisInfo,
    window_size: (f64, f64),
    is_x: bool,
    value: f64,
) -> Option<f64> {
    let device_width = x.max_value - x.min_value;
    let device_height = y.max_value - y.min_value;
    if device_width <= 0.0 || device_height <= 0.0 {
        return None;
    }
    let (window_width, window_height) = window_size;

    // Some drivers report a zero resolution, assume square device units then.
    let (x_resolution, y_resolution) = if x.resolution == 0.0 || y.resolution == 0.0 {
        (1.0, 1.0)
    } else {
        (x.resolution, y.resolution)
    };

    let device_aspect = (device_height * y_resolution) / (device_width * x_resolution);
    let (x_scale, y_scale, x_offset, y_offset);
    if device_aspect * window_width >= window_height {
        // Device taller than the window, fit to the width.
        x_scale = window_width / device_width;
        y_scale = (x_scale * x_resolution) / y_resolution;
        x_offset = 0.0;
        y_offset = -(device_height * y_scale - window_height) / 2.0;
    } else {
        y_scale = window_height / device_height;
        x_scale = (y_scale * y_resolution) / x_resolution;
        y_offset = 0.0;
        x_offset = -(device_width * x_scale - window_width) / 2.0;
    }

    Some(if is_x {
        x_offset + x_scale * (value - x.min_value)
    } else {
        y_offset + y_scale * (value - y.min_value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_ranges_follow_the_use() {
        let pressure = AxisInfo::new(AxisUse::Pressure, 0.0, 1023.0, 0.0);
        assert_eq!(pressure.translate(0.0), Some(0.0));
        assert_eq!(pressure.translate(1023.0), Some(1.0));

        let tilt = AxisInfo::new(AxisUse::XTilt, -1000.0, 1000.0, 1000.0);
        assert_eq!(tilt.translate(-1000.0), Some(-1.0));
        assert_eq!(tilt.translate(0.0), Some(0.0));
        assert_eq!(tilt.translate(500.0), Some(0.5));

        let x = AxisInfo::new(AxisUse::X, 0.0, 100.0, 1.0);
        assert_eq!(x.translate(50.0), None);
    }

    #[test]
    fn zero_width_axis_does_not_divide() {
        let broken = AxisInfo::new(AxisUse::Pressure, 5.0, 5.0, 0.0);
        assert_eq!(broken.translate(5.0), Some(0.0));
    }

    #[test]
    fn screen_coordinates() {
        let x = AxisInfo::new(AxisUse::X, 0.0, 1024.0, 1.0);
        // Half of the tablet on a 2048 pixel screen, window at 100.
        assert_eq!(x.translate_screen_coord(100.0, 2048.0, 512.0), 924.0);

        let flat = AxisInfo::new(AxisUse::X, 10.0, 10.0, 1.0);
        assert_eq!(flat.translate_screen_coord(0.0, 1920.0, 15.0), 5.0);
    }

    #[test]
    fn window_coordinates_keep_the_aspect_ratio() {
        let x = AxisInfo::new(AxisUse::X, 0.0, 2048.0, 10.0);
        let y = AxisInfo::new(AxisUse::Y, 0.0, 1024.0, 10.0);

        // A square window: fit to the height, the sides overflow.
        let size = (512.0, 512.0);
        assert_eq!(translate_window_coord(&x, &y, size, true, 1024.0), Some(256.0));
        assert_eq!(translate_window_coord(&x, &y, size, true, 0.0), Some(-256.0));
        assert_eq!(translate_window_coord(&x, &y, size, false, 1024.0), Some(512.0));

        // A wide window: fit to the width, top and bottom overflow.
        let size = (1024.0, 256.0);
        assert_eq!(translate_window_coord(&x, &y, size, true, 2048.0), Some(1024.0));
        assert_eq!(translate_window_coord(&x, &y, size, false, 512.0), Some(128.0));
        assert_eq!(translate_window_coord(&x, &y, size, false, 0.0), Some(-128.0));
    }

    #[test]
    fn zero_resolution_means_square_units() {
        let x = AxisInfo::new(AxisUse::X, 0.0, 100.0, 0.0);
        let y = AxisInfo::new(AxisUse::Y, 0.0, 100.0, 40.0);
        assert_eq!(
            translate_window_coord(&x, &y, (50.0, 50.0), true, 100.0),
            Some(50.0)
        );
    }
}
