// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewport metrics forwarded to the engine.

use kurbo::Size;

/// The physical size and pixel density of the host target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportMetrics {
    /// Target size in physical pixels.
    pub physical_size: Size,
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f64,
}

impl ViewportMetrics {
    /// Builds metrics from host-reported integer dimensions.
    ///
    /// A non-finite or non-positive ratio is replaced with `1.0`.
    #[must_use]
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        let ratio = f64::from(device_pixel_ratio);
        Self {
            physical_size: Size::new(f64::from(width), f64::from(height)),
            device_pixel_ratio: if ratio.is_finite() && ratio > 0.0 {
                ratio
            } else {
                1.0
            },
        }
    }

    /// Returns the size in logical pixels.
    #[must_use]
    pub fn logical_size(&self) -> Size {
        self.physical_size / self.device_pixel_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_size_divides_by_ratio() {
        let m = ViewportMetrics::new(200, 100, 2.0);
        assert_eq!(m.logical_size(), Size::new(100.0, 50.0));
    }

    #[test]
    fn bad_ratio_falls_back_to_one() {
        assert_eq!(ViewportMetrics::new(1, 1, 0.0).device_pixel_ratio, 1.0);
        assert_eq!(ViewportMetrics::new(1, 1, f32::NAN).device_pixel_ratio, 1.0);
        assert_eq!(ViewportMetrics::new(1, 1, -3.0).device_pixel_ratio, 1.0);
    }
}
