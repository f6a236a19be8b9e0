// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Distance and field-of-view gating for decoded points.

/// Accepts or rejects points by calibrated distance and azimuth sector.
///
/// Distance bounds are inclusive. The azimuth sector supports wraparound
/// past 0/360 degrees: when `start_angle > end_angle` the accepted region
/// is `[start, 36000] + [0, end]`.
#[derive(Clone, Copy, Debug)]
pub struct RangeAngleFilter {
    min_distance: f32,
    max_distance: f32,
    /// Sector start, hundredths of a degree
    start_angle: i32,
    /// Sector end, hundredths of a degree
    end_angle: i32,
    /// Sector wraps past 0/360 degrees
    wraps: bool,
}

impl RangeAngleFilter {
    /// Build a filter from distance bounds in meters and a sector in
    /// hundredths of a degree. The wrap flag is derived from the sector
    /// orientation.
    pub fn new(min_distance: f32, max_distance: f32, start_angle: i32, end_angle: i32) -> Self {
        Self {
            min_distance,
            max_distance,
            start_angle,
            end_angle,
            wraps: start_angle > end_angle,
        }
    }

    /// Check the calibrated distance against the inclusive bounds.
    #[inline]
    pub fn distance_in(&self, distance: f32) -> bool {
        distance >= self.min_distance && distance <= self.max_distance
    }

    /// Check a corrected azimuth (already reduced to `[0, 36000)`)
    /// against the configured sector.
    #[inline]
    pub fn azimuth_in(&self, azimuth: i32) -> bool {
        if self.wraps {
            (azimuth >= self.start_angle && azimuth <= 36000)
                || (azimuth >= 0 && azimuth <= self.end_angle)
        } else {
            azimuth >= self.start_angle && azimuth <= self.end_angle
        }
    }

    /// Combined gate: a point passes only if both distance and azimuth do.
    #[inline]
    pub fn accepts(&self, distance: f32, azimuth: i32) -> bool {
        self.distance_in(distance) && self.azimuth_in(azimuth)
    }
}
