// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Precomputed trigonometry at the packet's native angular resolution.
//!
//! Azimuth and elevation angles arrive in hundredths of a degree, so sine
//! and cosine are table lookups over the full `[0, 36000)` range. The
//! tables are built once on first use and shared read-only across decoder
//! instances.

use std::sync::OnceLock;

/// Table resolution: hundredths of a degree over a full turn.
pub const ANGLE_STEPS: usize = 36000;

/// Sine/cosine lookup tables indexed in hundredths of a degree.
pub struct TrigTable {
    sin: Vec<f64>,
    cos: Vec<f64>,
}

impl TrigTable {
    fn build() -> Self {
        let mut sin = Vec::with_capacity(ANGLE_STEPS);
        let mut cos = Vec::with_capacity(ANGLE_STEPS);
        for i in 0..ANGLE_STEPS {
            let rad = (i as f64 * 0.01).to_radians();
            sin.push(rad.sin());
            cos.push(rad.cos());
        }
        Self { sin, cos }
    }

    /// Sine of an angle index in `[0, 36000)`.
    #[inline]
    pub fn sin(&self, index: usize) -> f64 {
        self.sin[index]
    }

    /// Cosine of an angle index in `[0, 36000)`.
    #[inline]
    pub fn cos(&self, index: usize) -> f64 {
        self.cos[index]
    }
}

/// Shared process-wide tables, built on first access.
pub fn tables() -> &'static TrigTable {
    static TABLES: OnceLock<TrigTable> = OnceLock::new();
    TABLES.get_or_init(TrigTable::build)
}

/// Reduce an angle in hundredths of a degree to a table index in
/// `[0, 36000)`.
///
/// The modulo-then-add-then-modulo sequence handles negative intermediate
/// values (calibration corrections can drive angles below zero).
#[inline]
pub fn reduce(angle: i32) -> usize {
    (((angle % 36000) + 36000) % 36000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_positive() {
        assert_eq!(reduce(0), 0);
        assert_eq!(reduce(18000), 18000);
        assert_eq!(reduce(35999), 35999);
        assert_eq!(reduce(36000), 0);
        assert_eq!(reduce(36200), 200);
    }

    #[test]
    fn test_reduce_negative() {
        assert_eq!(reduce(-1), 35999);
        assert_eq!(reduce(-36000), 0);
        assert_eq!(reduce(-72100), 35900);
    }

    #[test]
    fn test_table_values() {
        let t = tables();
        assert!((t.sin(0) - 0.0).abs() < 1e-12);
        assert!((t.cos(0) - 1.0).abs() < 1e-12);
        assert!((t.sin(9000) - 1.0).abs() < 1e-12);
        assert!(t.cos(9000).abs() < 1e-9);
        assert!((t.sin(4500) - t.cos(4500)).abs() < 1e-12);
        assert!((t.sin(27000) + 1.0).abs() < 1e-12);
    }
}
