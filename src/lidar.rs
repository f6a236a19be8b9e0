// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common output types and error handling for the RS32 decoder.
//!
//! This module provides the sensor-agnostic point cloud container, the
//! decode error taxonomy, and the host clock helper shared by the decoder.

use crate::packet::PacketKind;
use std::fmt;

/// Point cloud output structure.
///
/// Points are stored in a structure-of-arrays (SoA) layout for efficient
/// downstream SIMD processing. One `PointCloud` is filled per decoded MSOP
/// packet (or accumulated across packets by the caller); the caller owns the
/// container and passes a mutable reference to the decoder.
///
/// Filtered-out points in sparse mode are emitted with NaN coordinates and
/// zero intensity so the per-packet point count and ring structure stay
/// fixed.
#[derive(Clone, Debug, Default)]
pub struct PointCloud {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    intensity: Vec<u8>,
    /// Ring (laser channel) index of each point.
    ring: Vec<u8>,
    /// Echo index: 0 for single-return mode, 0/1 for dual-return mode.
    echo: Vec<u8>,
    /// Per-point timestamp in seconds.
    timestamp: Vec<f64>,
    /// Calibrated slant distance in meters (NaN for placeholder points).
    range: Vec<f32>,
}

impl PointCloud {
    /// Create an empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
            ring: Vec::with_capacity(capacity),
            echo: Vec::with_capacity(capacity),
            timestamp: Vec::with_capacity(capacity),
            range: Vec::with_capacity(capacity),
        }
    }

    /// Add a point to the cloud.
    #[allow(clippy::too_many_arguments)]
    #[inline]
    pub fn push(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        intensity: u8,
        ring: u8,
        echo: u8,
        timestamp: f64,
        range: f32,
    ) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.intensity.push(intensity);
        self.ring.push(ring);
        self.echo.push(echo);
        self.timestamp.push(timestamp);
        self.range.push(range);
    }

    /// Number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Check if the cloud contains no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Clear all points while retaining capacity.
    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.intensity.clear();
        self.ring.clear();
        self.echo.clear();
        self.timestamp.clear();
        self.range.clear();
    }

    /// X coordinates in meters.
    #[inline]
    pub fn x(&self) -> &[f32] {
        &self.x
    }

    /// Y coordinates in meters.
    #[inline]
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    /// Z coordinates in meters.
    #[inline]
    pub fn z(&self) -> &[f32] {
        &self.z
    }

    /// Reflectivity values.
    #[inline]
    pub fn intensity(&self) -> &[u8] {
        &self.intensity
    }

    /// Ring (laser channel) indices.
    #[inline]
    pub fn ring(&self) -> &[u8] {
        &self.ring
    }

    /// Echo indices.
    #[inline]
    pub fn echo(&self) -> &[u8] {
        &self.echo
    }

    /// Per-point timestamps in seconds.
    #[inline]
    pub fn timestamp(&self) -> &[f64] {
        &self.timestamp
    }

    /// Calibrated slant distances in meters.
    #[inline]
    pub fn range(&self) -> &[f32] {
        &self.range
    }
}

/// Decode error taxonomy.
///
/// No variant is fatal to the stream: packet-level conditions are delivered
/// through the decoder's error callback and the affected packet is dropped
/// or decoded in a degraded mode, so the caller can keep feeding packets.
#[derive(Debug)]
pub enum Error {
    /// I/O error (calibration file load)
    Io(std::io::Error),
    /// Buffer length does not match the fixed size for the declared kind
    MalformedPacket { kind: PacketKind, len: usize },
    /// Magic identifier bytes do not match the declared kind
    UnrecognizedPacket(PacketKind),
    /// Decoding proceeded with default or stale calibration
    DegradedCalibration(String),
    /// Calibration sign byte is neither 0 (positive) nor 1 (negative);
    /// the value was treated as positive
    AmbiguousCalibrationSign { channel: usize },
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::MalformedPacket { kind, len } => {
                write!(f, "malformed {} packet: {} bytes", kind, len)
            }
            Error::UnrecognizedPacket(kind) => {
                write!(f, "unrecognized {} packet identifier", kind)
            }
            Error::DegradedCalibration(msg) => write!(f, "degraded calibration: {}", msg),
            Error::AmbiguousCalibrationSign { channel } => {
                write!(f, "ambiguous calibration sign on channel {}", channel)
            }
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

/// Callback invoked for every non-fatal decode condition.
///
/// The decoder never propagates packet-level failures as return values;
/// conditions are reported through this callback so the caller can continue
/// processing subsequent packets.
pub type ErrorCallback = Box<dyn Fn(&Error) + Send>;

/// Get current host timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_cloud_push() {
        let mut cloud = PointCloud::with_capacity(4);
        assert!(cloud.is_empty());

        cloud.push(1.0, 2.0, 3.0, 128, 7, 0, 1234.5, 3.74);
        cloud.push(4.0, 5.0, 6.0, 255, 8, 1, 1234.6, 8.77);

        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.x(), &[1.0, 4.0]);
        assert_eq!(cloud.y(), &[2.0, 5.0]);
        assert_eq!(cloud.z(), &[3.0, 6.0]);
        assert_eq!(cloud.intensity(), &[128, 255]);
        assert_eq!(cloud.ring(), &[7, 8]);
        assert_eq!(cloud.echo(), &[0, 1]);
        assert_eq!(cloud.timestamp(), &[1234.5, 1234.6]);
        assert_eq!(cloud.range(), &[3.74, 8.77]);
    }

    #[test]
    fn test_point_cloud_clear() {
        let mut cloud = PointCloud::new();
        cloud.push(1.0, 1.0, 1.0, 1, 0, 0, 0.0, 1.7);
        cloud.clear();
        assert!(cloud.is_empty());
        assert_eq!(cloud.len(), 0);
    }

    #[test]
    fn test_error_display() {
        let err = Error::MalformedPacket {
            kind: PacketKind::Msop,
            len: 100,
        };
        assert_eq!(format!("{}", err), "malformed MSOP packet: 100 bytes");

        let err = Error::UnrecognizedPacket(PacketKind::Difop);
        assert_eq!(format!("{}", err), "unrecognized DIFOP packet identifier");
    }

    #[test]
    fn test_timestamp_monotonic() {
        let a = timestamp().unwrap();
        let b = timestamp().unwrap();
        assert!(b >= a);
    }
}
