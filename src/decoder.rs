// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! RS32 decoder orchestration.
//!
//! Sequences packet validation, calibration state, azimuth interpolation,
//! Cartesian projection and range/FOV gating per packet. MSOP packets may
//! arrive before any DIFOP: decoding then proceeds with default calibration
//! in a documented degraded mode, reported once through the error callback.
//!
//! Decoding is single-threaded and synchronous; one decoder instance per
//! device stream, no shared mutable state between instances.

use crate::{
    calib::{CalibrationPolicy, CalibrationStore, DifopLoad},
    filter::RangeAngleFilter,
    lidar::{timestamp, Error, ErrorCallback, PointCloud},
    packet::{self, DifopPacket, MsopPacket, PacketKind, BLOCKS_PER_PACKET, CHANNELS_PER_BLOCK},
    trig,
};
use std::path::PathBuf;

/// Distance resolution in meters (5 mm)
const DISTANCE_RESOLUTION: f32 = 0.005;

/// Lens center offset along the optical axis, meters
const RX: f64 = 0.03997;

/// Lens center offset along the rotation axis, meters
const RZ: f64 = 0.0;

/// Firing time offset of each channel within a block, microseconds.
///
/// Model configuration data, not logic: the two 16-laser banks fire in
/// lockstep with 3 us between consecutive lasers, so channel 16 repeats
/// channel 0's slot.
const CHANNEL_FIRING_US: [f32; CHANNELS_PER_BLOCK] = [
    0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0, 33.0, 36.0, 39.0, 42.0, 45.0,
    0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0, 33.0, 36.0, 39.0, 42.0, 45.0,
];

/// Total firing duration of one block, microseconds
const BLOCK_FIRING_DURATION_US: f32 = 50.0;

/// Channel readings per second in single echo mode
const CHANNEL_READINGS_PER_SECOND: u32 = 18_000;

/// Points emitted per MSOP packet when no points are dropped
pub const POINTS_PER_PACKET: usize = BLOCKS_PER_PACKET * CHANNELS_PER_BLOCK;

/// Return-echo capture mode.
///
/// In dual mode the packet interleaves two blocks per physical rotation
/// step (one per echo), so azimuth neighbors sit two blocks apart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EchoMode {
    /// One return per firing
    #[default]
    Single,
    /// Two returns per firing, interleaved block pairs
    Dual,
}

impl EchoMode {
    /// Map the DIFOP return-mode byte: 0x00 selects dual echo, everything
    /// else (0x01 strongest, 0x02 last) is a single-return mode.
    pub fn from_return_mode(mode: u8) -> Self {
        match mode {
            0x00 => EchoMode::Dual,
            _ => EchoMode::Single,
        }
    }
}

/// Decoder configuration, consumed at construction.
#[derive(Clone, Debug)]
pub struct DecoderConfig {
    /// Minimum accepted distance in meters (inclusive)
    pub min_distance: f32,
    /// Maximum accepted distance in meters (inclusive)
    pub max_distance: f32,
    /// Azimuth sector start in hundredths of a degree
    pub start_angle: i32,
    /// Azimuth sector end in hundredths of a degree; a start past the end
    /// makes the sector wrap through 0/360 degrees
    pub end_angle: i32,
    /// Drop filtered-out points entirely instead of emitting NaN
    /// placeholders that keep the fixed per-packet point count
    pub dense_points: bool,
    /// Timestamp points from the device clock instead of the host clock
    pub use_device_clock: bool,
    /// Optional external calibration table, loaded once at construction
    pub calibration_file: Option<PathBuf>,
    /// Overwrite policy for calibration in repeated DIFOP packets
    pub calibration_policy: CalibrationPolicy,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            min_distance: 0.4,
            max_distance: 200.0,
            start_angle: 0,
            end_angle: 36000,
            dense_points: false,
            use_device_clock: false,
            calibration_file: None,
            calibration_policy: CalibrationPolicy::default(),
        }
    }
}

/// RS32 packet decoder.
///
/// Owns the calibration state for one device stream. DIFOP packets update
/// echo mode, scan rate and calibration; MSOP packets read that state and
/// emit points into a caller-owned [`PointCloud`].
pub struct Rs32Decoder {
    calib: CalibrationStore,
    filter: RangeAngleFilter,
    echo_mode: EchoMode,
    dense_points: bool,
    use_device_clock: bool,
    /// Derived from DIFOP rpm; default assumes 600 rpm single echo
    packets_per_frame: u32,
    /// Last decoded device temperature in Celsius
    temperature: f32,
    degraded_reported: bool,
    excb: ErrorCallback,
}

impl Rs32Decoder {
    /// Create a decoder whose conditions are logged at warn level.
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_error_callback(config, Box::new(|err| log::warn!("{}", err)))
    }

    /// Create a decoder with an explicit error callback.
    ///
    /// Every non-fatal condition (see [`Error`]) is delivered through
    /// `excb`; decode calls never fail outright.
    pub fn with_error_callback(config: DecoderConfig, excb: ErrorCallback) -> Self {
        // Out-of-range bounds fall back to the device's physical limits.
        let mut max_distance = config.max_distance;
        if !(0.4..=200.0).contains(&max_distance) {
            max_distance = 200.0;
        }
        let mut min_distance = config.min_distance;
        if min_distance > 200.0 || min_distance > max_distance {
            min_distance = 0.4;
        }

        let mut calib = CalibrationStore::new(config.calibration_policy);
        if let Some(path) = &config.calibration_file {
            match calib.load_from_file(path) {
                Ok(channels) => {
                    log::debug!("calibration file {}: {} channels", path.display(), channels)
                }
                Err(err) => excb(&Error::DegradedCalibration(format!(
                    "calibration file {}: {}",
                    path.display(),
                    err
                ))),
            }
        }

        Self {
            calib,
            filter: RangeAngleFilter::new(
                min_distance,
                max_distance,
                config.start_angle,
                config.end_angle,
            ),
            echo_mode: EchoMode::default(),
            dense_points: config.dense_points,
            use_device_clock: config.use_device_clock,
            packets_per_frame: packets_per_frame(EchoMode::default(), 600),
            temperature: 0.0,
            degraded_reported: false,
            excb,
        }
    }

    /// Process a device-info packet.
    ///
    /// Updates echo mode, packets-per-frame and (subject to the freshness
    /// policy) the calibration table. Invalid packets are reported and
    /// dropped.
    pub fn process_difop(&mut self, data: &[u8]) {
        if let Err(err) = packet::validate(PacketKind::Difop, data) {
            (self.excb)(&err);
            return;
        }
        let pkt = DifopPacket::new(data);

        self.echo_mode = EchoMode::from_return_mode(pkt.return_mode());
        let rpm = pkt.rpm();
        if rpm > 0 {
            self.packets_per_frame = packets_per_frame(self.echo_mode, rpm);
        }

        match self.calib.load_from_difop(pkt.vert_cali(), pkt.horiz_cali()) {
            DifopLoad::Loaded { ambiguous } => {
                for channel in ambiguous {
                    (self.excb)(&Error::AmbiguousCalibrationSign { channel });
                }
            }
            DifopLoad::Frozen | DifopLoad::FactoryBlank => {}
        }
    }

    /// Process a measurement packet, appending points to `cloud`.
    ///
    /// Returns the packet's leading azimuth (block 0, hundredths of a
    /// degree) for caller-side frame-boundary detection, or `None` when the
    /// packet was rejected. Point order is block order, then channel order
    /// within each block.
    pub fn process_msop(&mut self, data: &[u8], cloud: &mut PointCloud) -> Option<u16> {
        if let Err(err) = packet::validate(PacketKind::Msop, data) {
            (self.excb)(&err);
            return None;
        }

        if !self.calib.is_loaded() && !self.degraded_reported {
            (self.excb)(&Error::DegradedCalibration(
                "measurement before calibration; using default angles".to_string(),
            ));
            self.degraded_reported = true;
        }

        let pkt = MsopPacket::new(data);
        self.temperature = pkt.temperature();

        let pkt_time = if self.use_device_clock {
            pkt.device_time()
        } else {
            timestamp()
                .map(|ns| ns as f64 * 1e-9)
                .unwrap_or_else(|_| pkt.device_time())
        };
        let leading_azimuth = pkt.block(0).azimuth();
        let trig = trig::tables();

        for blk in 0..BLOCKS_PER_PACKET {
            let block = pkt.block(blk);
            if !block.id_valid() {
                // Tail blocks past a bad id are unusable; stop here.
                (self.excb)(&Error::UnrecognizedPacket(PacketKind::Msop));
                break;
            }

            let block_azimuth = block.azimuth() as i32;
            let (az_from, az_to) = self.neighbor_azimuths(&pkt, blk);
            let azimuth_diff = azimuth_gap(az_from, az_to) as f32;

            let (fire_index, echo) = match self.echo_mode {
                EchoMode::Dual => ((blk / 2) as f64, (blk % 2) as u8),
                EchoMode::Single => (blk as f64, 0u8),
            };
            let block_time = pkt_time + fire_index * BLOCK_FIRING_DURATION_US as f64 * 1e-6;

            for ch in 0..CHANNELS_PER_BLOCK {
                let azimuth_channel = channel_azimuth(block_azimuth, azimuth_diff, ch);
                let horiz_raw = trig::reduce(azimuth_channel as i32);
                let horiz = trig::reduce(self.calib.horiz_adjust(ch, azimuth_channel));
                let vert = trig::reduce(self.calib.vert_adjust(ch));

                let distance = block.distance(ch) as f32 * DISTANCE_RESOLUTION;
                let point_time = block_time + CHANNEL_FIRING_US[ch] as f64 * 1e-6;
                let ring = ch as u8;

                if self.filter.accepts(distance, horiz as i32) {
                    let d = distance as f64;
                    let x = d * trig.cos(vert) * trig.cos(horiz) + RX * trig.cos(horiz_raw);
                    let y = -d * trig.cos(vert) * trig.sin(horiz) - RX * trig.sin(horiz_raw);
                    let z = d * trig.sin(vert) + RZ;
                    cloud.push(
                        x as f32,
                        y as f32,
                        z as f32,
                        block.intensity(ch),
                        ring,
                        echo,
                        point_time,
                        distance,
                    );
                } else if !self.dense_points {
                    cloud.push(
                        f32::NAN,
                        f32::NAN,
                        f32::NAN,
                        0,
                        ring,
                        echo,
                        point_time,
                        f32::NAN,
                    );
                }
            }
        }

        Some(leading_azimuth)
    }

    /// Azimuth sample pair for interpolation across block `blk`.
    ///
    /// The neighbor is the next block in single echo mode, or two blocks
    /// ahead in dual echo mode (block pairs share one rotation step). For
    /// the trailing block(s) the roles swap so interpolation always spans
    /// two real samples.
    fn neighbor_azimuths(&self, pkt: &MsopPacket, blk: usize) -> (i32, i32) {
        let step = match self.echo_mode {
            EchoMode::Single => 1,
            EchoMode::Dual => 2,
        };
        if blk + step < BLOCKS_PER_PACKET {
            (
                pkt.block(blk).azimuth() as i32,
                pkt.block(blk + step).azimuth() as i32,
            )
        } else {
            (
                pkt.block(blk - step).azimuth() as i32,
                pkt.block(blk).azimuth() as i32,
            )
        }
    }

    /// Current echo mode (from the last DIFOP packet).
    pub fn echo_mode(&self) -> EchoMode {
        self.echo_mode
    }

    /// Expected packets per frame, derived from DIFOP rpm and echo mode.
    pub fn packets_per_frame(&self) -> u32 {
        self.packets_per_frame
    }

    /// Device temperature in Celsius from the last MSOP packet.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Calibration state for this device stream.
    pub fn calibration(&self) -> &CalibrationStore {
        &self.calib
    }

    /// Clear the calibration freeze so the next DIFOP packet repopulates
    /// the table.
    pub fn reset_calibration(&mut self) {
        self.calib.reset();
    }
}

/// Short-path angular difference `to - from`, both in `[0, 36000)`.
#[inline]
fn azimuth_gap(from: i32, to: i32) -> i32 {
    (36000 + to - from) % 36000
}

/// Interpolated raw azimuth of one channel within a block, hundredths of a
/// degree. Fractional and not range-reduced: the fraction must survive
/// until the horizontal correction has been applied, so truncation happens
/// at the use sites. Channel 0 fires at offset zero and maps to the block
/// azimuth exactly.
#[inline]
fn channel_azimuth(block_azimuth: i32, azimuth_diff: f32, channel: usize) -> f32 {
    block_azimuth as f32 + azimuth_diff * CHANNEL_FIRING_US[channel] / BLOCK_FIRING_DURATION_US
}

/// Expected packets per frame for a motor speed and echo mode.
fn packets_per_frame(echo_mode: EchoMode, rpm: u16) -> u32 {
    let mut rate = CHANNEL_READINGS_PER_SECOND.div_ceil(BLOCKS_PER_PACKET as u32);
    if echo_mode == EchoMode::Dual {
        rate *= 2;
    }
    (rate * 60).div_ceil(rpm as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_azimuth_gap_wraps() {
        // wrapping past 36000 yields the short path, not a negative value
        assert_eq!(azimuth_gap(35900, 100), 200);
        assert_eq!(azimuth_gap(100, 300), 200);
        assert_eq!(azimuth_gap(0, 0), 0);
        assert_eq!(azimuth_gap(35999, 0), 1);
    }

    #[test]
    fn test_channel_azimuth_offsets() {
        // channel 0 fires at offset fraction zero
        assert_eq!(channel_azimuth(12345, 20.0, 0), 12345.0);
        // banks repeat: channel 16 shares channel 0's slot
        assert_eq!(channel_azimuth(12345, 20.0, 16), 12345.0);
        // channel 15 fires at 45/50 of the block duration
        assert_eq!(channel_azimuth(12345, 20.0, 15), 12363.0);
        // channel 1, 3/50 of 20 -> 1.2, kept fractional for the correction
        assert!((channel_azimuth(12345, 20.0, 1) - 12346.2).abs() < 1e-3);
    }

    #[test]
    fn test_echo_mode_mapping() {
        assert_eq!(EchoMode::from_return_mode(0x00), EchoMode::Dual);
        assert_eq!(EchoMode::from_return_mode(0x01), EchoMode::Single);
        assert_eq!(EchoMode::from_return_mode(0x02), EchoMode::Single);
        assert_eq!(EchoMode::from_return_mode(0xFF), EchoMode::Single);
    }

    #[test]
    fn test_packets_per_frame() {
        assert_eq!(packets_per_frame(EchoMode::Single, 600), 150);
        assert_eq!(packets_per_frame(EchoMode::Dual, 600), 300);
        assert_eq!(packets_per_frame(EchoMode::Single, 1200), 75);
        assert_eq!(packets_per_frame(EchoMode::Dual, 300), 600);
    }

    #[test]
    fn test_config_clamping() {
        let decoder = Rs32Decoder::new(DecoderConfig {
            min_distance: 300.0,
            max_distance: 500.0,
            ..Default::default()
        });
        // both bounds fall back to device limits
        assert!(decoder.filter.distance_in(0.4));
        assert!(decoder.filter.distance_in(200.0));
        assert!(!decoder.filter.distance_in(200.5));
    }

    #[test]
    fn test_firing_schedule_shape() {
        assert_eq!(CHANNEL_FIRING_US[0], 0.0);
        assert_eq!(CHANNEL_FIRING_US[15], 45.0);
        for ch in 0..16 {
            assert_eq!(CHANNEL_FIRING_US[ch], ch as f32 * 3.0);
            assert_eq!(CHANNEL_FIRING_US[ch], CHANNEL_FIRING_US[ch + 16]);
        }
        for &offset in &CHANNEL_FIRING_US {
            assert!(offset < BLOCK_FIRING_DURATION_US);
        }
    }
}
