// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! RS32 packet layouts and validation.
//!
//! The RS32 emits two fixed-size 1248-byte packet kinds:
//!
//! ## MSOP (Main data Stream Output Protocol)
//! - Header: 42 bytes (sync id, device timestamp, raw temperature code)
//! - Data: 12 blocks x 100 bytes, each block carrying a coarse azimuth
//!   sample and 32 channel readings (distance + intensity)
//! - Index: 4 bytes, tail: 2 bytes
//!
//! ## DIFOP (Device InFormation Output Protocol)
//! - Sync id, motor rpm, return mode, and factory calibration tables
//!   (32 signed-magnitude angle triples each for vertical and horizontal)
//!
//! All multi-byte integer fields are big-endian. Parsing is explicit
//! field-offset access; no struct overlay, no reliance on host padding.

use crate::lidar::Error;
use std::fmt;

/// MSOP packet sync bytes
pub const MSOP_ID: [u8; 8] = [0x55, 0xAA, 0x05, 0x0A, 0x5A, 0xA5, 0x50, 0xA0];

/// DIFOP packet sync bytes
pub const DIFOP_ID: [u8; 8] = [0xA5, 0xFF, 0x00, 0x5A, 0x11, 0x11, 0x55, 0x55];

/// Per-block identifier bytes within an MSOP packet
pub const BLOCK_ID: [u8; 2] = [0xFF, 0xEE];

/// MSOP packet total size in bytes
pub const MSOP_PACKET_SIZE: usize = 1248;

/// DIFOP packet total size in bytes
pub const DIFOP_PACKET_SIZE: usize = 1248;

/// MSOP header size in bytes
pub const MSOP_HEADER_SIZE: usize = 42;

/// Number of data blocks per MSOP packet
pub const BLOCKS_PER_PACKET: usize = 12;

/// Number of channels (lasers) per block
pub const CHANNELS_PER_BLOCK: usize = 32;

/// Size of each data block in bytes: id(2) + azimuth(2) + 32 channels x 3
pub const BLOCK_SIZE: usize = 100;

/// Size of one channel reading: distance(2) + intensity(1)
const CHANNEL_SIZE: usize = 3;

/// Device timestamp offset within the MSOP header
const MSOP_TIMESTAMP_OFFSET: usize = 20;

/// Raw temperature code offset within the MSOP header
const MSOP_TEMP_OFFSET: usize = 38;

/// Motor rpm offset within a DIFOP packet
const DIFOP_RPM_OFFSET: usize = 8;

/// Return mode offset within a DIFOP packet
const DIFOP_RETURN_MODE_OFFSET: usize = 300;

/// Vertical calibration table offset within a DIFOP packet
const DIFOP_VERT_CALI_OFFSET: usize = 468;

/// Horizontal calibration table offset within a DIFOP packet
const DIFOP_HORIZ_CALI_OFFSET: usize = 564;

/// Size of one calibration table: 32 channels x 3 bytes
const CALI_TABLE_SIZE: usize = CHANNELS_PER_BLOCK * 3;

// Layout self-checks against the documented fixed packet length.
const _: () = assert!(BLOCK_SIZE == 2 + 2 + CHANNELS_PER_BLOCK * CHANNEL_SIZE);
const _: () = assert!(MSOP_HEADER_SIZE + BLOCKS_PER_PACKET * BLOCK_SIZE + 4 + 2 == MSOP_PACKET_SIZE);
const _: () =
    assert!(DIFOP_HORIZ_CALI_OFFSET + CALI_TABLE_SIZE + 586 + 2 == DIFOP_PACKET_SIZE);
const _: () = assert!(DIFOP_VERT_CALI_OFFSET + CALI_TABLE_SIZE == DIFOP_HORIZ_CALI_OFFSET);

/// Packet kind tag supplied by the reception layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    /// Measurement packet (one rotation slice of range/intensity readings)
    Msop,
    /// Device info packet (configuration and factory calibration)
    Difop,
}

impl PacketKind {
    /// Expected sync identifier bytes for this kind.
    pub fn expected_id(self) -> &'static [u8] {
        match self {
            PacketKind::Msop => &MSOP_ID,
            PacketKind::Difop => &DIFOP_ID,
        }
    }

    /// Expected total packet length for this kind.
    pub fn expected_len(self) -> usize {
        match self {
            PacketKind::Msop => MSOP_PACKET_SIZE,
            PacketKind::Difop => DIFOP_PACKET_SIZE,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PacketKind::Msop => write!(f, "MSOP"),
            PacketKind::Difop => write!(f, "DIFOP"),
        }
    }
}

/// Validate a packet buffer against its declared kind.
///
/// Checks the buffer length against the fixed packet size and the leading
/// sync identifier bytes against the kind's magic value. Side-effect-free;
/// on error the buffer must not be interpreted further.
pub fn validate(kind: PacketKind, data: &[u8]) -> Result<(), Error> {
    if data.len() != kind.expected_len() {
        return Err(Error::MalformedPacket {
            kind,
            len: data.len(),
        });
    }
    if &data[..kind.expected_id().len()] != kind.expected_id() {
        return Err(Error::UnrecognizedPacket(kind));
    }
    Ok(())
}

/// Read-only view over a validated MSOP packet.
///
/// Constructed per received buffer and fully consumed within one decode
/// call; never retained.
#[derive(Clone, Copy)]
pub struct MsopPacket<'a> {
    data: &'a [u8],
}

impl<'a> MsopPacket<'a> {
    /// Wrap a buffer that already passed [`validate`].
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert_eq!(data.len(), MSOP_PACKET_SIZE);
        Self { data }
    }

    /// Block view by index (0..[`BLOCKS_PER_PACKET`]).
    #[inline]
    pub fn block(&self, index: usize) -> MsopBlock<'a> {
        debug_assert!(index < BLOCKS_PER_PACKET);
        let start = MSOP_HEADER_SIZE + index * BLOCK_SIZE;
        MsopBlock {
            data: &self.data[start..start + BLOCK_SIZE],
        }
    }

    /// Device clock timestamp as seconds since the Unix epoch (UTC).
    ///
    /// The header carries a civil date (year as offset from 2000, month,
    /// day, hour, minute, second) plus big-endian millisecond and
    /// microsecond counters.
    pub fn device_time(&self) -> f64 {
        let t = &self.data[MSOP_TIMESTAMP_OFFSET..MSOP_TIMESTAMP_OFFSET + 10];
        let days = days_from_civil(2000 + t[0] as i64, t[1] as u32, t[2] as u32);
        let secs = days * 86_400 + t[3] as i64 * 3_600 + t[4] as i64 * 60 + t[5] as i64;
        let ms = u16::from_be_bytes([t[6], t[7]]) as f64;
        let us = u16::from_be_bytes([t[8], t[9]]) as f64;
        secs as f64 + ms / 1e3 + us / 1e6
    }

    /// Decoded device temperature in degrees Celsius.
    ///
    /// The raw code packs a 5-bit fraction discard, a 7-bit magnitude and a
    /// sign flag in the top bit of the second byte; resolution is 0.0625 C.
    pub fn temperature(&self) -> f32 {
        let lo = self.data[MSOP_TEMP_OFFSET];
        let hi = self.data[MSOP_TEMP_OFFSET + 1];
        let value = ((hi & 0x7F) as f32 * 32.0 + (lo >> 3) as f32) * 0.0625;
        if hi & 0x80 != 0 {
            -value
        } else {
            value
        }
    }
}

/// Read-only view over one MSOP data block.
#[derive(Clone, Copy)]
pub struct MsopBlock<'a> {
    data: &'a [u8],
}

impl MsopBlock<'_> {
    /// Check the block identifier bytes.
    #[inline]
    pub fn id_valid(&self) -> bool {
        self.data[..2] == BLOCK_ID
    }

    /// Coarse azimuth sample in hundredths of a degree, `[0, 36000)`.
    #[inline]
    pub fn azimuth(&self) -> u16 {
        u16::from_be_bytes([self.data[2], self.data[3]])
    }

    /// Raw distance for a channel, in 5 mm units.
    #[inline]
    pub fn distance(&self, channel: usize) -> u16 {
        debug_assert!(channel < CHANNELS_PER_BLOCK);
        let off = 4 + channel * CHANNEL_SIZE;
        u16::from_be_bytes([self.data[off], self.data[off + 1]])
    }

    /// Raw intensity for a channel.
    #[inline]
    pub fn intensity(&self, channel: usize) -> u8 {
        debug_assert!(channel < CHANNELS_PER_BLOCK);
        self.data[4 + channel * CHANNEL_SIZE + 2]
    }
}

/// Read-only view over a validated DIFOP packet.
#[derive(Clone, Copy)]
pub struct DifopPacket<'a> {
    data: &'a [u8],
}

impl<'a> DifopPacket<'a> {
    /// Wrap a buffer that already passed [`validate`].
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert_eq!(data.len(), DIFOP_PACKET_SIZE);
        Self { data }
    }

    /// Motor rotation speed in rpm.
    #[inline]
    pub fn rpm(&self) -> u16 {
        u16::from_be_bytes([self.data[DIFOP_RPM_OFFSET], self.data[DIFOP_RPM_OFFSET + 1]])
    }

    /// Raw return (echo) mode byte.
    #[inline]
    pub fn return_mode(&self) -> u8 {
        self.data[DIFOP_RETURN_MODE_OFFSET]
    }

    /// Vertical calibration table: 32 signed-magnitude triples.
    #[inline]
    pub fn vert_cali(&self) -> &'a [u8] {
        &self.data[DIFOP_VERT_CALI_OFFSET..DIFOP_VERT_CALI_OFFSET + CALI_TABLE_SIZE]
    }

    /// Horizontal calibration table: 32 signed-magnitude triples.
    #[inline]
    pub fn horiz_cali(&self) -> &'a [u8] {
        &self.data[DIFOP_HORIZ_CALI_OFFSET..DIFOP_HORIZ_CALI_OFFSET + CALI_TABLE_SIZE]
    }
}

/// Days from the Unix epoch for a proleptic Gregorian civil date.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let yoe = year - era * 400;
    let moy = if month > 2 { month - 3 } else { month + 9 } as i64;
    let doy = (153 * moy + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
