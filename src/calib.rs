// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-channel angle calibration.
//!
//! Each laser channel carries a vertical (elevation) and horizontal
//! (azimuth) correction compensating for manufacturing tolerance. The
//! corrections come from either the DIFOP factory tables or an external
//! plain-text file, and are stored in hundredths of a degree for direct use
//! with the trig lookup tables.

use crate::lidar::Error;
use crate::packet::CHANNELS_PER_BLOCK;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Freshness policy for calibration arriving in DIFOP packets.
///
/// `LoadOnce` freezes the table after the first successful load from any
/// source, so a glitchy later packet cannot corrupt a good calibration.
/// `AlwaysRefresh` overwrites on every DIFOP receipt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CalibrationPolicy {
    /// Freeze after the first successful load (default)
    #[default]
    LoadOnce,
    /// Overwrite on every device-info packet
    AlwaysRefresh,
}

/// Outcome of a DIFOP calibration ingest.
#[derive(Debug, PartialEq, Eq)]
pub enum DifopLoad {
    /// Store already loaded and policy is [`CalibrationPolicy::LoadOnce`]
    Frozen,
    /// Table is factory-blank (all 0x00/0xFF), nothing loaded
    FactoryBlank,
    /// Table decoded; lists channels whose sign byte was ambiguous
    Loaded { ambiguous: Vec<usize> },
}

/// Per-channel vertical/horizontal angle corrections.
///
/// Owned by a decoder instance; mutated only by DIFOP processing or an
/// explicit file load, read on every MSOP decode.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    /// Vertical corrections in hundredths of a degree
    vert: [i32; CHANNELS_PER_BLOCK],
    /// Horizontal corrections in hundredths of a degree
    horiz: [i32; CHANNELS_PER_BLOCK],
    loaded: bool,
    policy: CalibrationPolicy,
}

impl CalibrationStore {
    /// Create an empty store (all corrections zero, not loaded).
    pub fn new(policy: CalibrationPolicy) -> Self {
        Self {
            vert: [0; CHANNELS_PER_BLOCK],
            horiz: [0; CHANNELS_PER_BLOCK],
            loaded: false,
            policy,
        }
    }

    /// Whether a calibration has been successfully loaded from any source.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Clear the loaded latch so the next DIFOP packet repopulates the
    /// table even under [`CalibrationPolicy::LoadOnce`].
    pub fn reset(&mut self) {
        self.loaded = false;
    }

    /// Vertical correction for a channel, hundredths of a degree.
    #[inline]
    pub fn vert_adjust(&self, channel: usize) -> i32 {
        self.vert[channel]
    }

    /// Apply the horizontal correction to a fractional azimuth, hundredths
    /// of a degree, truncating only after the correction. The result is
    /// not range-reduced.
    #[inline]
    pub fn horiz_adjust(&self, channel: usize, azimuth: f32) -> i32 {
        (azimuth + self.horiz[channel] as f32) as i32
    }

    /// Ingest the raw DIFOP calibration tables.
    ///
    /// Each table holds one 3-byte signed-magnitude triple per channel:
    /// byte 0 is the sign flag (0 positive, 1 negative), bytes 1-2 combine
    /// big-endian as tenths of a degree. A sign byte outside {0, 1} is
    /// treated as positive and the channel is listed in the result.
    pub fn load_from_difop(&mut self, vert_raw: &[u8], horiz_raw: &[u8]) -> DifopLoad {
        if self.loaded && self.policy == CalibrationPolicy::LoadOnce {
            return DifopLoad::Frozen;
        }

        // A table the factory never wrote reads as all 0x00 or 0xFF.
        if vert_raw[..3]
            .iter()
            .all(|&b| b == 0x00 || b == 0xFF)
        {
            return DifopLoad::FactoryBlank;
        }

        let mut ambiguous = Vec::new();
        for ch in 0..CHANNELS_PER_BLOCK {
            let (vert, vert_ambiguous) = decode_triple(&vert_raw[ch * 3..ch * 3 + 3]);
            let (horiz, horiz_ambiguous) = decode_triple(&horiz_raw[ch * 3..ch * 3 + 3]);
            self.vert[ch] = vert;
            self.horiz[ch] = horiz;
            if vert_ambiguous || horiz_ambiguous {
                ambiguous.push(ch);
            }
        }
        self.loaded = true;
        DifopLoad::Loaded { ambiguous }
    }

    /// Load calibration from a plain-text table.
    ///
    /// One line per channel, `<vertical_degrees>,<horizontal_degrees>`,
    /// assigned top-to-bottom to channels `0..32`. Blank lines are
    /// skipped. A short file populates fewer channels; a non-numeric field
    /// aborts the load leaving the existing calibration untouched. Returns
    /// the number of channels populated.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, Error> {
        let reader = BufReader::new(File::open(path)?);
        let mut rows: Vec<(i32, i32)> = Vec::with_capacity(CHANNELS_PER_BLOCK);

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let vert = parse_degrees(fields.next())?;
            let horiz = parse_degrees(fields.next())?;
            rows.push((vert, horiz));
            if rows.len() >= CHANNELS_PER_BLOCK {
                break;
            }
        }

        // Commit only after the whole file parsed cleanly.
        for (ch, (vert, horiz)) in rows.iter().enumerate() {
            self.vert[ch] = *vert;
            self.horiz[ch] = *horiz;
        }
        if !rows.is_empty() {
            self.loaded = true;
        }
        Ok(rows.len())
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(CalibrationPolicy::default())
    }
}

/// Decode one signed-magnitude angle triple to hundredths of a degree.
///
/// Returns the decoded value and whether the sign byte was ambiguous.
fn decode_triple(triple: &[u8]) -> (i32, bool) {
    let value = triple[1] as i32 * 256 + triple[2] as i32;
    match triple[0] {
        0 => (value * 10, false),
        1 => (-value * 10, false),
        _ => (value * 10, true),
    }
}

/// Parse one CSV field as degrees, returning hundredths of a degree.
fn parse_degrees(field: Option<&str>) -> Result<i32, Error> {
    let text = field.ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "missing angle field",
        ))
    })?;
    let degrees: f32 = text.trim().parse().map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("non-numeric angle field: {:?}", text),
        ))
    })?;
    Ok((degrees * 100.0).round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Encode an angle in degrees into the DIFOP signed-magnitude triple.
    fn encode_triple(degrees: f32) -> [u8; 3] {
        let tenths = (degrees.abs() * 10.0).round() as u16;
        let sign = if degrees < 0.0 { 1 } else { 0 };
        [sign, (tenths / 256) as u8, (tenths % 256) as u8]
    }

    fn tables_from(angles: &[f32]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(96);
        for ch in 0..CHANNELS_PER_BLOCK {
            let deg = angles.get(ch).copied().unwrap_or(0.5);
            raw.extend_from_slice(&encode_triple(deg));
        }
        raw
    }

    #[test]
    fn test_decode_triple_negative() {
        // sign byte 1, mid 10, msb 0 -> -(10*256 + 0) * 0.1 = -256.0 degrees
        let (value, ambiguous) = decode_triple(&[1, 10, 0]);
        assert_eq!(value, -25600);
        assert!(!ambiguous);
    }

    #[test]
    fn test_decode_triple_ambiguous_sign() {
        let (value, ambiguous) = decode_triple(&[7, 0, 50]);
        assert_eq!(value, 500);
        assert!(ambiguous);
    }

    #[test]
    fn test_difop_round_trip() {
        let vert_angles: Vec<f32> = (0..32).map(|i| -15.0 + i as f32 * 1.1).collect();
        let horiz_angles: Vec<f32> = (0..32).map(|i| -3.2 + i as f32 * 0.2).collect();
        let vert_raw = tables_from(&vert_angles);
        let horiz_raw = tables_from(&horiz_angles);

        let mut store = CalibrationStore::default();
        let result = store.load_from_difop(&vert_raw, &horiz_raw);
        assert_eq!(result, DifopLoad::Loaded { ambiguous: vec![] });
        assert!(store.is_loaded());

        for ch in 0..CHANNELS_PER_BLOCK {
            // 0.1 degree encoding resolution = 10 hundredths
            let vert_deg = store.vert_adjust(ch) as f32 / 100.0;
            assert!(
                (vert_deg - vert_angles[ch]).abs() <= 0.1,
                "channel {}: {} vs {}",
                ch,
                vert_deg,
                vert_angles[ch]
            );
            let horiz_deg = (store.horiz_adjust(ch, 0.0)) as f32 / 100.0;
            assert!((horiz_deg - horiz_angles[ch]).abs() <= 0.1);
        }
    }

    #[test]
    fn test_load_once_freezes() {
        let first = tables_from(&[1.0]);
        let second = tables_from(&[9.0]);
        let horiz = tables_from(&[0.0]);

        let mut store = CalibrationStore::new(CalibrationPolicy::LoadOnce);
        assert!(matches!(
            store.load_from_difop(&first, &horiz),
            DifopLoad::Loaded { .. }
        ));
        assert_eq!(store.vert_adjust(0), 100);

        assert_eq!(store.load_from_difop(&second, &horiz), DifopLoad::Frozen);
        assert_eq!(store.vert_adjust(0), 100);

        store.reset();
        assert!(matches!(
            store.load_from_difop(&second, &horiz),
            DifopLoad::Loaded { .. }
        ));
        assert_eq!(store.vert_adjust(0), 900);
    }

    #[test]
    fn test_always_refresh() {
        let first = tables_from(&[1.0]);
        let second = tables_from(&[9.0]);
        let horiz = tables_from(&[0.0]);

        let mut store = CalibrationStore::new(CalibrationPolicy::AlwaysRefresh);
        store.load_from_difop(&first, &horiz);
        store.load_from_difop(&second, &horiz);
        assert_eq!(store.vert_adjust(0), 900);
    }

    #[test]
    fn test_factory_blank_ignored() {
        let blank = vec![0xFFu8; 96];
        let horiz = tables_from(&[0.0]);
        let mut store = CalibrationStore::default();
        assert_eq!(store.load_from_difop(&blank, &horiz), DifopLoad::FactoryBlank);
        assert!(!store.is_loaded());
        assert_eq!(store.vert_adjust(0), 0);
    }

    #[test]
    fn test_ambiguous_channels_reported() {
        let mut vert = tables_from(&[1.0]);
        vert[3 * 4] = 0xAB; // channel 4 sign byte
        let horiz = tables_from(&[0.0]);
        let mut store = CalibrationStore::default();
        match store.load_from_difop(&vert, &horiz) {
            DifopLoad::Loaded { ambiguous } => assert_eq!(ambiguous, vec![4]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_horiz_adjust_truncates_after_correction() {
        let vert = tables_from(&[0.5]);
        let horiz = tables_from(&[-0.1]);
        let mut store = CalibrationStore::default();
        store.load_from_difop(&vert, &horiz);

        // -0.1 degrees = -10 hundredths; the azimuth keeps its fraction
        // through the correction, so 1.2 - 10 = -8.8 truncates to -8
        // rather than 1 - 10 = -9
        assert_eq!(store.horiz_adjust(0, 1.2), -8);
        assert_eq!(store.horiz_adjust(0, 0.0), -10);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("rs32_angle_test.csv");
        let mut file = File::create(&path).unwrap();
        for ch in 0..32 {
            writeln!(file, "{},{}", -10.0 + ch as f32, 0.25 * ch as f32).unwrap();
        }
        drop(file);

        let mut store = CalibrationStore::default();
        assert_eq!(store.load_from_file(&path).unwrap(), 32);
        assert!(store.is_loaded());
        assert_eq!(store.vert_adjust(0), -1000);
        assert_eq!(store.vert_adjust(31), 2100);
        assert_eq!(store.horiz_adjust(4, 0.0), 100);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_short_file_populates_fewer_channels() {
        let path = std::env::temp_dir().join("rs32_angle_short_test.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "1.5,-0.5").unwrap();
        writeln!(file, "2.5,0.5").unwrap();
        drop(file);

        let mut store = CalibrationStore::default();
        assert_eq!(store.load_from_file(&path).unwrap(), 2);
        assert_eq!(store.vert_adjust(0), 150);
        assert_eq!(store.vert_adjust(1), 250);
        assert_eq!(store.vert_adjust(2), 0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_blank_lines_in_file_skipped() {
        let path = std::env::temp_dir().join("rs32_angle_blank_test.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "1.5,-0.5").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "2.5,0.5").unwrap();
        writeln!(file).unwrap();
        drop(file);

        // blank lines (including a trailing newline) separate, never
        // terminate: both data rows land on consecutive channels
        let mut store = CalibrationStore::default();
        assert_eq!(store.load_from_file(&path).unwrap(), 2);
        assert_eq!(store.vert_adjust(0), 150);
        assert_eq!(store.vert_adjust(1), 250);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_bad_file_leaves_calibration_untouched() {
        let path = std::env::temp_dir().join("rs32_angle_bad_test.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "1.5,-0.5").unwrap();
        writeln!(file, "oops,0.5").unwrap();
        drop(file);

        let mut store = CalibrationStore::default();
        assert!(store.load_from_file(&path).is_err());
        assert!(!store.is_loaded());
        assert_eq!(store.vert_adjust(0), 0);

        let missing = std::env::temp_dir().join("rs32_angle_missing_test.csv");
        assert!(store.load_from_file(&missing).is_err());

        std::fs::remove_file(&path).ok();
    }
}
