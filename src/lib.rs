// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! RoboSense RS32 LiDAR packet decoder.
//!
//! Converts the fixed-layout binary packets of the 32-channel scanning
//! rangefinder into calibrated 3-D point measurements. The transport layer
//! (UDP sockets, pcap replay, file readers) is out of scope: the caller
//! frames complete packets and feeds them to the decoder kind-tagged.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  DIFOP   ┌──────────────────┐
//! │  reception    │ ───────► │ calibration,     │
//! │  layer        │          │ echo mode, rate  │
//! │  (caller)     │  MSOP    ├──────────────────┤     ┌──────────────┐
//! │               │ ───────► │ interpolate →    │ ──► │  PointCloud  │
//! └───────────────┘          │ project → filter │     │ (caller-owned)│
//!                            └──────────────────┘     └──────────────┘
//! ```
//!
//! Data flows strictly downward: DIFOP packets update the decoder's shared
//! state, MSOP decoding reads it. Non-fatal conditions (malformed packets,
//! degraded calibration) are delivered through an error callback so the
//! caller keeps streaming.
//!
//! # Modules
//!
//! - [`decoder`]: the [`Rs32Decoder`] orchestrator and its configuration
//! - [`packet`]: fixed binary layouts and packet validation
//! - [`calib`]: per-channel angle calibration (DIFOP or file sourced)
//! - [`filter`]: distance and field-of-view gating
//! - [`trig`]: shared sine/cosine lookup tables at 0.01 degree resolution
//! - [`lidar`]: point cloud container, error taxonomy, host clock
//!
//! # Example
//!
//! ```ignore
//! use rs32_driver::{DecoderConfig, PointCloud, Rs32Decoder};
//!
//! let mut decoder = Rs32Decoder::new(DecoderConfig::default());
//! let mut cloud = PointCloud::with_capacity(rs32_driver::POINTS_PER_PACKET);
//!
//! loop {
//!     let (kind, packet) = receive_packet()?;
//!     match kind {
//!         PacketKind::Difop => decoder.process_difop(&packet),
//!         PacketKind::Msop => {
//!             if let Some(azimuth) = decoder.process_msop(&packet, &mut cloud) {
//!                 // azimuth marks the packet's leading angle; use it for
//!                 // frame-boundary detection, then consume the points
//!             }
//!         }
//!     }
//! }
//! ```

pub mod calib;
pub mod decoder;
pub mod filter;
pub mod lidar;
pub mod packet;
pub mod trig;

// Re-exports for convenience
pub use calib::{CalibrationPolicy, CalibrationStore};
pub use decoder::{DecoderConfig, EchoMode, Rs32Decoder, POINTS_PER_PACKET};
pub use filter::RangeAngleFilter;
pub use lidar::{Error, ErrorCallback, PointCloud};
pub use packet::PacketKind;
