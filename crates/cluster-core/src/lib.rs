//! Hardware-independent sensing and control core for the instrument cluster
//!
//! This crate holds all platform-agnostic logic of the cluster: analog sensor
//! calibration and averaging, gauge smoothing, ambient-light brightness
//! control, supply-voltage guards, the G-force driven racing mode and the
//! low oil pressure warning. Hardware is reached only through the traits in
//! [`sensors`], and every time-dependent operation takes an explicit
//! [`embassy_time::Instant`].
//!
//! It is `no_std` and does not allocate, so it compiles on both the embedded
//! target and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod ambient;
pub mod app_state;
pub mod brightness;
pub mod calibration;
pub mod config;
pub mod gauges;
pub mod metrics;
pub mod motion;
pub mod power;
pub mod racing;
pub mod sampling;
pub mod sensors;
pub mod storage;
pub mod timing;
pub mod warning;
