#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

// Shared logic for the GNSS positioning controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. The fix provider and the clock are traits so the same
// acquisition loop drives the modem on hardware and the simulator on the host.

pub mod acquisition;
pub mod config;
pub mod fix;
pub mod mailbox;
pub mod report;
pub mod scheduler;
pub mod telemetry;
