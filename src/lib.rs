//! Ramp (triangle) generator for Microchip MCP49xx DACs, synchronised to an external trigger such as a camera exposure pulse.
//!
//! The trigger interrupt arms a [`TriggerFlag`]. The main loop hands that flag to a [`WaveformController`], which sweeps the DAC
//! through its full range via the [`Mcp49xx`] driver. Everything hardware-facing goes through embedded-hal traits so the same
//! code runs on the MSP430 and in host tests.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod dac;
pub mod serial;
pub mod spi;
pub mod timing;
pub mod trigger;
pub mod waveform;

pub use config::RampConfig;
pub use dac::{AnalogOutput, DacChannel, DacConfiguration, DacError, DacModel, GainMode, Mcp49xx, NoLatchPin};
pub use trigger::TriggerFlag;
pub use waveform::{ControllerState, Direction, RampSettings, SweepPolicy, SweepReport, WaveformController};
