// This file interacts with a Microchip MCP49xx Digital to Analog Converter (DAC).
// Supported parts: MCP4901/4911/4921 (single channel) and MCP4902/4912/4922 (dual channel), 8/10/12 bits.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::OutputPin;
use ufmt::{uDisplay, uWrite, Formatter};
use void::Void;

use crate::spi::{DacSpi, IdleLow, SampleFirstEdge};

const FRAME_LENGTH_BITS: u8 = 16;
// Data is left-justified so its MSB always lands on this bit.
const DATA_TOP_BIT: u8 = 12;

const CHANNEL_BIT: u16 = 1 << 15;
const BUFFER_BIT: u16 = 1 << 14;
const GAIN_1X_BIT: u16 = 1 << 13; // 0 selects 2x
const ACTIVE_BIT: u16 = 1 << 12;

// Minimum LDAC low time from the MCP49xx datasheet.
const LATCH_PULSE_MIN_NS: u32 = 100;
// Smallest delay we can request that is still at least LATCH_PULSE_MIN_NS.
const LATCH_PULSE_US: u32 = (LATCH_PULSE_MIN_NS + 999) / 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacError {
    InvalidModel,
    InvalidResolution,
    InvalidGain,
}
impl uDisplay for DacError {
    fn fmt<W: uWrite + ?Sized>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error> {
        match self {
            DacError::InvalidModel => f.write_str("unsupported DAC model"),
            DacError::InvalidResolution => f.write_str("DAC resolution must be 8, 10 or 12 bits"),
            DacError::InvalidGain => f.write_str("DAC gain must be 1x or 2x"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacChannel {
    A = 0,
    B = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DacModel {
    Mcp4901 = 1,
    Mcp4911 = 2,
    Mcp4921 = 3,
    Mcp4902 = 4,
    Mcp4912 = 5,
    Mcp4922 = 6,
}
impl DacModel {
    pub fn resolution_bits(self) -> u8 {
        match self {
            DacModel::Mcp4901 | DacModel::Mcp4902 => 8,
            DacModel::Mcp4911 | DacModel::Mcp4912 => 10,
            DacModel::Mcp4921 | DacModel::Mcp4922 => 12,
        }
    }
}
impl TryFrom<u8> for DacModel {
    type Error = DacError;
    fn try_from(id: u8) -> Result<Self, DacError> {
        match id {
            1 => Ok(DacModel::Mcp4901),
            2 => Ok(DacModel::Mcp4911),
            3 => Ok(DacModel::Mcp4921),
            4 => Ok(DacModel::Mcp4902),
            5 => Ok(DacModel::Mcp4912),
            6 => Ok(DacModel::Mcp4922),
            _ => Err(DacError::InvalidModel),
        }
    }
}

// vout = code / 2^n * gain * VREF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainMode {
    X1,
    X2,
}
impl TryFrom<u8> for GainMode {
    type Error = DacError;
    fn try_from(gain: u8) -> Result<Self, DacError> {
        match gain {
            1 => Ok(GainMode::X1),
            2 => Ok(GainMode::X2),
            _ => Err(DacError::InvalidGain),
        }
    }
}

/// Fixed for the lifetime of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacConfiguration {
    resolution_bits: u8,
    pub buffer_input: bool,
    pub gain: GainMode,
    /// Whether `write_both` pulses LDAC after the second channel.
    pub auto_latch_dual: bool,
}
impl DacConfiguration {
    /// Look up the resolution for a raw model identifier (1..=6, MCP4901 through MCP4922).
    pub fn configure(model_id: u8, gain: GainMode, buffer_input: bool) -> Result<Self, DacError> {
        let model = DacModel::try_from(model_id)?;
        Ok(Self::for_model(model, gain, buffer_input))
    }
    pub fn for_model(model: DacModel, gain: GainMode, buffer_input: bool) -> Self {
        DacConfiguration { resolution_bits: model.resolution_bits(), buffer_input, gain, auto_latch_dual: true }
    }
    pub fn with_resolution(resolution_bits: u8, gain: GainMode, buffer_input: bool) -> Result<Self, DacError> {
        match resolution_bits {
            8 | 10 | 12 => Ok(DacConfiguration { resolution_bits, buffer_input, gain, auto_latch_dual: true }),
            _ => Err(DacError::InvalidResolution),
        }
    }
    pub fn auto_latch_dual(mut self, enabled: bool) -> Self {
        self.auto_latch_dual = enabled;
        self
    }
    pub fn resolution_bits(&self) -> u8 {
        self.resolution_bits
    }
    pub fn max_value(&self) -> u16 {
        (1_u16 << self.resolution_bits) - 1
    }

    // Buffer and gain bits, shared by data and shutdown frames.
    fn config_bits(&self) -> u16 {
        let mut bits = 0;
        if self.buffer_input {
            bits |= BUFFER_BIT;
        }
        if self.gain == GainMode::X1 {
            bits |= GAIN_1X_BIT;
        }
        bits
    }
    /// Control frame that sets `channel` to `value`. Bits above the resolution are discarded.
    pub fn frame(&self, channel: DacChannel, value: u16) -> u16 {
        let data = value & self.max_value();
        ((channel as u16) * CHANNEL_BIT)
            | self.config_bits()
            | ACTIVE_BIT
            | (data << (DATA_TOP_BIT - self.resolution_bits))
    }
    /// Control frame with the active bit cleared. Buffer and gain are kept so waking up restores the same output range.
    pub fn shutdown_frame(&self) -> u16 {
        self.config_bits()
    }
}

/// Placeholder for boards where LDAC is tied to ground and every write commits immediately.
pub struct NoLatchPin;
impl OutputPin for NoLatchPin {
    type Error = Void;
    fn set_low(&mut self) -> Result<(), Void> { Ok(()) }
    fn set_high(&mut self) -> Result<(), Void> { Ok(()) }
}

/// Anything the ramp can be driven into.
pub trait AnalogOutput {
    fn resolution_bits(&self) -> u8;
    fn write(&mut self, channel: DacChannel, value: u16);
    fn latch(&mut self);
    /// False when the device commits on every write.
    fn has_latch(&self) -> bool;
}

pub struct Mcp49xx<SPI, CS, LDAC, DELAY> {
    spi: SPI,
    cs_pin: CS,
    ldac_pin: Option<LDAC>,
    delay: DELAY,
    config: DacConfiguration,
}
impl<SPI, CS, DELAY> Mcp49xx<SPI, CS, NoLatchPin, DELAY>
where SPI: DacSpi<IdleLow, SampleFirstEdge>, CS: OutputPin, DELAY: DelayUs<u32> {
    /// Driver for a DAC whose LDAC pin is grounded.
    pub fn new_unlatched(spi: SPI, cs_pin: CS, delay: DELAY, config: DacConfiguration) -> Self {
        Self::new(spi, cs_pin, None, delay, config)
    }
}
impl<SPI, CS, LDAC, DELAY> Mcp49xx<SPI, CS, LDAC, DELAY>
where SPI: DacSpi<IdleLow, SampleFirstEdge>, CS: OutputPin, LDAC: OutputPin, DELAY: DelayUs<u32> {
    pub fn new(spi: SPI, mut cs_pin: CS, mut ldac_pin: Option<LDAC>, delay: DELAY, config: DacConfiguration) -> Self {
        cs_pin.set_high().ok();
        // un-latch the output
        if let Some(ldac) = ldac_pin.as_mut() {
            ldac.set_high().ok();
        }
        Mcp49xx { spi, cs_pin, ldac_pin, delay, config }
    }
    pub fn config(&self) -> &DacConfiguration {
        &self.config
    }
    pub fn max_value(&self) -> u16 {
        self.config.max_value()
    }
    pub fn write(&mut self, channel: DacChannel, value: u16) {
        let frame = self.config.frame(channel, value);
        self.spi.send(FRAME_LENGTH_BITS, frame as u32, &mut self.cs_pin);
    }
    /// Both channels must hold their new data before LDAC commits either of them.
    pub fn write_both(&mut self, value_a: u16, value_b: u16) {
        self.write(DacChannel::A, value_a);
        self.write(DacChannel::B, value_b);
        if self.config.auto_latch_dual {
            self.latch();
        }
    }
    pub fn latch(&mut self) {
        let Some(ldac) = self.ldac_pin.as_mut() else { return };
        ldac.set_low().ok();
        self.delay.delay_us(LATCH_PULSE_US);
        ldac.set_high().ok();
    }
    pub fn shutdown(&mut self) {
        let frame = self.config.shutdown_frame();
        self.spi.send(FRAME_LENGTH_BITS, frame as u32, &mut self.cs_pin);
    }
    pub fn release(self) -> (SPI, CS, Option<LDAC>, DELAY) {
        (self.spi, self.cs_pin, self.ldac_pin, self.delay)
    }
}
impl<SPI, CS, LDAC, DELAY> AnalogOutput for Mcp49xx<SPI, CS, LDAC, DELAY>
where SPI: DacSpi<IdleLow, SampleFirstEdge>, CS: OutputPin, LDAC: OutputPin, DELAY: DelayUs<u32> {
    fn resolution_bits(&self) -> u8 {
        self.config.resolution_bits()
    }
    fn write(&mut self, channel: DacChannel, value: u16) {
        Mcp49xx::write(self, channel, value)
    }
    fn latch(&mut self) {
        Mcp49xx::latch(self)
    }
    fn has_latch(&self) -> bool {
        self.ldac_pin.is_some()
    }
}
