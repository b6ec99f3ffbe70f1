// Serial bus used to talk to the DAC. Implemented either by bitbanging GPIOs or by wrapping an embedded-hal SPI peripheral.

use core::marker::PhantomData;

use embedded_hal::blocking::spi::Write;
use embedded_hal::digital::v2::{OutputPin, ToggleableOutputPin};

use crate::timing::spin;

// Trait because we can implement by either bitbanging or using peripheral
pub trait DacSpi<Polarity: SckPolarity, Phase: SckPhase>{
    /// Send the lowest `len` bits of `data`, most significant bit first, with `cs_pin` held low for the whole transfer.
    /// `len` above 32 sends all 32 bits of `data`.
    fn send(&mut self, len: u8, data: u32, cs_pin: &mut impl OutputPin);
}

// The MCP49xx only speaks mode 0 (SCK idles low, data sampled on the rising edge).
// Encode this in types so the driver can refuse a bus that hasn't been configured for it.
pub trait SckPolarity{}
pub struct IdleLow; impl SckPolarity for IdleLow{}
pub struct NoPolaritySet;

pub trait SckPhase{}
pub struct SampleFirstEdge; impl SckPhase for SampleFirstEdge{}
pub struct NoPhaseSet;

// Each spin is a nop plus loop overhead, about eight cycles on the MSP430.
pub const DEFAULT_HALF_PERIOD_SPINS: u16 = 2;

// Constructor for BitBangSpi
// Ex: BitBangSpiConfig::new(mosi, sck).sck_idle_low().sample_on_first_edge().create()
pub struct BitBangSpiConfig<MOSI, SCK, Polarity, Phase>{
    mosi:   MOSI,
    sck:    SCK,
    half_period_spins: u16,
    _polarity:  PhantomData<Polarity>,
    _phase:     PhantomData<Phase>,
}
impl<MOSI: OutputPin, SCK: OutputPin + ToggleableOutputPin> BitBangSpiConfig<MOSI, SCK, NoPolaritySet, NoPhaseSet>{
    pub fn new(mosi: MOSI, sck: SCK) -> Self {
        BitBangSpiConfig{mosi, sck, half_period_spins: DEFAULT_HALF_PERIOD_SPINS, _polarity: PhantomData, _phase: PhantomData}
    }
}
// Settings that may be changed regardless of typestate
impl<MOSI, SCK, Polarity, Phase> BitBangSpiConfig<MOSI, SCK, Polarity, Phase>{
    /// Number of spin iterations to wait after each clock edge.
    pub fn half_period_spins(mut self, spins: u16) -> Self {
        self.half_period_spins = spins;
        self
    }
}
// May be called when polarity has not been set. Phase can have any value (set, not set, etc.)
impl<MOSI, SCK: OutputPin, Phase> BitBangSpiConfig<MOSI, SCK, NoPolaritySet, Phase>{
    pub fn sck_idle_low(mut self) -> BitBangSpiConfig<MOSI, SCK, IdleLow, Phase> {
        self.sck.set_low().ok();
        BitBangSpiConfig{mosi: self.mosi, sck: self.sck, half_period_spins: self.half_period_spins, _polarity: PhantomData, _phase: PhantomData}
    }
}
// May be called when phase has not been set. Polarity can have any value (set, not set, etc.)
impl<MOSI, SCK, Polarity> BitBangSpiConfig<MOSI, SCK, Polarity, NoPhaseSet>{
    pub fn sample_on_first_edge(self) -> BitBangSpiConfig<MOSI, SCK, Polarity, SampleFirstEdge> {
        BitBangSpiConfig{mosi: self.mosi, sck: self.sck, half_period_spins: self.half_period_spins, _polarity: PhantomData, _phase: PhantomData}
    }
}
// Can only be called when both phase and polarity have been set.
impl<MOSI, SCK, Polarity: SckPolarity, Phase: SckPhase> BitBangSpiConfig<MOSI, SCK, Polarity, Phase>{
    pub fn create(self) -> BitBangSpi<MOSI, SCK, Polarity, Phase> {
        BitBangSpi{mosi: self.mosi, sck: self.sck, half_period_spins: self.half_period_spins, _polarity: PhantomData, _phase: PhantomData}
    }
}

pub struct BitBangSpi<MOSI, SCK, Polarity: SckPolarity, Phase: SckPhase>{
    mosi:   MOSI,
    sck:    SCK,
    half_period_spins: u16,
    _polarity:  PhantomData<Polarity>,
    _phase:     PhantomData<Phase>,
}

impl<MOSI: OutputPin, SCK: ToggleableOutputPin> BitBangSpi<MOSI, SCK, IdleLow, SampleFirstEdge>{
    pub fn return_pins(self) -> (MOSI, SCK) {
        (self.mosi, self.sck)
    }
}
// Rising edge samples, so each bit must be on MOSI before the first toggle.
impl<MOSI: OutputPin, SCK: ToggleableOutputPin> DacSpi<IdleLow, SampleFirstEdge> for BitBangSpi<MOSI, SCK, IdleLow, SampleFirstEdge> {
    fn send(&mut self, len: u8, data: u32, cs_pin: &mut impl OutputPin) {
        let len = len.min(32);
        let mut current_pos: u8 = 0;
        cs_pin.set_low().ok();
        while current_pos < len {
            if (data & (1_u32 << (len - current_pos - 1_u8))) > 0 {
                self.mosi.set_high().ok();
            }
            else{
                self.mosi.set_low().ok();
            }
            self.sck.toggle().ok();
            spin(self.half_period_spins as u32); // duty cycle correction
            self.sck.toggle().ok();
            spin(self.half_period_spins as u32);
            current_pos += 1;
        }
        cs_pin.set_high().ok();
    }
}

/// DAC bus backed by an embedded-hal SPI peripheral.
///
/// The peripheral must already be configured to match `Polarity` and `Phase`; the wrapper only records it in the type.
pub struct PeripheralSpi<SPI, Polarity: SckPolarity, Phase: SckPhase>{
    bus: SPI,
    _polarity:  PhantomData<Polarity>,
    _phase:     PhantomData<Phase>,
}
impl<SPI: Write<u8>, Polarity: SckPolarity, Phase: SckPhase> PeripheralSpi<SPI, Polarity, Phase>{
    pub fn new(bus: SPI) -> Self {
        PeripheralSpi{bus, _polarity: PhantomData, _phase: PhantomData}
    }
    pub fn return_bus(self) -> SPI {
        self.bus
    }
}
impl<SPI: Write<u8>, Polarity: SckPolarity, Phase: SckPhase> DacSpi<Polarity, Phase> for PeripheralSpi<SPI, Polarity, Phase> {
    fn send(&mut self, len: u8, data: u32, cs_pin: &mut impl OutputPin) {
        // Round up to whole bytes, MSB first. Leading pad bits are zero.
        let num_bytes = (((len as usize) + 7) / 8).min(4);
        let bytes = data.to_be_bytes();
        cs_pin.set_low().ok();
        self.bus.write(&bytes[4 - num_bytes..]).ok(); // no acknowledgment exists on this bus
        cs_pin.set_high().ok();
    }
}
