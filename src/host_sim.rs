use std::io::Write as _;
use std::thread;
use std::time::Duration;

use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use embedded_hal::serial;
use ufmt::uwriteln;
use void::Void;

use trigger_ramp_dac::serial::SerialWriter;
use trigger_ramp_dac::spi::{IdleLow, PeripheralSpi, SampleFirstEdge};
use trigger_ramp_dac::timing::SpinDelay;
use trigger_ramp_dac::{Mcp49xx, RampConfig, TriggerFlag, WaveformController};

const CAMERA_PULSES: u32 = 3;
const CAMERA_PERIOD: Duration = Duration::from_millis(20);

static TRIGGER: TriggerFlag = TriggerFlag::new();

struct StdoutTx;
impl serial::Write<u8> for StdoutTx {
    type Error = Void;
    fn write(&mut self, word: u8) -> nb::Result<(), Void> {
        std::io::stdout().write_all(&[word]).ok();
        Ok(())
    }
    fn flush(&mut self) -> nb::Result<(), Void> {
        std::io::stdout().flush().ok();
        Ok(())
    }
}

// Stands in for the DAC's SPI bus. Keeps a count rather than the whole ramp.
#[derive(Default)]
struct CountingBus {
    bytes: u32,
}
impl spi::Write<u8> for CountingBus {
    type Error = Void;
    fn write(&mut self, words: &[u8]) -> Result<(), Void> {
        self.bytes += words.len() as u32;
        Ok(())
    }
}

struct SimPin;
impl OutputPin for SimPin {
    type Error = Void;
    fn set_low(&mut self) -> Result<(), Void> { Ok(()) }
    fn set_high(&mut self) -> Result<(), Void> { Ok(()) }
}

pub fn run() {
    let mut out = SerialWriter::new(StdoutTx);
    let config = RampConfig::DEFAULT;
    let dac_config = match config.dac_configuration() {
        Ok(dac_config) => dac_config,
        Err(err) => {
            uwriteln!(out, "config error: {}", err).ok();
            return;
        }
    };

    let bus: PeripheralSpi<CountingBus, IdleLow, SampleFirstEdge> = PeripheralSpi::new(CountingBus::default());
    let dac = Mcp49xx::new(bus, SimPin, Some(SimPin), SpinDelay::new(0), dac_config);
    let mut ramp = WaveformController::new(dac, SpinDelay::new(0), config.ramp_settings());
    ramp.start();
    uwriteln!(out, "{} us of waits per sweep", config.sweep_wait_us(dac_config.resolution_bits())).ok();

    let camera = thread::spawn(|| {
        for _ in 0..CAMERA_PULSES {
            thread::sleep(CAMERA_PERIOD);
            TRIGGER.arm();
        }
    });

    let mut sweeps = 0_u32;
    loop {
        if let Some(report) = ramp.poll(&TRIGGER) {
            sweeps += 1;
            uwriteln!(out, "{}", report).ok();
        }
        if camera.is_finished() && !TRIGGER.is_armed() {
            break;
        }
        thread::yield_now();
    }

    let (dac, _delay) = ramp.release();
    let (bus, _cs, _ldac, _delay) = dac.release();
    let frames = bus.return_bus().bytes / 2;
    uwriteln!(out, "{} pulses, {} sweeps, {} frames sent, {} edges merged",
        CAMERA_PULSES, sweeps, frames, TRIGGER.take_coalesced()).ok();
}
