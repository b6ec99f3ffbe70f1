use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::v2::OutputPin;
use msp430_rt::entry;
use msp430fr2355::{interrupt, P2, P4, P6, PMM};
use msp430fr2x5x_hal::{
    clock::{ClockConfig, DcoclkFreqSel, MclkDiv, SmclkDiv},
    fram::Fram,
    gpio::{Batch, PxIV},
    pmm::Pmm,
    serial::{BitCount, BitOrder, Loopback, Parity, SerialConfig, StopBits},
    watchdog::Wdt,
};

#[cfg(debug_assertions)]
use panic_msp430 as _;

#[cfg(not(debug_assertions))]
use panic_never as _;

use trigger_ramp_dac::dbg_uwriteln;
use trigger_ramp_dac::serial::SerialWriter;
use trigger_ramp_dac::spi::BitBangSpiConfig;
use trigger_ramp_dac::timing::SpinDelay;
use trigger_ramp_dac::{Mcp49xx, RampConfig, TriggerFlag, WaveformController};

use crate::board_mapping::{pin_name_types::TriggerPin, timing::*, DacPins, DebugSerialPins, LEDPins};

// Armed by PORT2, taken or disarmed by the main loop, always under a critical section.
static TRIGGER: TriggerFlag = TriggerFlag::new();

// Owned by the interrupt once the main loop hands it over. The pin is held so nothing else can reconfigure it.
struct TriggerInput {
    _pin: TriggerPin,
    vector: PxIV<P2>,
}
static TRIGGER_INPUT: Mutex<RefCell<Option<TriggerInput>>> = Mutex::new(RefCell::new(None));

#[entry]
fn main() -> ! {
    let Some(periph) = msp430fr2355::Peripherals::take() else { halt_without_leds() };
    let _wdt = Wdt::constrain(periph.WDT_A);

    let (dac_pins, mut led_pins, trigger_pin, trigger_vector, debug_serial_pins) =
        collect_pins(periph.PMM, periph.P2, periph.P4, periph.P6);

    let mut fram = Fram::new(periph.FRCTL);
    let (_smclk, aclk) = ClockConfig::new(periph.CS)
        .mclk_dcoclk(DcoclkFreqSel::_8MHz, MclkDiv::_1)
        .smclk_on(SmclkDiv::_1)
        .freeze(&mut fram);

    let (serial_tx_pin, _serial_rx_pin) = SerialConfig::new(
        periph.E_USCI_A1,
        BitOrder::LsbFirst,
        BitCount::EightBits,
        StopBits::OneStopBit,
        Parity::NoParity,
        Loopback::NoLoop,
        DEBUG_BAUD_RATE)
        .use_aclk(&aclk)
        .split(debug_serial_pins.tx, debug_serial_pins.rx);
    // Wrapper struct so we can use ufmt traits like uwrite! and uwriteln!
    let mut serial_writer = SerialWriter::new(serial_tx_pin);

    let config = RampConfig::DEFAULT;
    // Refuse to touch the DAC (or enable the trigger) with a configuration we can't encode.
    let dac_config = match config.dac_configuration() {
        Ok(dac_config) => dac_config,
        Err(err) => {
            dbg_uwriteln!(serial_writer, "config error: {}", err);
            halt(&mut led_pins)
        }
    };

    let spi_bus = BitBangSpiConfig::new(dac_pins.mosi, dac_pins.sck)
        .half_period_spins(SCK_HALF_PERIOD_SPINS)
        .sck_idle_low()
        .sample_on_first_edge()
        .create();
    let dac = Mcp49xx::new(spi_bus, dac_pins.chip_select, Some(dac_pins.latch), SpinDelay::new(SPINS_PER_MICROSECOND), dac_config);
    let mut ramp = WaveformController::new(dac, SpinDelay::new(SPINS_PER_MICROSECOND), config.ramp_settings());
    ramp.start();

    enable_trigger(trigger_pin, trigger_vector);
    led_pins.green_led.set_high().ok();
    dbg_uwriteln!(serial_writer, "armed, {} us of waits per sweep", config.sweep_wait_us(dac_config.resolution_bits()));

    loop {
        if let Some(report) = ramp.poll(&TRIGGER) {
            dbg_uwriteln!(serial_writer, "{}", report);
            let coalesced = TRIGGER.take_coalesced();
            if coalesced > 0 {
                dbg_uwriteln!(serial_writer, "{} extra trigger edges merged", coalesced);
            }
        }
    }
}

// Rising edge only. The controller disarms the flag itself once a traversal ends.
fn enable_trigger(mut pin: TriggerPin, vector: PxIV<P2>) {
    pin.select_rising_edge_trigger().enable_interrupts();
    critical_section::with(|cs| {
        TRIGGER_INPUT.borrow(cs).borrow_mut().replace(TriggerInput { _pin: pin, vector });
    });
    unsafe { msp430::interrupt::enable() };
}

#[interrupt]
fn PORT2() {
    critical_section::with(|cs| {
        let mut input = TRIGGER_INPUT.borrow(cs).borrow_mut();
        let Some(input) = input.as_mut() else { return };
        // Reading the vector clears the pending flag
        input.vector.get_interrupt_vector();
        TRIGGER.arm();
    });
}

fn halt(led_pins: &mut LEDPins) -> ! {
    led_pins.green_led.set_low().ok();
    led_pins.red_led.set_high().ok();
    halt_without_leds()
}

fn halt_without_leds() -> ! {
    #[allow(clippy::empty_loop)]
    loop {}
}

// Takes raw port peripherals and returns actually useful pin collections
fn collect_pins(pmm: PMM, p2: P2, p4: P4, p6: P6) -> (DacPins, LEDPins, TriggerPin, PxIV<P2>, DebugSerialPins) {
    let pmm = Pmm::new(pmm);
    let port2 = Batch::new(p2).split(&pmm);
    let port4 = Batch::new(p4).split(&pmm);
    let port6 = Batch::new(p6).split(&pmm);

    let dac_pins = DacPins {
        mosi: port4.pin6.to_output(),
        sck: port4.pin5.to_output(),
        chip_select: port6.pin3.to_output(),
        latch: port6.pin4.to_output(),
    };

    let led_pins = LEDPins {
        red_led: port2.pin1.to_output(),
        green_led: port2.pin3.to_output(),
    };

    let trigger_pin = port2.pin4.pulldown();

    let debug_serial_pins = DebugSerialPins {
        rx: port4.pin2.to_output().to_alternate1(),
        tx: port4.pin3.to_output().to_alternate1(),
    };

    (dac_pins, led_pins, trigger_pin, port2.pxiv, debug_serial_pins)
}

// The compiler will emit calls to the abort() compiler intrinsic if debug assertions are
// enabled (default for dev profile). MSP430 does not actually have meaningful abort() support
// so for now, we create our own in each application where debug assertions are present.
#[no_mangle]
extern "C" fn abort() -> ! {
    panic!();
}
