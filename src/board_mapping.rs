// This file acts as an abstraction layer for board-specific values that may change between revisions.

pub mod pin_name_types {
    use msp430fr2x5x_hal::gpio::*;

    pub type RedLEDPin = Pin<P2, Pin1, Output>;
    pub type GreenLEDPin = Pin<P2, Pin3, Output>;

    pub type DacCsPin = Pin<P6, Pin3, Output>;
    pub type DacLdacPin = Pin<P6, Pin4, Output>;
    pub type DacMosiBitBangPin = Pin<P4, Pin6, Output>;
    pub type DacSckBitBangPin = Pin<P4, Pin5, Output>;

    // Camera exposure output. Pulled down so a disconnected camera never arms the ramp.
    pub type TriggerPin = Pin<P2, Pin4, Input<Pulldown>>;

    pub type DebugSerialRx = Pin<P4, Pin2, Alternate1<Output>>;
    pub type DebugSerialTx = Pin<P4, Pin3, Alternate1<Output>>;
}

pub mod timing {
    // MCLK runs from the DCO at 8MHz. One empty spin iteration takes about eight cycles.
    pub const SPINS_PER_MICROSECOND: u32 = 1;
    // Keeps SCK under 1MHz, well inside the MCP49xx's 20MHz limit.
    pub const SCK_HALF_PERIOD_SPINS: u16 = 1;
    pub const DEBUG_BAUD_RATE: u32 = 9600;
}

use pin_name_types::*;

pub struct DacPins {
    pub mosi: DacMosiBitBangPin,
    pub sck: DacSckBitBangPin,
    pub chip_select: DacCsPin,
    pub latch: DacLdacPin,
}

pub struct LEDPins {
    pub red_led: RedLEDPin,
    pub green_led: GreenLEDPin,
}

pub struct DebugSerialPins {
    pub rx: DebugSerialRx,
    pub tx: DebugSerialTx,
}
