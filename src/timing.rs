use embedded_hal::blocking::delay::DelayUs;

// spin_loop() emits nothing on msp430, so an empty loop would be optimised out entirely. Burn a nop instead.
#[cfg(target_arch = "msp430")]
#[inline(always)]
fn spin_once() {
    msp430::asm::nop()
}

#[cfg(not(target_arch = "msp430"))]
#[inline(always)]
fn spin_once() {
    core::hint::spin_loop()
}

pub(crate) fn spin(spins: u32) {
    for _ in 0..spins {
        spin_once();
    }
}

// Approximate busy-wait delay. Accuracy depends entirely on spins_per_us matching the core clock.
#[derive(Clone, Copy)]
pub struct SpinDelay {
    spins_per_us: u32,
}

impl SpinDelay {
    pub const fn new(spins_per_us: u32) -> Self {
        SpinDelay { spins_per_us }
    }
}

impl DelayUs<u32> for SpinDelay {
    fn delay_us(&mut self, us: u32) {
        spin(us.saturating_mul(self.spins_per_us));
    }
}
