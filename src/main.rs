#![cfg_attr(target_arch = "msp430", no_main)]
#![cfg_attr(target_arch = "msp430", no_std)]
#![cfg_attr(target_arch = "msp430", feature(abi_msp430_interrupt))]
#![cfg_attr(not(feature = "debug_print"), allow(unused_variables, unused_mut))]

#![allow(clippy::upper_case_acronyms, clippy::needless_return)]

// This line lets the firmware do 'use board_mapping', we only have to change the board revision here.
#[cfg(target_arch = "msp430")]
mod board_mapping { include!("board_mapping.rs"); }
#[cfg(target_arch = "msp430")]
mod firmware;

// Off-target builds replay a few trigger pulses against a logging DAC instead.
#[cfg(not(target_arch = "msp430"))]
mod host_sim;

#[cfg(not(target_arch = "msp430"))]
fn main() {
    host_sim::run();
}
