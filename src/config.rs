// Everything the firmware needs to know about the DAC and the ramp, in one place.
// Board-specific pin assignments live in the firmware's board mapping instead.

use crate::dac::{DacChannel, DacConfiguration, DacError, GainMode};
use crate::waveform::{Direction, RampSettings, SweepPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampConfig {
    /// Raw model identifier, 1..=6 for MCP4901, 4911, 4921, 4902, 4912, 4922.
    pub dac_model_id: u8,
    /// 1 or 2.
    pub gain: u8,
    pub buffer_input: bool,
    pub auto_latch_dual: bool,
    pub step_interval_us: u32,
    pub initial_direction: Direction,
    pub policy: SweepPolicy,
    pub channel: DacChannel,
}

impl RampConfig {
    // MCP4922 at 2x gain. A 10us step gives a rising edge of about 41ms at 4096 steps.
    pub const DEFAULT: RampConfig = RampConfig {
        dac_model_id: 6,
        gain: 2,
        buffer_input: false,
        auto_latch_dual: true,
        step_interval_us: 10,
        initial_direction: Direction::Ascending,
        policy: SweepPolicy::FullSweepPerTrigger,
        channel: DacChannel::A,
    };

    /// Fails if the model or gain is not supported. Nothing may be sent to the DAC in that case.
    pub fn dac_configuration(&self) -> Result<DacConfiguration, DacError> {
        let gain = GainMode::try_from(self.gain)?;
        let config = DacConfiguration::configure(self.dac_model_id, gain, self.buffer_input)?;
        Ok(config.auto_latch_dual(self.auto_latch_dual))
    }

    pub fn ramp_settings(&self) -> RampSettings {
        RampSettings {
            policy: self.policy,
            step_interval_us: self.step_interval_us,
            initial_direction: self.initial_direction,
            channel: self.channel,
        }
    }

    /// Time spent waiting between steps over one full sweep. Bus time comes on top of this.
    pub fn sweep_wait_us(&self, resolution_bits: u8) -> u64 {
        (1_u64 << resolution_bits) * self.step_interval_us as u64
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_a_12_bit_dual_dac_at_double_gain() {
        let dac = RampConfig::default().dac_configuration().unwrap();
        assert_eq!(dac.resolution_bits(), 12);
        assert_eq!(dac.gain, GainMode::X2);
        assert!(dac.auto_latch_dual);
        assert_eq!(RampConfig::DEFAULT.ramp_settings().policy, SweepPolicy::FullSweepPerTrigger);
    }

    #[test]
    fn bad_model_or_gain_is_refused() {
        let config = RampConfig { dac_model_id: 9, ..RampConfig::DEFAULT };
        assert_eq!(config.dac_configuration(), Err(DacError::InvalidModel));
        let config = RampConfig { gain: 4, ..RampConfig::DEFAULT };
        assert_eq!(config.dac_configuration(), Err(DacError::InvalidGain));
    }

    #[test]
    fn auto_latch_setting_is_carried_through() {
        let config = RampConfig { auto_latch_dual: false, ..RampConfig::DEFAULT };
        assert!(!config.dac_configuration().unwrap().auto_latch_dual);
    }

    #[test]
    fn sweep_wait_scales_with_resolution() {
        assert_eq!(RampConfig::DEFAULT.sweep_wait_us(12), 40_960);
        assert_eq!(RampConfig::DEFAULT.sweep_wait_us(8), 2_560);
    }
}
