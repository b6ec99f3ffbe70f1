// Ramp (triangle) generator. Decides what value the DAC gets on each step and when the ramp turns around.

use embedded_hal::blocking::delay::DelayUs;
use ufmt::{uDisplay, uWrite, Formatter};

use crate::dac::{AnalogOutput, DacChannel};
use crate::trigger::TriggerFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}
impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}
impl uDisplay for Direction {
    fn fmt<W: uWrite + ?Sized>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error> {
        match self {
            Direction::Ascending => f.write_str("ascending"),
            Direction::Descending => f.write_str("descending"),
        }
    }
}

/// How the trigger gates the ramp. The two are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPolicy {
    /// Each trigger edge runs one complete endpoint-to-endpoint sweep. Edges during a sweep are held until it finishes.
    FullSweepPerTrigger,
    /// Each poll moves one step while the trigger is armed. Reaching an endpoint disarms, so one edge gives one traversal.
    /// Disarming early pauses in place.
    SingleStepPerPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Sweeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampSettings {
    pub policy: SweepPolicy,
    /// Busy-wait after every step.
    pub step_interval_us: u32,
    pub initial_direction: Direction,
    pub channel: DacChannel,
}

/// Summary of one endpoint-to-endpoint traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub steps: u32,
    pub final_value: u16,
    pub next_direction: Direction,
}
impl uDisplay for SweepReport {
    fn fmt<W: uWrite + ?Sized>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error> {
        f.write_str("sweep done: ")?;
        uDisplay::fmt(&self.steps, f)?;
        f.write_str(" steps, ended at ")?;
        uDisplay::fmt(&self.final_value, f)?;
        f.write_str(", next ")?;
        uDisplay::fmt(&self.next_direction, f)
    }
}

pub struct WaveformController<DAC, DELAY> {
    dac: DAC,
    delay: DELAY,
    settings: RampSettings,
    max_value: u16,
    current_value: u16,
    direction: Direction,
    state: ControllerState,
    // Steps emitted since the last turnaround, single step policy only
    steps_in_traversal: u32,
}

impl<DAC: AnalogOutput, DELAY: DelayUs<u32>> WaveformController<DAC, DELAY> {
    /// The ramp always starts on the endpoint it moves away from: 0 when ascending, full scale when descending.
    pub fn new(dac: DAC, delay: DELAY, settings: RampSettings) -> Self {
        let max_value = ((1_u32 << dac.resolution_bits()) - 1) as u16;
        let current_value = match settings.initial_direction {
            Direction::Ascending => 0,
            Direction::Descending => max_value,
        };
        WaveformController {
            dac,
            delay,
            settings,
            max_value,
            current_value,
            direction: settings.initial_direction,
            state: ControllerState::Idle,
            steps_in_traversal: 0,
        }
    }

    /// Park the output on the starting value before the trigger is enabled.
    pub fn start(&mut self) {
        self.dac.write(self.settings.channel, self.current_value);
        if self.dac.has_latch() {
            self.dac.latch();
        }
    }

    /// One pass of the main loop.
    pub fn poll(&mut self, trigger: &TriggerFlag) -> Option<SweepReport> {
        match self.settings.policy {
            SweepPolicy::FullSweepPerTrigger => {
                if trigger.take() {
                    Some(self.sweep())
                } else {
                    None
                }
            }
            SweepPolicy::SingleStepPerPoll => {
                if trigger.is_armed() {
                    self.step(trigger)
                } else {
                    self.state = ControllerState::Idle;
                    None
                }
            }
        }
    }

    /// Run a full traversal from the current endpoint to the opposite one, emitting 2^n values.
    /// Nothing is checked in between; the sweep always runs to completion.
    fn sweep(&mut self) -> SweepReport {
        self.state = ControllerState::Sweeping;
        let steps = self.max_value as u32 + 1;
        self.emit();
        for _ in 1..steps {
            self.advance();
            self.emit();
        }
        self.direction = self.direction.reversed();
        self.state = ControllerState::Idle;
        SweepReport { steps, final_value: self.current_value, next_direction: self.direction }
    }

    /// Emit the current value, turn around and disarm if it is an endpoint, then move one code.
    /// Returns a report when the step completed a traversal.
    fn step(&mut self, trigger: &TriggerFlag) -> Option<SweepReport> {
        self.state = ControllerState::Sweeping;
        self.emit();
        self.steps_in_traversal += 1;
        let at_end = match self.direction {
            Direction::Ascending => self.current_value == self.max_value,
            Direction::Descending => self.current_value == 0,
        };
        let report = if at_end {
            trigger.disarm();
            self.direction = self.direction.reversed();
            let report = SweepReport {
                steps: self.steps_in_traversal,
                final_value: self.current_value,
                next_direction: self.direction,
            };
            self.steps_in_traversal = 0;
            Some(report)
        } else {
            None
        };
        self.advance();
        report
    }

    fn advance(&mut self) {
        match self.direction {
            Direction::Ascending => self.current_value += 1,
            Direction::Descending => self.current_value -= 1,
        }
    }

    fn emit(&mut self) {
        self.dac.write(self.settings.channel, self.current_value);
        if self.dac.has_latch() {
            self.dac.latch();
        }
        self.delay.delay_us(self.settings.step_interval_us);
    }

    pub fn current_value(&self) -> u16 {
        self.current_value
    }
    pub fn direction(&self) -> Direction {
        self.direction
    }
    pub fn state(&self) -> ControllerState {
        self.state
    }
    pub fn settings(&self) -> &RampSettings {
        &self.settings
    }
    pub fn release(self) -> (DAC, DELAY) {
        (self.dac, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;
    use ufmt::uwrite;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Write(DacChannel, u16),
        Latch,
    }

    struct RecordingDac {
        bits: u8,
        latch: bool,
        ops: Vec<Op>,
    }
    impl RecordingDac {
        fn new(bits: u8, latch: bool) -> Self {
            RecordingDac { bits, latch, ops: Vec::new() }
        }
        fn written(&self) -> Vec<u16> {
            self.ops.iter().filter_map(|op| match op { Op::Write(_, v) => Some(*v), _ => None }).collect()
        }
        fn latches(&self) -> usize {
            self.ops.iter().filter(|op| **op == Op::Latch).count()
        }
    }
    impl AnalogOutput for RecordingDac {
        fn resolution_bits(&self) -> u8 { self.bits }
        fn write(&mut self, channel: DacChannel, value: u16) { self.ops.push(Op::Write(channel, value)) }
        fn latch(&mut self) { self.ops.push(Op::Latch) }
        fn has_latch(&self) -> bool { self.latch }
    }

    #[derive(Default)]
    struct VirtualClock {
        elapsed_us: u64,
        waits: u32,
    }
    impl DelayUs<u32> for VirtualClock {
        fn delay_us(&mut self, us: u32) {
            self.elapsed_us += us as u64;
            self.waits += 1;
        }
    }

    fn settings(policy: SweepPolicy, initial_direction: Direction) -> RampSettings {
        RampSettings { policy, step_interval_us: 10, initial_direction, channel: DacChannel::A }
    }

    fn controller(bits: u8, latch: bool, policy: SweepPolicy) -> WaveformController<RecordingDac, VirtualClock> {
        WaveformController::new(RecordingDac::new(bits, latch), VirtualClock::default(), settings(policy, Direction::Ascending))
    }

    #[test]
    fn full_sweep_ascends_then_mirrors() {
        let mut ctrl = controller(8, false, SweepPolicy::FullSweepPerTrigger);
        let report = ctrl.sweep();
        assert_eq!(report, SweepReport { steps: 256, final_value: 255, next_direction: Direction::Descending });
        assert_eq!(ctrl.current_value(), 255);
        assert_eq!(ctrl.direction(), Direction::Descending);
        assert_eq!(ctrl.state(), ControllerState::Idle);

        let report = ctrl.sweep();
        assert_eq!(report, SweepReport { steps: 256, final_value: 0, next_direction: Direction::Ascending });

        let (dac, _) = ctrl.release();
        let written = dac.written();
        let up: Vec<u16> = (0..=255).collect();
        let down: Vec<u16> = (0..=255).rev().collect();
        assert_eq!(&written[..256], &up[..]);
        assert_eq!(&written[256..], &down[..]);
    }

    #[test]
    fn full_sweep_step_count_matches_resolution() {
        for bits in [8, 10, 12] {
            let mut ctrl = controller(bits, false, SweepPolicy::FullSweepPerTrigger);
            let report = ctrl.sweep();
            assert_eq!(report.steps, 1 << bits);
            assert_eq!(report.final_value, (1 << bits) - 1);
            let (dac, _) = ctrl.release();
            assert_eq!(dac.written().len(), 1 << bits);
        }
    }

    #[test]
    fn descending_start_begins_at_full_scale() {
        let mut ctrl = WaveformController::new(
            RecordingDac::new(10, false),
            VirtualClock::default(),
            settings(SweepPolicy::FullSweepPerTrigger, Direction::Descending),
        );
        assert_eq!(ctrl.current_value(), 1023);
        let report = ctrl.sweep();
        assert_eq!(report.final_value, 0);
        assert_eq!(report.next_direction, Direction::Ascending);
    }

    #[test]
    fn poll_without_trigger_does_nothing() {
        let trigger = TriggerFlag::new();
        let mut ctrl = controller(8, true, SweepPolicy::FullSweepPerTrigger);
        assert_eq!(ctrl.poll(&trigger), None);
        let (dac, clock) = ctrl.release();
        assert!(dac.ops.is_empty());
        assert_eq!(clock.waits, 0);
    }

    #[test]
    fn poll_consumes_trigger_once() {
        let trigger = TriggerFlag::new();
        let mut ctrl = controller(8, false, SweepPolicy::FullSweepPerTrigger);
        trigger.arm();
        assert!(ctrl.poll(&trigger).is_some());
        assert!(!trigger.is_armed());
        assert_eq!(ctrl.poll(&trigger), None);
    }

    #[test]
    fn each_step_latches_and_waits_when_device_has_ldac() {
        let mut ctrl = controller(8, true, SweepPolicy::FullSweepPerTrigger);
        ctrl.sweep();
        let (dac, clock) = ctrl.release();
        assert_eq!(dac.latches(), 256);
        // latch always directly follows its write
        for pair in dac.ops.chunks(2) {
            assert!(matches!(pair[0], Op::Write(DacChannel::A, _)));
            assert_eq!(pair[1], Op::Latch);
        }
        assert_eq!(clock.waits, 256);
        assert_eq!(clock.elapsed_us, 2560);
    }

    #[test]
    fn no_latch_without_ldac() {
        let mut ctrl = controller(8, false, SweepPolicy::FullSweepPerTrigger);
        ctrl.sweep();
        let (dac, _) = ctrl.release();
        assert_eq!(dac.latches(), 0);
    }

    #[test]
    fn start_parks_output_on_initial_value() {
        let mut ctrl = controller(12, true, SweepPolicy::FullSweepPerTrigger);
        ctrl.start();
        let (dac, clock) = ctrl.release();
        assert_eq!(dac.ops, vec![Op::Write(DacChannel::A, 0), Op::Latch]);
        assert_eq!(clock.waits, 0);
    }

    #[test]
    fn single_step_moves_one_code_per_armed_poll() {
        let trigger = TriggerFlag::new();
        let mut ctrl = controller(8, false, SweepPolicy::SingleStepPerPoll);
        trigger.arm();
        for _ in 0..5 {
            ctrl.poll(&trigger);
        }
        assert!(trigger.is_armed(), "stepping mid-traversal must not consume the arm");
        assert_eq!(ctrl.current_value(), 5);
        assert_eq!(ctrl.state(), ControllerState::Sweeping);

        // Pause, then resume from the same code
        trigger.disarm();
        for _ in 0..3 {
            assert_eq!(ctrl.poll(&trigger), None);
        }
        assert_eq!(ctrl.current_value(), 5);
        assert_eq!(ctrl.state(), ControllerState::Idle);
        trigger.arm();
        ctrl.poll(&trigger);

        let (dac, _) = ctrl.release();
        assert_eq!(dac.written(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn single_step_reverses_only_at_extremes() {
        let trigger = TriggerFlag::new();
        let mut ctrl = controller(8, false, SweepPolicy::SingleStepPerPoll);
        let mut reports = Vec::new();
        for _ in 0..2 {
            trigger.arm();
            for _ in 0..300 {
                if let Some(report) = ctrl.poll(&trigger) {
                    reports.push(report);
                }
            }
        }
        assert_eq!(reports, vec![
            SweepReport { steps: 256, final_value: 255, next_direction: Direction::Descending },
            SweepReport { steps: 255, final_value: 0, next_direction: Direction::Ascending },
        ]);

        let (dac, _) = ctrl.release();
        let written = dac.written();
        assert_eq!(written.len(), 256 + 255);
        // Each endpoint is emitted once per turnaround
        assert_eq!(written.iter().filter(|&&v| v == 255).count(), 1);
        assert_eq!(written.iter().filter(|&&v| v == 0).count(), 2);
        assert_eq!(&written[254..258], &[254, 255, 254, 253]);
    }

    #[test]
    fn single_step_endpoint_disarms_trigger() {
        let trigger = TriggerFlag::new();
        let mut ctrl = controller(8, false, SweepPolicy::SingleStepPerPoll);
        trigger.arm();
        let mut traversals = 0;
        for _ in 0..2000 {
            if ctrl.poll(&trigger).is_some() {
                traversals += 1;
            }
        }
        assert_eq!(traversals, 1);
        assert!(!trigger.is_armed());
        assert_eq!(ctrl.current_value(), 254);
        assert_eq!(ctrl.direction(), Direction::Descending);
        assert_eq!(ctrl.state(), ControllerState::Idle);
    }

    #[test]
    fn report_formats_with_ufmt() {
        struct Buf(std::string::String);
        impl uWrite for Buf {
            type Error = core::convert::Infallible;
            fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
                self.0.push_str(s);
                Ok(())
            }
        }
        let mut buf = Buf(std::string::String::new());
        let report = SweepReport { steps: 4096, final_value: 4095, next_direction: Direction::Descending };
        uwrite!(buf, "{}", report).unwrap();
        assert_eq!(buf.0, "sweep done: 4096 steps, ended at 4095, next descending");
    }
}
