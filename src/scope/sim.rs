use crate::scope::channel::{ChannelId, VoltageRange, MAX_ADC};
use crate::scope::device::{
    analogue_offset_bounds, Coupling, OffsetBounds, ScopeDevice, StreamChunk, TriggerSettings,
};
use crate::scope::error::DeviceError;
use crate::scope::timing::{self, TimeUnit};
use rand::Rng;
use std::f64::consts::TAU;
use std::time::Instant;

/// Samples per period of the synthetic sine, independent of the sample rate
/// so something visible always fits on the display.
const SAMPLES_PER_PERIOD: f64 = 128.0;
/// Peak amplitude of the synthetic signal in volts. Narrow ranges clip on it,
/// which exercises the overflow path exactly like a real over-driven input.
const SIGNAL_AMPLITUDE: f64 = 0.5;
/// Measurement noise in volts.
const NOISE_AMPLITUDE: f64 = 0.01;

#[derive(Clone, Copy)]
struct SimChannel {
    enabled: bool,
    range: VoltageRange,
    offset: f64,
}

impl Default for SimChannel {
    fn default() -> Self {
        Self {
            enabled: false,
            range: VoltageRange::Mv10,
            offset: 0.0,
        }
    }
}

/// Software stand-in for the oscilloscope: a wall-clock-paced sine-plus-noise
/// generator honoring the configured ranges, offsets, and active flags.
pub struct SimScope {
    channels: [SimChannel; 8],
    buffers: [Vec<i16>; 8],
    interval_seconds: f64,
    chunk_capacity: usize,
    streaming: bool,
    phase: f64,
    last_poll: Option<Instant>,
}

impl SimScope {
    /// Mirrors the driver's `open_unit`; the simulation is always present.
    pub fn open() -> Result<Self, DeviceError> {
        log::info!("opened simulated PicoScope");
        Ok(Self {
            channels: [SimChannel::default(); 8],
            buffers: Default::default(),
            interval_seconds: 0.0,
            chunk_capacity: 0,
            streaming: false,
            phase: 0.0,
            last_poll: None,
        })
    }
}

/// Converts an input voltage to a raw count on `range`, clipping at the ADC
/// limits. The flag reports whether clipping occurred.
fn digitize(volts: f64, range: VoltageRange) -> (i16, bool) {
    let full_scale = f64::from(MAX_ADC);
    let counts = volts / range.volts() * full_scale;
    if counts > full_scale {
        (MAX_ADC as i16, true)
    } else if counts < -full_scale {
        (-(MAX_ADC as i16), true)
    } else {
        (counts as i16, false)
    }
}

impl ScopeDevice for SimScope {
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        enabled: bool,
        _coupling: Coupling,
        range: VoltageRange,
        offset: f64,
    ) -> Result<(), DeviceError> {
        self.channels[channel.index()] = SimChannel {
            enabled,
            range,
            offset,
        };
        Ok(())
    }

    fn configure_trigger(&mut self, _trigger: TriggerSettings) -> Result<(), DeviceError> {
        // Streaming starts collecting regardless of the trigger; nothing to do.
        Ok(())
    }

    fn allocate_buffer(&mut self, channel: ChannelId, len: usize) -> Result<(), DeviceError> {
        self.buffers[channel.index()] = vec![0; len];
        Ok(())
    }

    fn offset_bounds(
        &self,
        range: VoltageRange,
        coupling: Coupling,
    ) -> Result<OffsetBounds, DeviceError> {
        Ok(analogue_offset_bounds(range, coupling))
    }

    fn start_streaming(
        &mut self,
        interval: u32,
        unit: TimeUnit,
        chunk_capacity: usize,
    ) -> Result<u32, DeviceError> {
        self.interval_seconds = timing::interval_seconds(interval, unit);
        self.chunk_capacity = chunk_capacity;
        self.streaming = true;
        self.phase = 0.0;
        self.last_poll = Some(Instant::now());
        Ok(interval)
    }

    fn poll_latest(&mut self) -> Result<Option<StreamChunk>, DeviceError> {
        if !self.streaming {
            return Err(DeviceError::NotReady);
        }
        let now = Instant::now();
        let last = self.last_poll.unwrap_or(now);
        let elapsed = now.duration_since(last).as_secs_f64();
        let due = (elapsed / self.interval_seconds) as usize;
        if due == 0 {
            return Ok(None);
        }
        let samples = due.min(self.chunk_capacity);
        self.last_poll = Some(now);

        let mut overflow = 0u16;
        let start_phase = self.phase;
        let mut rng = rand::thread_rng();
        for (index, sim) in self.channels.iter().enumerate() {
            let buffer = &mut self.buffers[index];
            if !sim.enabled || buffer.is_empty() {
                continue;
            }
            let mut phase = start_phase + index as f64 * 0.7;
            for slot in buffer.iter_mut().take(samples) {
                phase += TAU / SAMPLES_PER_PERIOD;
                let volts = SIGNAL_AMPLITUDE * phase.sin()
                    + sim.offset
                    + rng.gen_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE);
                let (count, clipped) = digitize(volts, sim.range);
                *slot = count;
                if clipped {
                    overflow |= 1 << index;
                }
            }
        }
        self.phase = start_phase + samples as f64 * TAU / SAMPLES_PER_PERIOD;

        Ok(Some(StreamChunk {
            samples,
            start_index: 0,
            overflow,
        }))
    }

    fn raw_buffer(&self, channel: ChannelId) -> &[i16] {
        &self.buffers[channel.index()]
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.streaming = false;
        self.last_poll = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_before_streaming_reports_not_ready() {
        let mut scope = SimScope::open().unwrap();
        let error = scope.poll_latest().unwrap_err();
        assert!(error.is_transient());
    }

    #[test]
    fn digitize_scales_within_the_range() {
        let (count, clipped) = digitize(0.5, VoltageRange::V1);
        assert!(!clipped);
        assert_eq!(count, (0.5 * f64::from(MAX_ADC)) as i16);
    }

    #[test]
    fn digitize_clips_and_flags_out_of_range_inputs() {
        let (count, clipped) = digitize(0.5, VoltageRange::Mv10);
        assert!(clipped);
        assert_eq!(count, MAX_ADC as i16);
        let (count, clipped) = digitize(-0.5, VoltageRange::Mv10);
        assert!(clipped);
        assert_eq!(count, -(MAX_ADC as i16));
    }

    #[test]
    fn stop_halts_sample_production() {
        let mut scope = SimScope::open().unwrap();
        scope
            .configure_channel(ChannelId::A, true, Coupling::Dc, VoltageRange::V1, 0.0)
            .unwrap();
        scope.allocate_buffer(ChannelId::A, 16).unwrap();
        scope.start_streaming(1, TimeUnit::Micros, 16).unwrap();
        scope.stop().unwrap();
        assert!(scope.poll_latest().unwrap_err().is_transient());
    }
}
