use crate::scope::channel::{ChannelId, VoltageRange};
use crate::scope::error::DeviceError;
use crate::scope::timing::TimeUnit;
use std::collections::VecDeque;

/// Input coupling of the analog front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coupling {
    Ac,
    Dc,
}

/// Canonical trigger directions. The vendor driver exposes extra alias codes
/// (INSIDE, ENTER, ...) sharing these numeric values; only the canonical set
/// exists here so equality never depends on which alias was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerDirection {
    Above,
    Below,
    Rising,
    Falling,
    RisingOrFalling,
}

/// Simple edge-trigger configuration.
#[derive(Clone, Copy, Debug)]
pub struct TriggerSettings {
    pub enabled: bool,
    pub source: ChannelId,
    pub threshold: i16,
    pub direction: TriggerDirection,
    pub delay: u32,
    pub auto_trigger_ms: u16,
}

impl TriggerSettings {
    /// Always-armed rising edge on channel A with auto-trigger disabled; the
    /// only trigger this application ever configures.
    pub fn armed() -> Self {
        Self {
            enabled: true,
            source: ChannelId::A,
            threshold: 0,
            direction: TriggerDirection::Rising,
            delay: 0,
            auto_trigger_ms: 0,
        }
    }
}

/// Legal analog-offset window for one range/coupling combination.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OffsetBounds {
    pub min: f64,
    pub max: f64,
}

impl OffsetBounds {
    pub fn clamp(self, offset: f64) -> f64 {
        if offset < self.min {
            self.min
        } else if offset > self.max {
            self.max
        } else {
            offset
        }
    }
}

/// Offset windows the PS4000A driver reports per range (identical for AC and
/// DC coupling on this model).
pub fn analogue_offset_bounds(range: VoltageRange, _coupling: Coupling) -> OffsetBounds {
    let max = if range.volts() < 1.0 {
        2.5
    } else if range.volts() <= 5.0 {
        12.5
    } else {
        20.0
    };
    OffsetBounds { min: -max, max }
}

/// Descriptor for one delivered run of streaming samples.
///
/// Replaces the driver's synchronous "streaming ready" callback: `poll_latest`
/// hands this back and the caller slices the raw buffers itself, keeping the
/// control flow linear.
#[derive(Clone, Copy, Debug)]
pub struct StreamChunk {
    /// Number of newly captured samples per channel.
    pub samples: usize,
    /// First valid index into each channel's raw buffer.
    pub start_index: usize,
    /// One bit per channel, set when the input exceeded the selected range.
    pub overflow: u16,
}

impl StreamChunk {
    pub fn overflowed(&self, channel: ChannelId) -> bool {
        self.overflow & (1 << channel.index()) != 0
    }
}

/// Capability surface of a streaming multi-channel oscilloscope.
///
/// The real vendor driver stays behind this trait; any implementation with
/// the same operations substitutes for it, which is how the tests run without
/// hardware.
pub trait ScopeDevice {
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        enabled: bool,
        coupling: Coupling,
        range: VoltageRange,
        offset: f64,
    ) -> Result<(), DeviceError>;

    fn configure_trigger(&mut self, trigger: TriggerSettings) -> Result<(), DeviceError>;

    /// Registers a fresh raw buffer of `len` samples for `channel`, replacing
    /// any previous registration.
    fn allocate_buffer(&mut self, channel: ChannelId, len: usize) -> Result<(), DeviceError>;

    /// Current offset window for a range/coupling pair. Range-dependent, so
    /// callers must requery after every range or coupling change.
    fn offset_bounds(
        &self,
        range: VoltageRange,
        coupling: Coupling,
    ) -> Result<OffsetBounds, DeviceError>;

    /// Starts continuous FIFO streaming: zero pre-trigger samples,
    /// `chunk_capacity` post-trigger samples per poll, auto-stop off.
    /// Returns the effective interval the device settled on.
    fn start_streaming(
        &mut self,
        interval: u32,
        unit: TimeUnit,
        chunk_capacity: usize,
    ) -> Result<u32, DeviceError>;

    /// Non-blocking request for the latest streaming values. `Ok(None)` means
    /// nothing new this tick; a chunk descriptor means the raw buffers hold
    /// valid data in the indicated window.
    fn poll_latest(&mut self) -> Result<Option<StreamChunk>, DeviceError>;

    /// Raw buffer contents for `channel`; empty if never allocated.
    fn raw_buffer(&self, channel: ChannelId) -> &[i16];

    /// Stops the device from sampling.
    fn stop(&mut self) -> Result<(), DeviceError>;
}

/// One scripted poll outcome for [`ScriptedScope`]: raw data to place into
/// the channel buffers plus the descriptor fields to report.
pub struct Delivery {
    pub data: Vec<(ChannelId, Vec<i16>)>,
    pub start_index: usize,
    pub overflow: u16,
}

/// In-memory device useful for tests and deterministic playback.
#[derive(Default)]
pub struct ScriptedScope {
    deliveries: VecDeque<Result<Delivery, DeviceError>>,
    buffers: [Vec<i16>; 8],
    pub configured: Vec<(ChannelId, bool, VoltageRange, f64)>,
    pub triggers_armed: usize,
    pub streams_started: usize,
    pub last_stream: Option<(u32, TimeUnit, usize)>,
    pub stopped: bool,
    /// When set, the next `start_streaming` fails with this status.
    pub fail_streaming: Option<u32>,
}

impl ScriptedScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_delivery(&mut self, delivery: Delivery) {
        self.deliveries.push_back(Ok(delivery));
    }

    pub fn push_error(&mut self, error: DeviceError) {
        self.deliveries.push_back(Err(error));
    }
}

impl ScopeDevice for ScriptedScope {
    fn configure_channel(
        &mut self,
        channel: ChannelId,
        enabled: bool,
        _coupling: Coupling,
        range: VoltageRange,
        offset: f64,
    ) -> Result<(), DeviceError> {
        self.configured.push((channel, enabled, range, offset));
        Ok(())
    }

    fn configure_trigger(&mut self, _trigger: TriggerSettings) -> Result<(), DeviceError> {
        self.triggers_armed += 1;
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
        if let Some(status) = self.fail_streaming.take() {
            return Err(DeviceError::CallFailed {
                call: "run_streaming",
                status,
            });
        }
        self.streams_started += 1;
        self.last_stream = Some((interval, unit, chunk_capacity));
        Ok(interval)
    }

    fn poll_latest(&mut self) -> Result<Option<StreamChunk>, DeviceError> {
        match self.deliveries.pop_front() {
            None => Ok(None),
            Some(Err(error)) => Err(error),
            Some(Ok(delivery)) => {
                let mut samples = 0;
                for (channel, data) in &delivery.data {
                    samples = samples.max(data.len());
                    let buffer = &mut self.buffers[channel.index()];
                    for (i, &value) in data.iter().enumerate() {
                        if let Some(slot) = buffer.get_mut(delivery.start_index + i) {
                            *slot = value;
                        }
                    }
                }
                Ok(Some(StreamChunk {
                    samples,
                    start_index: delivery.start_index,
                    overflow: delivery.overflow,
                }))
            }
        }
    }

    fn raw_buffer(&self, channel: ChannelId) -> &[i16] {
        &self.buffers[channel.index()]
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.stopped = true;
        Ok(())
    }
}
