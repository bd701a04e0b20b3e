use crate::recorder::Recorder;
use crate::scope::channel::{Channel, ChannelId, VoltageRange};
use crate::scope::device::{Coupling, OffsetBounds, ScopeDevice, StreamChunk, TriggerSettings};
use crate::scope::error::DeviceError;
use crate::scope::timing::{self, TimeUnit};
use std::time::Duration;

/// Samples the device writes per channel between polls ("one buffer").
pub const CHUNK_CAPACITY: usize = 200;
/// Samples each rolling display buffer retains.
pub const ROLLING_CAPACITY: usize = 2000;
/// Wall-time cadence at which the front end drives `poll_tick`. Governs
/// polling latency only; the sample rate is governed by the device clock.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Grace period between halting the device and releasing the handle, so the
/// driver is no longer writing into a buffer we are about to drop.
const SETTLE_TIME: Duration = Duration::from_millis(200);

/// One configured run of continuous streaming.
///
/// Owns the device handle and all channel state; every hardware mutation
/// funnels through [`Session::reconfigure`], and sample delivery happens
/// exclusively inside [`Session::poll_tick`]. Both run on the same thread,
/// so a reconfiguration can never race a poll.
pub struct Session<D: ScopeDevice> {
    device: D,
    channels: [Channel; 8],
    coupling: Coupling,
    sample_frequency: f64,
    interval: u32,
    unit: TimeUnit,
    polling: bool,
    overflow: u16,
}

impl<D: ScopeDevice> Session<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            channels: ChannelId::ALL.map(|id| Channel::new(id, ROLLING_CAPACITY)),
            coupling: Coupling::Dc,
            sample_frequency: 2000.0,
            interval: 0,
            unit: TimeUnit::Micros,
            polling: false,
            overflow: 0,
        }
    }

    pub fn channels(&self) -> &[Channel; 8] {
        &self.channels
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn sample_frequency(&self) -> f64 {
        self.sample_frequency
    }

    /// Effective interval between samples in seconds, valid after the first
    /// successful `reconfigure`.
    pub fn interval_seconds(&self) -> f64 {
        timing::interval_seconds(self.interval, self.unit)
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    /// True when any channel clipped during the most recent chunk. The flag
    /// follows the device report tick by tick; it is never accumulated.
    pub fn overflowed(&self) -> bool {
        self.overflow != 0
    }

    pub fn channel_overflowed(&self, id: ChannelId) -> bool {
        self.overflow & (1 << id.index()) != 0
    }

    /// Legal offset window for the channel's current range.
    pub fn offset_bounds(&self, id: ChannelId) -> Result<OffsetBounds, DeviceError> {
        self.device
            .offset_bounds(self.channel(id).range(), self.coupling)
    }

    // Settings mutators. None of these touch the hardware; callers follow up
    // with `reconfigure` once a batch of changes is in place.

    pub fn set_active(&mut self, id: ChannelId, active: bool) {
        self.channels[id.index()].set_active(active);
    }

    pub fn set_range(&mut self, id: ChannelId, range: VoltageRange) {
        self.channels[id.index()].set_range(range);
        self.reclamp_offset(id);
    }

    /// Steps to the next wider range; true once the widest range is reached.
    pub fn widen_range(&mut self, id: ChannelId) -> bool {
        let at_extremum = self.channels[id.index()].widen_range();
        self.reclamp_offset(id);
        at_extremum
    }

    /// Steps to the next narrower range; true once the narrowest is reached.
    pub fn narrow_range(&mut self, id: ChannelId) -> bool {
        let at_extremum = self.channels[id.index()].narrow_range();
        self.reclamp_offset(id);
        at_extremum
    }

    pub fn set_offset(&mut self, id: ChannelId, offset: f64) {
        match self.offset_bounds(id) {
            Ok(bounds) => self.channels[id.index()].set_offset(offset, bounds),
            Err(error) => log::warn!(
                "offset bounds query failed for channel {}: {error}",
                id.label()
            ),
        }
    }

    /// Requeries the bounds for the channel's current range and re-clamps the
    /// stored offset. On a recoverable query failure the previous offset is
    /// kept rather than guessed at.
    fn reclamp_offset(&mut self, id: ChannelId) {
        match self.offset_bounds(id) {
            Ok(bounds) => {
                let channel = &mut self.channels[id.index()];
                let current = channel.offset();
                channel.set_offset(current, bounds);
            }
            Err(error) => log::warn!(
                "offset bounds query failed for channel {}: {error}",
                id.label()
            ),
        }
    }

    /// Tears down and rebuilds the whole streaming setup: clears the rolling
    /// buffers, pushes every channel's configuration (inactive channels are
    /// explicitly disabled), arms the fixed trigger, registers fresh raw
    /// buffers for the active channels, and restarts continuous streaming.
    ///
    /// Safe to call on every settings change. If a fatal step fails, polling
    /// stays stopped and the error is returned.
    pub fn reconfigure(&mut self, sample_frequency: f64) -> Result<(), DeviceError> {
        self.polling = false;
        self.overflow = 0;
        self.sample_frequency = sample_frequency;

        for channel in &mut self.channels {
            channel.clear();
        }

        for id in ChannelId::ALL {
            // Clamp against fresh bounds before the device sees the value;
            // the hardware never observes an out-of-window offset.
            self.reclamp_offset(id);
            let channel = &self.channels[id.index()];
            if let Err(error) = self.device.configure_channel(
                id,
                channel.active(),
                self.coupling,
                channel.range(),
                channel.offset(),
            ) {
                if error.is_fatal() {
                    return Err(error);
                }
                log::warn!("set_channel {} failed: {error}", id.label());
            }
        }

        if let Err(error) = self.device.configure_trigger(TriggerSettings::armed()) {
            if error.is_fatal() {
                return Err(error);
            }
            log::warn!("set_simple_trigger failed: {error}");
        }

        for id in ChannelId::ALL {
            if self.channels[id.index()].active() {
                self.device.allocate_buffer(id, CHUNK_CAPACITY)?;
            }
        }

        let (interval, unit) = timing::sample_interval(sample_frequency);
        let effective = self
            .device
            .start_streaming(interval, unit, CHUNK_CAPACITY)?;
        if effective != interval {
            log::info!("device adjusted the sample interval from {interval} to {effective}");
        }
        self.interval = effective;
        self.unit = unit;

        self.polling = true;
        Ok(())
    }

    /// One pass of the streaming poll loop: ask the device for the latest
    /// values and, if a chunk arrived, fan it out to the rolling buffers and
    /// the recorder. "Not ready" is an expected transient and is absorbed
    /// silently; any other poll failure is logged and treated as an empty
    /// tick.
    pub fn poll_tick(&mut self, recorder: &mut Recorder) -> Option<StreamChunk> {
        if !self.polling {
            return None;
        }
        let chunk = match self.device.poll_latest() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return None,
            Err(error) if error.is_transient() => return None,
            Err(error) => {
                log::warn!("streaming poll failed: {error}");
                return None;
            }
        };

        for id in ChannelId::ALL {
            let channel = &mut self.channels[id.index()];
            if !channel.active() {
                continue;
            }
            let raw = self.device.raw_buffer(id);
            let start = chunk.start_index.min(raw.len());
            let end = (chunk.start_index + chunk.samples).min(raw.len());
            let slice = &raw[start..end];
            channel.push_samples(slice);
            recorder.append(id, slice);
        }

        self.overflow = chunk.overflow;
        Some(chunk)
    }

    /// Shutdown sequence: stop polling, halt the device, give the driver a
    /// moment to settle. The handle itself is released when the session is
    /// dropped.
    pub fn shutdown(&mut self) {
        self.polling = false;
        if let Err(error) = self.device.stop() {
            log::warn!("device stop failed: {error}");
        }
        std::thread::sleep(SETTLE_TIME);
    }

    #[cfg(test)]
    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    #[cfg(test)]
    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}
