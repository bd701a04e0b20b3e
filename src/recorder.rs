use crate::scope::{Channel, ChannelId};
use anyhow::{Context, Result};
use chrono::Local;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Per-channel append-only binary writer with a plain-text header.
///
/// Each active channel gets `picoscope_ch_<X>.bin` inside a date-stamped
/// session folder. The header carries everything a downstream reader needs
/// to rescale the raw counts; the samples follow as little-endian i16 with
/// no framing, so a file is one continuous run of header-then-samples.
pub struct Recorder {
    streams: [Option<BufWriter<File>>; 8],
    active: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            streams: Default::default(),
            active: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active
    }

    /// Opens one file per active channel and writes the headers. Returns the
    /// session folder so the front end can show where data is going.
    ///
    /// Streams from an earlier run never survive into this one: the old set
    /// is closed up front, and the new set is committed only once every file
    /// opened, so a failed start leaves no stream behind that a later append
    /// could reach.
    pub fn start(
        &mut self,
        directory: &Path,
        channels: &[Channel],
        interval_seconds: f64,
    ) -> Result<PathBuf> {
        self.active = false;
        self.close_streams();

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let folder = directory.join(stamp);
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create recording folder {}", folder.display()))?;

        let mut streams: [Option<BufWriter<File>>; 8] = Default::default();
        for channel in channels {
            if !channel.active() {
                continue;
            }
            let path = folder.join(format!("picoscope_ch_{}.bin", channel.id().label()));
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write!(
                writer,
                "Time Interval: {}\nScale: {}\nOffset: {}\n\n",
                interval_seconds,
                channel.scale(),
                channel.offset()
            )?;
            streams[channel.id().index()] = Some(writer);
        }

        self.streams = streams;
        self.active = true;
        log::info!("recording to {}", folder.display());
        Ok(folder)
    }

    /// Appends a delivered chunk for `channel` in arrival order. A no-op
    /// while idle; an active recording with no stream for a sampled channel
    /// is a wiring bug and gets logged rather than dropped silently.
    pub fn append(&mut self, channel: ChannelId, raw: &[i16]) {
        if !self.active {
            return;
        }
        let Some(writer) = self.streams[channel.index()].as_mut() else {
            log::error!(
                "recording is active but channel {} has no open stream",
                channel.label()
            );
            return;
        };
        for &sample in raw {
            if let Err(error) = writer.write_all(&sample.to_le_bytes()) {
                log::warn!(
                    "recording write failed for channel {}: {error}",
                    channel.label()
                );
                return;
            }
        }
    }

    /// Closes every open stream. A later `start` writes fresh files; closed
    /// files are never appended to again.
    pub fn stop(&mut self) {
        self.active = false;
        self.close_streams();
        log::info!("recording stopped");
    }

    fn close_streams(&mut self) {
        for stream in &mut self.streams {
            if let Some(mut writer) = stream.take() {
                writer.flush().ok();
            }
        }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

/// One channel's recorded stream, read back from disk.
#[derive(Debug)]
pub struct RecordedTrace {
    pub header: HashMap<String, f64>,
    pub samples: Vec<i16>,
}

impl RecordedTrace {
    pub fn interval_seconds(&self) -> Option<f64> {
        self.header.get("Time Interval").copied()
    }

    pub fn scale(&self) -> Option<f64> {
        self.header.get("Scale").copied()
    }

    pub fn offset(&self) -> Option<f64> {
        self.header.get("Offset").copied()
    }
}

/// Reads back a `picoscope_ch_<X>.bin` file: `key: value` header lines up to
/// the first blank line, then raw little-endian i16 samples to the end.
pub fn read_recording(path: &Path) -> Result<RecordedTrace> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut header = HashMap::new();
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line)?;
        if read == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("bad header value for {:?}", key.trim()))?;
            header.insert(key.trim().to_string(), value);
        }
    }

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let samples = payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(RecordedTrace { header, samples })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{OffsetBounds, VoltageRange};

    fn active_channel(id: ChannelId, range: VoltageRange, offset: f64) -> Channel {
        let mut channel = Channel::new(id, 16);
        channel.set_active(true);
        channel.set_range(range);
        channel.set_offset(offset, OffsetBounds { min: -2.5, max: 2.5 });
        channel
    }

    #[test]
    fn recording_round_trips_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![active_channel(ChannelId::A, VoltageRange::V1, 0.25)];

        let mut recorder = Recorder::new();
        let folder = recorder.start(dir.path(), &channels, 5e-4).unwrap();
        let first: Vec<i16> = vec![0, -1, 32767, -32768, 1234];
        let second: Vec<i16> = vec![7, 8, 9];
        recorder.append(ChannelId::A, &first);
        recorder.append(ChannelId::A, &second);
        recorder.stop();

        let trace = read_recording(&folder.join("picoscope_ch_A.bin")).unwrap();
        assert_eq!(trace.interval_seconds(), Some(5e-4));
        assert_eq!(trace.scale(), Some(1.0));
        assert_eq!(trace.offset(), Some(0.25));
        let mut expected = first;
        expected.extend(second);
        assert_eq!(trace.samples, expected);
    }

    #[test]
    fn only_active_channels_get_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut idle = Channel::new(ChannelId::B, 16);
        idle.set_range(VoltageRange::V5);
        let channels = vec![active_channel(ChannelId::A, VoltageRange::Mv500, 0.0), idle];

        let mut recorder = Recorder::new();
        let folder = recorder.start(dir.path(), &channels, 1e-3).unwrap();
        recorder.stop();

        assert!(folder.join("picoscope_ch_A.bin").exists());
        assert!(!folder.join("picoscope_ch_B.bin").exists());
    }

    #[test]
    fn append_while_idle_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![active_channel(ChannelId::A, VoltageRange::V1, 0.0)];

        let mut recorder = Recorder::new();
        assert!(!recorder.is_recording());
        recorder.append(ChannelId::A, &[1, 2, 3]);

        let folder = recorder.start(dir.path(), &channels, 1e-3).unwrap();
        recorder.stop();
        recorder.append(ChannelId::A, &[4, 5, 6]);

        let trace = read_recording(&folder.join("picoscope_ch_A.bin")).unwrap();
        assert!(trace.samples.is_empty());
    }

    #[test]
    fn restart_drops_streams_for_channels_no_longer_active() {
        let dir = tempfile::tempdir().unwrap();
        let first_set = vec![active_channel(ChannelId::A, VoltageRange::V1, 0.0)];
        let second_set = vec![active_channel(ChannelId::B, VoltageRange::V1, 0.0)];

        let mut recorder = Recorder::new();
        let first_folder = recorder.start(dir.path(), &first_set, 1e-3).unwrap();
        recorder.append(ChannelId::A, &[1, 2, 3]);

        // Second start without an intervening stop; channel A must not keep
        // a path back into the first session's file.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second_folder = recorder.start(dir.path(), &second_set, 1e-3).unwrap();
        assert_ne!(first_folder, second_folder);
        recorder.append(ChannelId::A, &[4, 5, 6]);
        recorder.append(ChannelId::B, &[7]);
        recorder.stop();

        let first = read_recording(&first_folder.join("picoscope_ch_A.bin")).unwrap();
        assert_eq!(first.samples, vec![1, 2, 3]);
        assert!(!second_folder.join("picoscope_ch_A.bin").exists());
        let second = read_recording(&second_folder.join("picoscope_ch_B.bin")).unwrap();
        assert_eq!(second.samples, vec![7]);
    }

    #[test]
    fn failed_start_leaves_no_reachable_streams() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![active_channel(ChannelId::A, VoltageRange::V1, 0.0)];

        let mut recorder = Recorder::new();
        let folder = recorder.start(dir.path(), &channels, 1e-3).unwrap();

        // A base directory that is itself a file makes create_dir_all fail.
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"").unwrap();
        assert!(recorder.start(&blocked, &channels, 1e-3).is_err());
        assert!(!recorder.is_recording());

        // The stream from the first run was closed before the attempt, so
        // this append has nowhere to go.
        recorder.append(ChannelId::A, &[9, 9, 9]);
        let trace = read_recording(&folder.join("picoscope_ch_A.bin")).unwrap();
        assert!(trace.samples.is_empty());
    }

    #[test]
    fn header_survives_unusual_values() {
        let dir = tempfile::tempdir().unwrap();
        let channels = vec![active_channel(ChannelId::H, VoltageRange::Mv10, -2.5)];

        let mut recorder = Recorder::new();
        let folder = recorder.start(dir.path(), &channels, 0.02).unwrap();
        recorder.stop();

        let trace = read_recording(&folder.join("picoscope_ch_H.bin")).unwrap();
        assert_eq!(trace.interval_seconds(), Some(0.02));
        assert_eq!(trace.scale(), Some(0.01));
        assert_eq!(trace.offset(), Some(-2.5));
    }
}
