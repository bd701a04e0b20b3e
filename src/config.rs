use crate::scope::{ChannelId, ScopeDevice, Session, VoltageRange};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "picostream.json";
/// Sample frequencies the device supports; the UI and loaded snapshots are
/// both held to this window.
pub const MIN_SAMPLE_FREQUENCY: u32 = 100;
pub const MAX_SAMPLE_FREQUENCY: u32 = 4000;
const DEFAULT_SAMPLE_FREQUENCY: u32 = 2000;
const DEFAULT_LOGGING_DIRECTORY: &str = "./data";

/// Saved state for one channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelPreset {
    pub name: char,
    pub active: bool,
    pub range: u8,
    pub offset: f64,
}

/// Flat snapshot of everything the application persists between runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub sample_frequency: u32,
    pub logging_directory: PathBuf,
    pub channels: Vec<ChannelPreset>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_frequency: DEFAULT_SAMPLE_FREQUENCY,
            logging_directory: PathBuf::from(DEFAULT_LOGGING_DIRECTORY),
            channels: ChannelId::ALL
                .iter()
                .map(|id| ChannelPreset {
                    name: id.label(),
                    active: false,
                    range: 0,
                    offset: 0.0,
                })
                .collect(),
        }
    }
}

impl AppConfig {
    /// Loads the snapshot, falling back to the documented defaults on any
    /// missing or malformed content. Never fails the application.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                log::warn!("configuration file not found ({error}); using default values");
                return Self::default();
            }
        };
        let mut config: AppConfig = match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(error) => {
                log::warn!("configuration file unreadable ({error}); using default values");
                return Self::default();
            }
        };
        if config.sample_frequency == 0 {
            log::warn!(
                "configured sample frequency of zero replaced with {DEFAULT_SAMPLE_FREQUENCY}"
            );
            config.sample_frequency = DEFAULT_SAMPLE_FREQUENCY;
        } else if !(MIN_SAMPLE_FREQUENCY..=MAX_SAMPLE_FREQUENCY).contains(&config.sample_frequency)
        {
            let clamped = config
                .sample_frequency
                .clamp(MIN_SAMPLE_FREQUENCY, MAX_SAMPLE_FREQUENCY);
            log::warn!(
                "configured sample frequency {} outside {MIN_SAMPLE_FREQUENCY}..={MAX_SAMPLE_FREQUENCY}; using {clamped}",
                config.sample_frequency
            );
            config.sample_frequency = clamped;
        }
        config
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Pushes the per-channel presets into session state. Unknown channel
    /// names are skipped and out-of-range indexes degrade to the minimum
    /// range; offsets get clamped by the session as usual.
    pub fn apply_channels<D: ScopeDevice>(&self, session: &mut Session<D>) {
        for preset in &self.channels {
            let Some(id) = ChannelId::from_label(preset.name) else {
                log::warn!("ignoring preset for unknown channel {:?}", preset.name);
                continue;
            };
            let range =
                VoltageRange::from_index(preset.range as usize).unwrap_or(VoltageRange::Mv10);
            session.set_active(id, preset.active);
            session.set_range(id, range);
            session.set_offset(id, preset.offset);
        }
    }

    /// Captures the current session state for saving.
    pub fn capture<D: ScopeDevice>(session: &Session<D>, logging_directory: &Path) -> Self {
        Self {
            sample_frequency: session.sample_frequency() as u32,
            logging_directory: logging_directory.to_path_buf(),
            channels: session
                .channels()
                .iter()
                .map(|channel| ChannelPreset {
                    name: channel.id().label(),
                    active: channel.active(),
                    range: channel.range().index() as u8,
                    offset: channel.offset(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScriptedScope;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/picostream.json"));
        assert_eq!(config.sample_frequency, 2000);
        assert_eq!(config.logging_directory, PathBuf::from("./data"));
        assert_eq!(config.channels.len(), 8);
        assert!(config.channels.iter().all(|c| !c.active));
        assert!(config.channels.iter().all(|c| c.range == 0));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picostream.json");
        fs::write(&path, "{not json").unwrap();
        let config = AppConfig::load(&path);
        assert_eq!(config.sample_frequency, 2000);
    }

    #[test]
    fn zero_frequency_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picostream.json");
        fs::write(
            &path,
            r#"{"sample_frequency":0,"logging_directory":"./data","channels":[]}"#,
        )
        .unwrap();
        let config = AppConfig::load(&path);
        assert_eq!(config.sample_frequency, 2000);
    }

    #[test]
    fn out_of_window_frequency_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picostream.json");

        fs::write(
            &path,
            r#"{"sample_frequency":4000000000,"logging_directory":"./data","channels":[]}"#,
        )
        .unwrap();
        assert_eq!(AppConfig::load(&path).sample_frequency, 4000);

        fs::write(
            &path,
            r#"{"sample_frequency":50,"logging_directory":"./data","channels":[]}"#,
        )
        .unwrap();
        assert_eq!(AppConfig::load(&path).sample_frequency, 100);
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picostream.json");

        let mut session = Session::new(ScriptedScope::new());
        session.set_active(ChannelId::C, true);
        session.set_range(ChannelId::C, VoltageRange::V2);
        session.set_offset(ChannelId::C, 1.5);

        let saved = AppConfig::capture(&session, Path::new("/tmp/traces"));
        saved.save(&path).unwrap();

        let loaded = AppConfig::load(&path);
        assert_eq!(loaded.sample_frequency, saved.sample_frequency);
        assert_eq!(loaded.logging_directory, PathBuf::from("/tmp/traces"));
        let preset = &loaded.channels[ChannelId::C.index()];
        assert!(preset.active);
        assert_eq!(preset.range, VoltageRange::V2.index() as u8);
        assert_eq!(preset.offset, 1.5);
    }

    #[test]
    fn presets_restore_session_state_with_clamping() {
        let config = AppConfig {
            sample_frequency: 4000,
            logging_directory: PathBuf::from("./data"),
            channels: vec![
                ChannelPreset {
                    name: 'B',
                    active: true,
                    range: VoltageRange::Mv100.index() as u8,
                    offset: 99.0,
                },
                ChannelPreset {
                    name: '?',
                    active: true,
                    range: 0,
                    offset: 0.0,
                },
                ChannelPreset {
                    name: 'D',
                    active: false,
                    range: 200,
                    offset: 0.0,
                },
            ],
        };

        let mut session = Session::new(ScriptedScope::new());
        config.apply_channels(&mut session);

        let b = session.channel(ChannelId::B);
        assert!(b.active());
        assert_eq!(b.range(), VoltageRange::Mv100);
        // The 100 mV window is ±2.5 V; the stored offset lands on its edge.
        assert_eq!(b.offset(), 2.5);

        let d = session.channel(ChannelId::D);
        assert!(!d.active());
        assert_eq!(d.range(), VoltageRange::Mv10);
    }
}
