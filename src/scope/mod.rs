// src/scope/mod.rs
// Streaming-acquisition core: channel state, device capability trait,
// sample clock, and the session controller that drives them.
pub mod channel;
pub mod device;
pub mod error;
pub mod session;
pub mod sim;
pub mod timing;
pub use channel::{Channel, ChannelId, VoltageRange, DISPLAY_SPAN, MAX_ADC};
pub use device::{
    Coupling, Delivery, OffsetBounds, ScopeDevice, ScriptedScope, StreamChunk, TriggerDirection,
    TriggerSettings,
};
pub use error::DeviceError;
pub use session::{Session, CHUNK_CAPACITY, POLL_INTERVAL, ROLLING_CAPACITY};
pub use sim::SimScope;
pub use timing::{interval_seconds, sample_interval, TimeUnit};
