use crate::scope::device::OffsetBounds;
use std::collections::VecDeque;

/// Highest raw ADC count the digitizer reports.
pub const MAX_ADC: f32 = 32767.0;
/// Vertical span the display normalizes full scale onto.
pub const DISPLAY_SPAN: f32 = 10.0;

/// Physical input lines of the scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelId {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl ChannelId {
    pub const ALL: [ChannelId; 8] = [
        ChannelId::A,
        ChannelId::B,
        ChannelId::C,
        ChannelId::D,
        ChannelId::E,
        ChannelId::F,
        ChannelId::G,
        ChannelId::H,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> char {
        (b'A' + self as u8) as char
    }

    pub fn from_label(label: char) -> Option<ChannelId> {
        ChannelId::ALL
            .into_iter()
            .find(|id| id.label() == label.to_ascii_uppercase())
    }
}

/// Discrete full-scale voltage settings of the analog front end,
/// narrowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VoltageRange {
    Mv10,
    Mv20,
    Mv50,
    Mv100,
    Mv200,
    Mv500,
    V1,
    V2,
    V5,
    V10,
    V20,
    V50,
}

impl VoltageRange {
    pub const ALL: [VoltageRange; 12] = [
        VoltageRange::Mv10,
        VoltageRange::Mv20,
        VoltageRange::Mv50,
        VoltageRange::Mv100,
        VoltageRange::Mv200,
        VoltageRange::Mv500,
        VoltageRange::V1,
        VoltageRange::V2,
        VoltageRange::V5,
        VoltageRange::V10,
        VoltageRange::V20,
        VoltageRange::V50,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<VoltageRange> {
        VoltageRange::ALL.get(index).copied()
    }

    /// Full-scale value in volts.
    pub fn volts(self) -> f64 {
        match self {
            VoltageRange::Mv10 => 0.01,
            VoltageRange::Mv20 => 0.02,
            VoltageRange::Mv50 => 0.05,
            VoltageRange::Mv100 => 0.1,
            VoltageRange::Mv200 => 0.2,
            VoltageRange::Mv500 => 0.5,
            VoltageRange::V1 => 1.0,
            VoltageRange::V2 => 2.0,
            VoltageRange::V5 => 5.0,
            VoltageRange::V10 => 10.0,
            VoltageRange::V20 => 20.0,
            VoltageRange::V50 => 50.0,
        }
    }

    pub fn is_widest(self) -> bool {
        self == VoltageRange::V50
    }

    pub fn is_narrowest(self) -> bool {
        self == VoltageRange::Mv10
    }

    /// Steps to the next larger full scale, refusing to move past 50 V.
    /// Returns true when the resulting range sits at the top of the ladder,
    /// so callers can disable further widening.
    pub fn widen(&mut self) -> bool {
        if let Some(next) = VoltageRange::from_index(self.index() + 1) {
            *self = next;
        }
        self.is_widest()
    }

    /// Counterpart of [`VoltageRange::widen`] toward 10 mV.
    pub fn narrow(&mut self) -> bool {
        if let Some(prev) = self.index().checked_sub(1).and_then(VoltageRange::from_index) {
            *self = prev;
        }
        self.is_narrowest()
    }

    /// Button/legend label like "±500mV".
    pub fn label(self) -> String {
        let volts = self.volts();
        if volts < 1.0 {
            format!("±{:.0}mV", volts * 1e3)
        } else {
            format!("±{volts:.0}V")
        }
    }
}

/// Per-line configuration plus the rolling display buffer.
///
/// The rolling buffer holds normalized samples for live display only; raw
/// counts go to the recorder before normalization. It keeps at most
/// `rolling_capacity` samples, dropping the oldest first.
pub struct Channel {
    id: ChannelId,
    active: bool,
    range: VoltageRange,
    offset: f64,
    rolling: VecDeque<f32>,
    rolling_capacity: usize,
}

impl Channel {
    pub fn new(id: ChannelId, rolling_capacity: usize) -> Self {
        Self {
            id,
            active: false,
            range: VoltageRange::Mv10,
            offset: 0.0,
            rolling: VecDeque::with_capacity(rolling_capacity),
            rolling_capacity,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn range(&self) -> VoltageRange {
        self.range
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Full-scale value in volts; converts raw counts to physical units.
    pub fn scale(&self) -> f64 {
        self.range.volts()
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_range(&mut self, range: VoltageRange) {
        self.range = range;
    }

    pub fn widen_range(&mut self) -> bool {
        self.range.widen()
    }

    pub fn narrow_range(&mut self) -> bool {
        self.range.narrow()
    }

    /// Stores `offset` clamped to the device-reported window for the current
    /// range and coupling.
    pub fn set_offset(&mut self, offset: f64, bounds: OffsetBounds) {
        self.offset = bounds.clamp(offset);
    }

    /// Normalizes a freshly delivered chunk onto the display span and appends
    /// it, evicting the oldest samples once the buffer is full. Does nothing
    /// while the channel is inactive.
    pub fn push_samples(&mut self, raw: &[i16]) {
        if !self.active {
            return;
        }
        for &count in raw {
            if self.rolling.len() == self.rolling_capacity {
                self.rolling.pop_front();
            }
            self.rolling.push_back(f32::from(count) / MAX_ADC * DISPLAY_SPAN);
        }
    }

    pub fn clear(&mut self) {
        self.rolling.clear();
    }

    pub fn sample_count(&self) -> usize {
        self.rolling.len()
    }

    /// Display samples in arrival order.
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.rolling.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(raw: i16) -> f32 {
        f32::from(raw) / MAX_ADC * DISPLAY_SPAN
    }

    #[test]
    fn rolling_buffer_keeps_the_most_recent_samples_in_order() {
        let mut channel = Channel::new(ChannelId::A, 4);
        channel.set_active(true);
        channel.push_samples(&[1, 2, 3]);
        assert_eq!(channel.sample_count(), 3);
        channel.push_samples(&[4, 5, 6]);
        assert_eq!(channel.sample_count(), 4);
        let got: Vec<f32> = channel.samples().collect();
        let want: Vec<f32> = [3, 4, 5, 6].into_iter().map(normalized).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn inactive_channel_never_buffers() {
        let mut channel = Channel::new(ChannelId::B, 8);
        channel.push_samples(&[7, 8, 9]);
        assert_eq!(channel.sample_count(), 0);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut channel = Channel::new(ChannelId::C, 8);
        channel.set_active(true);
        channel.push_samples(&[1, 2, 3]);
        channel.clear();
        assert_eq!(channel.sample_count(), 0);
    }

    #[test]
    fn offset_is_clamped_to_the_given_bounds() {
        let bounds = OffsetBounds { min: -2.5, max: 2.5 };
        let mut channel = Channel::new(ChannelId::A, 8);
        channel.set_offset(4.0, bounds);
        assert_eq!(channel.offset(), 2.5);
        channel.set_offset(-4.0, bounds);
        assert_eq!(channel.offset(), -2.5);
        channel.set_offset(0.25, bounds);
        assert_eq!(channel.offset(), 0.25);
    }

    #[test]
    fn widening_is_bounded_and_reports_the_extremum() {
        let mut range = VoltageRange::Mv10;
        let mut steps = 0;
        while !range.widen() {
            steps += 1;
            assert!(steps < VoltageRange::ALL.len(), "widen never reached the top");
        }
        assert_eq!(range, VoltageRange::V50);
        // Further widening is a no-op and still reports the extremum.
        assert!(range.widen());
        assert_eq!(range, VoltageRange::V50);
    }

    #[test]
    fn narrowing_is_bounded_and_reports_the_extremum() {
        let mut range = VoltageRange::V50;
        while !range.narrow() {}
        assert_eq!(range, VoltageRange::Mv10);
        assert!(range.narrow());
        assert_eq!(range, VoltageRange::Mv10);
    }

    #[test]
    fn range_indexes_round_trip() {
        for range in VoltageRange::ALL {
            assert_eq!(VoltageRange::from_index(range.index()), Some(range));
        }
        assert_eq!(VoltageRange::from_index(12), None);
    }

    #[test]
    fn channel_labels_round_trip() {
        for id in ChannelId::ALL {
            assert_eq!(ChannelId::from_label(id.label()), Some(id));
        }
        assert_eq!(ChannelId::from_label('x'), None);
    }
}
