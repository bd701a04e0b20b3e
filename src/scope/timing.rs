/// Time units accepted by the streaming clock, coarsest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Millis,
    Micros,
    Nanos,
}

impl TimeUnit {
    pub fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Millis => 1e-3,
            TimeUnit::Micros => 1e-6,
            TimeUnit::Nanos => 1e-9,
        }
    }
}

/// Expresses `1 / frequency` as an integer count of the coarsest unit that
/// still yields a value of at least one, truncating the fraction.
///
/// `frequency` must be positive; callers validate before reaching this point.
pub fn sample_interval(frequency: f64) -> (u32, TimeUnit) {
    assert!(frequency > 0.0, "sample frequency must be positive");
    let interval = 1.0 / frequency;
    if interval >= 1.0 {
        (interval as u32, TimeUnit::Seconds)
    } else if interval >= 1e-3 {
        ((interval * 1e3) as u32, TimeUnit::Millis)
    } else if interval >= 1e-6 {
        ((interval * 1e6) as u32, TimeUnit::Micros)
    } else {
        ((interval * 1e9) as u32, TimeUnit::Nanos)
    }
}

/// Interval length in seconds, for time axes and recording headers.
pub fn interval_seconds(value: u32, unit: TimeUnit) -> f64 {
    f64::from(value) * unit.seconds()
}
