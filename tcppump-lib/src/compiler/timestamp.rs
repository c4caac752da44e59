use std::time::Duration;

/// The `-t`/`--resolution` time unit: microseconds, milliseconds,
/// centiseconds or seconds. Converts an integer delay in that unit to a
/// `Duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Micro,
    Milli,
    Centi,
    Second,
}

impl Resolution {
    pub fn parse(flag: &str) -> Option<Self> {
        match flag {
            "u" => Some(Resolution::Micro),
            "m" => Some(Resolution::Milli),
            "c" => Some(Resolution::Centi),
            "s" => Some(Resolution::Second),
            _ => None,
        }
    }

    pub fn to_duration(self, units: u64) -> Duration {
        match self {
            Resolution::Micro => Duration::from_micros(units),
            Resolution::Milli => Duration::from_millis(units),
            Resolution::Centi => Duration::from_millis(units * 10),
            Resolution::Second => Duration::from_secs(units),
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Milli
    }
}

/// Running accumulator that turns per-instruction delays into absolute
/// send-time offsets from the start of a run.
#[derive(Debug, Default)]
pub struct TimestampAccumulator {
    total: Duration,
    saw_explicit_timestamp: bool,
    saw_nonzero_delay: bool,
}

impl TimestampAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Duration {
        self.total
    }

    /// Jumps to an explicit script timestamp (already an absolute offset in
    /// resolution units from the start of the script) and returns it; later
    /// implicit items continue advancing from this new base.
    pub fn explicit(&mut self, resolution: Resolution, units: u64) -> Duration {
        self.saw_explicit_timestamp = true;
        self.total = resolution.to_duration(units);
        self.total
    }

    /// Returns the current absolute send time for the item about to be
    /// emitted, then advances the running total by `delay` (the default
    /// `-d` delay, or an inline `wait(...)` duration) in preparation for the
    /// next one.
    pub fn advance(&mut self, delay: Duration) -> Duration {
        let ts = self.total;
        if !delay.is_zero() {
            self.saw_nonzero_delay = true;
        }
        self.total += delay;
        ts
    }

    /// §9 Open Question resolution: real-time mode is on iff any instruction
    /// carried an explicit timestamp, or a non-zero default delay was ever
    /// applied. PCAP mode with `scale == 0` never sets either flag, so it is
    /// always throughput mode regardless of this accumulator's history.
    pub fn is_realtime(&self) -> bool {
        self.saw_explicit_timestamp || self.saw_nonzero_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_converts_units_to_duration() {
        assert_eq!(Resolution::Milli.to_duration(50), Duration::from_millis(50));
        assert_eq!(Resolution::Centi.to_duration(5), Duration::from_millis(50));
        assert_eq!(Resolution::Second.to_duration(2), Duration::from_secs(2));
    }

    #[test]
    fn zero_delay_alone_stays_in_throughput_mode() {
        let mut acc = TimestampAccumulator::new();
        acc.advance(Duration::ZERO);
        acc.advance(Duration::ZERO);
        assert!(!acc.is_realtime());
    }

    #[test]
    fn nonzero_delay_switches_to_realtime() {
        let mut acc = TimestampAccumulator::new();
        acc.advance(Duration::from_millis(10));
        assert!(acc.is_realtime());
    }

    #[test]
    fn explicit_timestamp_switches_to_realtime() {
        let mut acc = TimestampAccumulator::new();
        acc.explicit(Resolution::Milli, 0);
        assert!(acc.is_realtime());
    }
}
