/// Engine clock value in seconds.
///
/// The viewer never reads a wall clock itself; hosts feed time in through
/// `advance_to`, which keeps every timer decision replayable in tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn seconds(self) -> f64 {
        self.0
    }

    /// The instant `delay_s` seconds after `self`.
    pub fn after(self, delay_s: f64) -> Time {
        Time(self.0 + delay_s.max(0.0))
    }

    pub fn since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// Total ordering used for timer deadlines (NaN sorts last).
    pub fn total_cmp(&self, other: &Time) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn after_never_moves_backwards() {
        let t = Time(2.0);
        assert_eq!(t.after(0.5), Time(2.5));
        assert_eq!(t.after(-1.0), Time(2.0));
    }

    #[test]
    fn since_is_saturating() {
        assert_eq!(Time(3.0).since(Time(1.0)), 2.0);
        assert_eq!(Time(1.0).since(Time(3.0)), 0.0);
    }
}
