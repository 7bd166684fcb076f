/// Identifies an asset fetch so its completion can be checked for staleness.
///
/// `seq` is monotonically increasing across all fetches issued by one
/// fetcher; `region` is the region that was current when it was issued.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestStamp {
    pub seq: u64,
    pub region: String,
}

impl RequestStamp {
    pub fn new(seq: u64, region: impl Into<String>) -> Self {
        Self {
            seq,
            region: region.into(),
        }
    }
}

/// Accepts a completion only if it belongs to the current region, was issued
/// after that region was entered, and is newer than anything already applied.
#[derive(Debug, Default)]
pub struct StaleResponseGuard {
    region: Option<String>,
    floor: u64,
    last_applied: Option<u64>,
}

impl StaleResponseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    /// Enters `region`; only requests with `seq >= first_seq` can apply.
    pub fn set_region(&mut self, region: &str, first_seq: u64) {
        self.region = Some(region.to_string());
        self.floor = first_seq;
    }

    pub fn is_current(&self, stamp: &RequestStamp) -> bool {
        self.region.as_deref() == Some(stamp.region.as_str())
            && stamp.seq >= self.floor
            && self.last_applied.is_none_or(|last| stamp.seq > last)
    }

    /// Records `stamp` as applied if it is current. Returns whether it was.
    pub fn accept(&mut self, stamp: &RequestStamp) -> bool {
        if !self.is_current(stamp) {
            return false;
        }
        self.last_applied = Some(stamp.seq);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestStamp, StaleResponseGuard};

    #[test]
    fn rejects_other_regions_and_older_sequences() {
        let mut guard = StaleResponseGuard::new();
        assert!(!guard.accept(&RequestStamp::new(1, "a")));

        guard.set_region("a", 1);
        assert!(guard.accept(&RequestStamp::new(3, "a")));
        assert!(!guard.accept(&RequestStamp::new(2, "a")));
        assert!(!guard.accept(&RequestStamp::new(3, "a")));

        guard.set_region("b", 10);
        assert!(!guard.accept(&RequestStamp::new(9, "a")));
        assert!(guard.accept(&RequestStamp::new(10, "b")));
        assert_eq!(guard.last_applied(), Some(10));
    }

    #[test]
    fn returning_to_a_region_ignores_its_earlier_requests() {
        let mut guard = StaleResponseGuard::new();
        guard.set_region("a", 1);
        guard.set_region("b", 2);
        guard.set_region("a", 3);
        assert!(!guard.accept(&RequestStamp::new(1, "a")));
        assert!(guard.accept(&RequestStamp::new(3, "a")));
    }
}
