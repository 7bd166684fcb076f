use foundation::time::Time;

/// Metadata for one rendered frame.
///
/// The host's animation callback produces one of these per repaint; per-frame
/// behaviour (idle orbit) is expressed in "per frame" units, so the index is
/// what matters, with `dt_s` kept for smoothing.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Seconds since the previous frame.
    pub dt_s: f64,
    /// Engine time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    pub fn at(index: u64, dt_s: f64, time: Time) -> Self {
        Self { index, dt_s, time }
    }

    pub fn next(self) -> Self {
        Self::at(self.index + 1, self.dt_s, self.time.after(self.dt_s))
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, 1.0 / 60.0);
        let b = Frame::new(10, 1.0 / 60.0);
        assert_eq!(a, b);
        assert_eq!(a.time, Time(10.0 / 60.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::new(0, 0.5);
        let f1 = f0.next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(0.5));
    }
}
