use foundation::time::Time;
use runtime::timers::{TimerId, TimerQueue};
use streaming::protocol::PipelineJobStatus;

/// Periodic pipeline status polling.
///
/// At most one poll is in flight. A `running → not running` transition is
/// reported so the engine can refetch assets produced by the finished job.
#[derive(Debug)]
pub struct StatusPoller {
    interval_s: f64,
    timers: TimerQueue<()>,
    pending: Option<TimerId>,
    in_flight: bool,
    last: Option<PipelineJobStatus>,
}

impl StatusPoller {
    pub fn new(interval_s: f64) -> Self {
        Self {
            interval_s,
            timers: TimerQueue::new(),
            pending: None,
            in_flight: false,
            last: None,
        }
    }

    pub fn status(&self) -> Option<&PipelineJobStatus> {
        self.last.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Time> {
        self.timers.next_deadline()
    }

    pub fn start(&mut self, now: Time) {
        if self.pending.is_none() {
            self.pending = Some(self.timers.arm(now, self.interval_s, ()));
        }
    }

    /// Returns `true` when a poll should be issued now.
    pub fn fire_due(&mut self, now: Time) -> bool {
        let mut due = false;
        while let Some((id, ())) = self.timers.pop_due(now) {
            if self.pending == Some(id) {
                due = true;
            }
        }
        if !due {
            return false;
        }
        self.pending = Some(self.timers.arm(now, self.interval_s, ()));
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Records a poll result; `None` means the poll failed. Returns `true` if
    /// a job just finished.
    pub fn on_result(&mut self, result: Option<PipelineJobStatus>) -> bool {
        self.in_flight = false;
        let Some(status) = result else {
            return false;
        };
        let finished = self.last.as_ref().is_some_and(|prev| prev.running) && !status.running;
        self.last = Some(status);
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::StatusPoller;
    use foundation::time::Time;
    use streaming::protocol::PipelineJobStatus;

    fn status(running: bool) -> Option<PipelineJobStatus> {
        Some(PipelineJobStatus {
            running,
            ..PipelineJobStatus::default()
        })
    }

    #[test]
    fn polls_each_interval_but_never_overlaps() {
        let mut p = StatusPoller::new(1.0);
        p.start(Time(0.0));
        assert!(!p.fire_due(Time(0.5)));
        assert!(p.fire_due(Time(1.0)));
        assert!(!p.fire_due(Time(2.0)));

        p.on_result(status(false));
        assert!(p.fire_due(Time(3.0)));
    }

    #[test]
    fn reports_only_the_running_to_idle_edge() {
        let mut p = StatusPoller::new(1.0);
        assert!(!p.on_result(status(false)));
        assert!(!p.on_result(status(true)));
        assert!(!p.on_result(None));
        assert!(p.status().unwrap().running);
        assert!(p.on_result(status(false)));
        assert!(!p.on_result(status(false)));
    }
}
