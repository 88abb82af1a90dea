use foundation::time::{Duration, Time};

/// Deterministic frame metadata.
///
/// This is the primary timebase handed to layers while they build. It is
/// small and pure so a whole build can be recorded and replayed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Delta since the previous frame.
    pub dt: Duration,
    /// Engine time at the start of the frame.
    pub time: Time,
}

impl Frame {
    /// Fixed-step frame: `time = index * dt`.
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt: Duration(dt_s),
            time: Time(index as f64 * dt_s),
        }
    }

    /// Frame at an explicit time, e.g. from a host clock.
    pub fn at(index: u64, time: Time) -> Self {
        Self {
            index,
            dt: Duration(0.0),
            time,
        }
    }

    pub fn next(self) -> Self {
        Self {
            index: self.index + 1,
            dt: self.dt,
            time: self.time.after(self.dt),
        }
    }
}
