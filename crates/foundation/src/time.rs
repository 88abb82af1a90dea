/// Engine time in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Time(ms / 1000.0)
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }

    pub fn after(self, delay: Duration) -> Self {
        Time(self.0 + delay.0)
    }
}

/// Non-negative span of engine time, in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Duration(pub f64);

impl Duration {
    pub fn from_millis(ms: f64) -> Self {
        Duration((ms / 1000.0).max(0.0))
    }

    pub fn as_millis(self) -> f64 {
        self.0 * 1000.0
    }
}
