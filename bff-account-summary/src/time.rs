pub trait TimeSource {
    /// Current time as epoch milliseconds.
    fn current_millis(&self) -> i64;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_millis(&self) -> i64 {
        let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
        (nanos / 1_000_000) as i64
    }
}

/// Always reports the same instant.
#[derive(Clone)]
pub struct FixedTime {
    pub millis: i64,
}

impl TimeSource for FixedTime {
    fn current_millis(&self) -> i64 {
        self.millis
    }
}
