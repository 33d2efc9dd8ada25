use std::time::Instant;

/// Monotonic time source used to stamp scan starts
pub trait Clock: Send + Sync {
    /// Nanoseconds since an arbitrary fixed origin
    fn now_nanos(&self) -> u64;
}

/// Clock backed by `std::time::Instant`, counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}
