pub const MIB: u64 = 1024 * 1024;

/// Job/report queue capacity per worker in the parallel policy.
pub const CHANNEL_CAPACITY_MULTIPLIER: usize = 4;
pub const MIN_CHANNEL_CAPACITY: usize = 16;
