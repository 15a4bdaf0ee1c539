use nix::sys::time::TimeValLike;
use nix::time::ClockId;

/// Monotonically increasing nanoseconds with an arbitrary starting point.
/// Used to stamp received datagrams.
pub fn now_nanos() -> u64 {
    let timespec = nix::time::clock_gettime(ClockId::CLOCK_MONOTONIC_RAW)
        .expect("clock_gettime(CLOCK_MONOTONIC_RAW) failed");

    u64::try_from(timespec.num_nanoseconds()).expect("monotonic clock went negative")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_between_calls() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
    }
}
