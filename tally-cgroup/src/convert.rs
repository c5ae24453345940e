//! CPU and memory unit conversions for cgroup v2
//!
//! The constants here are contracts with the kernel and with the tooling
//! that reproduces these values, so the arithmetic (including where integer
//! division truncates) must not be rearranged.

/// Smallest legacy (v1) CPU shares value
pub const MIN_SHARES: u64 = 2;

/// Shares granted per full core
pub const SHARES_PER_CPU: u64 = 1024;

/// Largest legacy (v1) CPU shares value
pub const MAX_SHARES: u64 = 262_144;

/// Millicores per core
pub const MILLI_CPU_TO_CPU: i64 = 1000;

/// Smallest cgroup v2 `cpu.weight`
pub const MIN_WEIGHT: u64 = 1;

/// Largest cgroup v2 `cpu.weight`
pub const MAX_WEIGHT: u64 = 10_000;

/// CFS bandwidth period in microseconds (100ms)
pub const QUOTA_PERIOD: i64 = 100_000;

/// Smallest quota the kernel accepts, in microseconds (1ms)
pub const MIN_QUOTA_PERIOD: i64 = 1000;

/// Convert a CPU request in millicores to legacy shares
///
/// Zero maps to [`MIN_SHARES`]; one core maps to [`SHARES_PER_CPU`]; the
/// result is clamped to `[MIN_SHARES, MAX_SHARES]`. Negative input must be
/// rejected by the caller.
#[must_use]
pub fn milli_cpu_to_shares(milli_cpu: i64) -> u64 {
    if milli_cpu <= 0 {
        return MIN_SHARES;
    }

    let milli = milli_cpu.unsigned_abs();
    let shares = milli.saturating_mul(SHARES_PER_CPU) / MILLI_CPU_TO_CPU.unsigned_abs();
    shares.clamp(MIN_SHARES, MAX_SHARES)
}

/// Convert legacy shares to a cgroup v2 weight
///
/// `1 + ((shares - 2) * 9999) / 262142`, truncating. Maps `[2, 262144]`
/// onto `[1, 10000]`.
#[must_use]
pub fn shares_to_weight(shares: u64) -> u64 {
    let shares = shares.clamp(MIN_SHARES, MAX_SHARES);
    MIN_WEIGHT + ((shares - MIN_SHARES) * (MAX_WEIGHT - MIN_WEIGHT)) / (MAX_SHARES - MIN_SHARES)
}

/// Convert a CPU request in millicores to a cgroup v2 weight
///
/// Always goes through [`milli_cpu_to_shares`] first.
#[must_use]
pub fn milli_cpu_to_weight(milli_cpu: i64) -> u64 {
    shares_to_weight(milli_cpu_to_shares(milli_cpu))
}

/// Convert a CPU limit in millicores to a CFS quota for `period`
///
/// Zero means no quota and returns 0. Anything else is raised to at least
/// [`MIN_QUOTA_PERIOD`].
#[must_use]
pub fn milli_cpu_to_quota(milli_cpu: i64, period: i64) -> i64 {
    if milli_cpu == 0 {
        return 0;
    }

    let quota = milli_cpu.saturating_mul(period) / MILLI_CPU_TO_CPU;
    quota.max(MIN_QUOTA_PERIOD)
}
