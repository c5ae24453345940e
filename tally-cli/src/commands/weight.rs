//! Weight command implementation

use anyhow::{Context, Result};
use tally_cgroup::convert::{QUOTA_PERIOD, milli_cpu_to_quota, milli_cpu_to_shares, shares_to_weight};
use tally_core::Quantity;

pub fn execute(cpu: &str) -> Result<()> {
    let quantity = Quantity::parse(cpu).context("Invalid CPU quantity")?;
    if quantity.is_negative() {
        anyhow::bail!("CPU quantity must not be negative, got: {cpu}");
    }

    let millis = quantity.milli_value()?;
    let shares = milli_cpu_to_shares(millis);

    println!("millicores: {millis}");
    println!("shares:     {shares}");
    println!("cpu.weight: {}", shares_to_weight(shares));
    if millis > 0 {
        println!(
            "cpu.max:    {} {QUOTA_PERIOD}",
            milli_cpu_to_quota(millis, QUOTA_PERIOD)
        );
    }

    Ok(())
}
