/// Seconds since the Unix epoch; a clock before the epoch reads as zero.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// When a credential issued at `issued_unix` and valid for `lifetime_seconds`
/// should be refreshed: `margin_seconds` before expiry, or halfway through
/// lifetimes too short to honour the margin.
pub fn refresh_deadline(issued_unix: u64, lifetime_seconds: u64, margin_seconds: u64) -> u64 {
    let usable = if lifetime_seconds > margin_seconds {
        lifetime_seconds - margin_seconds
    } else {
        lifetime_seconds / 2
    };
    issued_unix.saturating_add(usable)
}

#[cfg(test)]
mod tests {
    use super::{refresh_deadline, unix_now};

    #[test]
    fn unit_refresh_deadline_applies_margin() {
        assert_eq!(refresh_deadline(1_000, 3_600, 60), 4_540);
    }

    #[test]
    fn regression_short_lifetimes_refresh_halfway() {
        assert_eq!(refresh_deadline(1_000, 30, 60), 1_015);
        assert_eq!(refresh_deadline(1_000, 0, 60), 1_000);
    }

    #[test]
    fn unit_unix_now_is_after_2020() {
        assert!(unix_now() > 1_577_836_800);
    }
}
