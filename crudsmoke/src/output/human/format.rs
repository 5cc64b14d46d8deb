use std::time::Duration;

pub(crate) fn format_duration(d: Duration) -> String {
    // One component in us, ms or s. Sub-second values keep two decimals.
    let total_ns = d.as_nanos();

    const NS_PER_US: u128 = 1_000;
    const NS_PER_MS: u128 = 1_000_000;
    const NS_PER_S: u128 = 1_000_000_000;

    if total_ns >= NS_PER_S {
        return format!("{:.2}s", d.as_secs_f64());
    }
    if total_ns >= NS_PER_MS {
        return format!("{:.2}ms", total_ns as f64 / NS_PER_MS as f64);
    }

    // Round to nearest (ties up).
    format!("{}us", (total_ns + NS_PER_US / 2) / NS_PER_US)
}

pub(crate) fn format_duration_ns(ns: u64) -> String {
    format_duration(Duration::from_nanos(ns))
}

pub(crate) fn format_percent(rate: f64) -> String {
    if rate.is_finite() {
        format!("{:.2}%", rate * 100.0)
    } else {
        "0.00%".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_pick_one_unit() {
        assert_eq!(format_duration(Duration::from_nanos(400)), "0us");
        assert_eq!(format_duration(Duration::from_nanos(1_500)), "2us");
        assert_eq!(format_duration(Duration::from_micros(1_250)), "1.25ms");
        assert_eq!(format_duration(Duration::from_millis(2_500)), "2.50s");
        assert_eq!(format_duration_ns(0), "0us");
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(format_percent(1.0), "100.00%");
        assert_eq!(format_percent(2.0 / 3.0), "66.67%");
        assert_eq!(format_percent(f64::NAN), "0.00%");
    }
}
