use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

struct TimeOrigin {
    instant: Instant,
    unix_ms: f64,
}

static ORIGIN: OnceLock<TimeOrigin> = OnceLock::new();

fn origin() -> &'static TimeOrigin {
    ORIGIN.get_or_init(|| TimeOrigin {
        instant: Instant::now(),
        unix_ms: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
            * 1_000.0,
    })
}

/// Milliseconds elapsed since the process-wide time origin.
///
/// The origin is fixed the first time any timestamp is taken, so event
/// timestamps and `performance.now()` share one clock.
pub fn now() -> f64 {
    origin().instant.elapsed().as_secs_f64() * 1_000.0
}

/// The time origin as milliseconds since the Unix epoch.
pub fn time_origin() -> f64 {
    origin().unix_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let first = now();
        let second = now();
        assert!(second >= first);
        assert!(first >= 0.0);
    }

    #[test]
    fn origin_is_stable() {
        assert_eq!(time_origin(), time_origin());
        assert!(time_origin() > 0.0);
    }
}
