//! Client-side rate limiting for third-party APIs.

use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

pub(crate) type Throttle = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Allow at most `n` requests per second, evenly spaced.
pub(crate) fn per_second(n: u32) -> Throttle {
    let rate = NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate).allow_burst(NonZeroU32::MIN))
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::future::join_all;
    use std::time::{Duration, Instant};

    #[async_std::test]
    async fn test_throttle_spaces_requests() {
        let throttle = per_second(20);
        let start = Instant::now();
        join_all((0..3).map(|_| throttle.until_ready())).await;
        // The first request goes immediately, the next two wait about 50ms each.
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_zero_rate_still_allows_requests() {
        let throttle = per_second(0);
        throttle.check().unwrap();
        throttle.check().unwrap_err();
    }
}
