use std::time::Duration;

/// An infinite stream of back off durations, where the duration grows by a
/// constant factor up to some maximum delay. Upon reaching the maximum delay,
/// that value is returned from then on. Use `Iterator::take` to bound the
/// number of attempts.
///
/// The [Retry] helpers sleep with [std::thread::sleep]; do not use them from
/// asynchronous code.
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start,
            max,
            factor,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let this = self.curr;
        let new_next = self.curr * self.factor;

        self.curr = if new_next > self.max {
            self.max
        } else {
            new_next
        };

        Some(this)
    }
}

/// Retry a fallible function once per item of an iterator over [Duration]
/// values, those values specifying the wait between attempts.
pub trait Retry: Iterator<Item = Duration> {
    /// Retry `f` until it returns [Ok]. After every failed attempt but the
    /// last, `on_err` is called with the error and the delay before the next
    /// attempt; it is responsible for sleeping (and may log). If the iterator
    /// finishes without a successful attempt then the last [Err] is
    /// returned, or `None` if the iterator was empty.
    fn retry<F, S, T, E>(&mut self, mut f: F, on_err: S) -> Option<Result<T, E>>
    where
        F: FnMut() -> Result<T, E>,
        S: Fn(&E, Duration),
        Self: Sized,
    {
        let mut last_err = None;
        let mut iter = self.peekable();
        loop {
            match iter.next() {
                Some(delay) => match f() {
                    Ok(v) => return Some(Ok(v)),
                    Err(e) => {
                        if iter.peek().is_some() {
                            on_err(&e, delay);
                        }
                        last_err = Some(Err(e));
                    }
                },
                None => return last_err,
            }
        }
    }
}

impl<I: Iterator<Item = Duration>> Retry for I {}

#[cfg(test)]
mod test {
    use super::{ExponentialBackoff, Retry};
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn backoff_grows_until_the_maximum() {
        let delays: Vec<_> = ExponentialBackoff::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
            2,
        )
        .take(5)
        .collect();
        let ms: Vec<_> = delays.iter().map(|d| d.as_millis()).collect();
        assert_eq!(ms, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn retry_stops_at_first_success() {
        let attempts = Cell::new(0);
        let result = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2)
            .take(10)
            .retry(
                || {
                    attempts.set(attempts.get() + 1);
                    if attempts.get() < 3 {
                        Err("not yet")
                    } else {
                        Ok(attempts.get())
                    }
                },
                |_, _| {},
            );
        assert_eq!(result, Some(Ok(3)));
    }

    #[test]
    fn retry_returns_last_error_when_exhausted() {
        let calls = Cell::new(0);
        let waits = Cell::new(0);
        let result: Option<Result<(), usize>> = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2)
            .take(4)
            .retry(
                || {
                    calls.set(calls.get() + 1);
                    Err(calls.get())
                },
                |_, _| waits.set(waits.get() + 1),
            );
        assert_eq!(result, Some(Err(4)));
        assert_eq!(waits.get(), 3);
    }

    #[test]
    fn a_single_attempt_never_waits() {
        let waits = Cell::new(0);
        let result: Option<Result<(), ()>> = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2)
            .take(1)
            .retry(|| Err(()), |_, _| waits.set(waits.get() + 1));
        assert_eq!(result, Some(Err(())));
        assert_eq!(waits.get(), 0);
    }
}
