use crate::error::UsbError;

/// Retry decorator: attempt `op` up to `retries + 1` times.
///
/// Every failed attempt logs a warning with its attempt index; once
/// attempts are exhausted the last error propagates unchanged. `retries ==
/// 0` runs `op` exactly once with no retry bookkeeping, matching the
/// original tool's `@repetible` decorator, which is a no-op when
/// `cmd_retries == 0`.
pub fn retrying<T>(
    retries: u32,
    mut op: impl FnMut() -> Result<T, UsbError>,
) -> Result<T, UsbError> {
    if retries == 0 {
        return op();
    }

    let attempts = retries + 1;
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!("attempt #{attempt} failed: {e}");
                last_err = Some(e);
            }
        }
    }
    log::warn!("all {attempts} attempts failed");
    Err(last_err.expect("loop runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn succeeds_without_retry_when_first_attempt_works() {
        let calls = Cell::new(0);
        let result: Result<u32, UsbError> = retrying(3, || {
            calls.set(calls.get() + 1);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retries_until_exhausted_then_propagates_last_error() {
        let calls = Cell::new(0);
        let result: Result<u32, UsbError> = retrying(2, || {
            calls.set(calls.get() + 1);
            Err(UsbError::Timeout(Duration::from_millis(1)))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn zero_retries_runs_exactly_once() {
        let calls = Cell::new(0);
        let result: Result<u32, UsbError> = retrying(0, || {
            calls.set(calls.get() + 1);
            Err(UsbError::Timeout(Duration::from_millis(1)))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn recovers_on_a_later_attempt() {
        let calls = Cell::new(0);
        let result: Result<u32, UsbError> = retrying(3, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(UsbError::Timeout(Duration::from_millis(1)))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }
}
