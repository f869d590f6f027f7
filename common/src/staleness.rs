use tracing::warn;

/// A value that silently turns back into "unknown" once it has not been
/// refreshed for longer than `max_age_ms`.
///
/// Expiry is evaluated lazily: every read goes through [`Stale::expire`]
/// with the caller's clock, so there is no background timer.
#[derive(Debug, Clone)]
pub struct Stale<T> {
    label: &'static str,
    value: Option<T>,
    updated_ms: Option<u64>,
    max_age_ms: u64,
}

impl<T> Stale<T> {
    pub fn new(label: &'static str, max_age_ms: u64) -> Self {
        Self {
            label,
            value: None,
            updated_ms: None,
            max_age_ms,
        }
    }

    pub fn max_age_ms(&self) -> u64 {
        self.max_age_ms
    }

    pub fn set(&mut self, value: T, now_ms: u64) {
        self.value = Some(value);
        self.updated_ms = Some(now_ms);
    }

    pub fn updated_ms(&self) -> Option<u64> {
        self.updated_ms
    }

    /// Drops the value when the last update is older than the allowed age.
    ///
    /// Returns `true` whenever the window has lapsed. The update timestamp is
    /// kept, so data attached to it by the caller keeps expiring until the
    /// next [`Stale::set`]; the warning fires only when a value is dropped.
    pub fn expire(&mut self, now_ms: u64) -> bool {
        let Some(updated) = self.updated_ms else {
            return false;
        };

        let age_ms = now_ms.saturating_sub(updated);
        if age_ms <= self.max_age_ms {
            return false;
        }

        if self.value.take().is_some() {
            warn!(
                "invalidating {} due to age ({} ms old, max {} ms)",
                self.label, age_ms, self.max_age_ms
            );
        }
        true
    }

    pub fn get(&mut self, now_ms: u64) -> Option<&T> {
        self.expire(now_ms);
        self.value.as_ref()
    }

    /// Current value without an age check. Callers that must honour the age
    /// policy use [`Stale::get`].
    pub fn peek(&self) -> Option<&T> {
        self.value.as_ref()
    }
}
