use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long an endpoint stays out of rotation after a disqualifying failure.
pub const COOLDOWN_WINDOW: Duration = Duration::from_millis(60_000);

/// Endpoint -> instant of its last disqualifying failure.
///
/// Entries are only purged lazily, when a caller asks for the current
/// candidates. An endpoint is eligible again once strictly more than the
/// window has elapsed since its stamp.
#[derive(Debug)]
pub struct CooldownTable {
    entries: HashMap<String, Instant>,
    window: Duration,
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self::new(COOLDOWN_WINDOW)
    }
}

impl CooldownTable {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            window,
        }
    }

    /// Drops every entry whose window elapsed, returning the restored endpoints.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<String> {
        let window = self.window;
        let mut restored = Vec::new();
        self.entries.retain(|endpoint, stamp| {
            let keep = now.saturating_duration_since(*stamp) <= window;
            if !keep {
                restored.push(endpoint.clone());
            }
            keep
        });
        restored
    }

    /// Stamps the endpoint, overwriting an older stamp.
    pub fn isolate(&mut self, endpoint: &str, now: Instant) {
        self.entries.insert(endpoint.to_string(), now);
    }

    pub fn is_isolated(&self, endpoint: &str) -> bool {
        self.entries.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_stays_isolated_until_window_strictly_elapses() {
        let mut table = CooldownTable::default();
        let failed_at = Instant::now();
        table.isolate("http://e1", failed_at);

        table.purge_expired(failed_at + Duration::from_millis(59_999));
        assert!(table.is_isolated("http://e1"));

        table.purge_expired(failed_at + Duration::from_millis(60_000));
        assert!(table.is_isolated("http://e1"));

        let restored = table.purge_expired(failed_at + Duration::from_millis(60_001));
        assert_eq!(restored, vec!["http://e1".to_string()]);
        assert!(!table.is_isolated("http://e1"));
        assert!(table.is_empty());
    }

    #[test]
    fn later_failure_overwrites_stamp() {
        let mut table = CooldownTable::default();
        let first = Instant::now();
        table.isolate("http://e1", first);
        table.isolate("http://e1", first + Duration::from_secs(30));
        assert_eq!(table.len(), 1);

        table.purge_expired(first + Duration::from_millis(60_001));
        assert!(table.is_isolated("http://e1"));

        table.purge_expired(first + Duration::from_millis(90_001));
        assert!(!table.is_isolated("http://e1"));
    }

    #[test]
    fn purge_only_touches_expired_entries() {
        let mut table = CooldownTable::new(Duration::from_secs(10));
        let now = Instant::now();
        table.isolate("http://old", now);
        table.isolate("http://new", now + Duration::from_secs(8));

        table.purge_expired(now + Duration::from_secs(11));
        assert!(!table.is_isolated("http://old"));
        assert!(table.is_isolated("http://new"));
    }
}
