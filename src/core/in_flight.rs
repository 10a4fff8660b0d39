use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Idle/Running flag for one guarded task of one chain.
///
/// `try_enter` flips Idle -> Running and hands out a token; dropping the token
/// flips back to Idle, whatever way the task ended.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    running: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct InFlightToken {
    running: Arc<AtomicBool>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// None when a run is already in flight
    pub fn try_enter(&self) -> Option<InFlightToken> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightToken {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_entry_is_refused_until_token_drops() {
        let guard = InFlightGuard::new();
        let token = guard.try_enter().expect("idle guard");
        assert!(guard.is_running());
        assert!(guard.try_enter().is_none());

        drop(token);
        assert!(!guard.is_running());
        assert!(guard.try_enter().is_some());
    }

    #[test]
    fn clones_share_state() {
        let guard = InFlightGuard::new();
        let other = guard.clone();
        let _token = guard.try_enter().unwrap();
        assert!(other.try_enter().is_none());
    }

    #[tokio::test]
    async fn token_released_when_task_fails() {
        let guard = InFlightGuard::new();
        let task_guard = guard.clone();
        let result = tokio::spawn(async move {
            let _token = task_guard.try_enter().unwrap();
            Err::<(), _>("boom")
        })
        .await
        .unwrap();

        assert!(result.is_err());
        assert!(!guard.is_running());
    }
}
