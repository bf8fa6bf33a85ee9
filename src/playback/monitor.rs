use std::sync::{Arc, Mutex};

use super::resource::{AudioResource, ListenerId};
use super::state::PlaybackState;

/// Bridges an event-driven [`AudioResource`] into a pull-based
/// "read latest snapshot" contract.
///
/// Renderers call [`snapshot`](PlaybackMonitor::snapshot) whenever a change
/// notification arrives (or on their own tick); the monitor re-derives the
/// state and hands back the previously cached `Arc` unchanged whenever
/// [`PlaybackState::equal`] holds, so a renderer can rely on pointer
/// identity to skip redundant work.
pub struct PlaybackMonitor {
    inner: Mutex<MonitorInner>,
}

struct MonitorInner {
    resource: Option<Arc<dyn AudioResource>>,
    cached: Arc<PlaybackState>,
}

impl PlaybackMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                resource: None,
                cached: Arc::new(PlaybackState::EMPTY),
            }),
        }
    }

    /// Attach the resource to observe. Replaces any previous attachment
    /// and resets the cached snapshot.
    pub fn attach(&self, resource: Arc<dyn AudioResource>) {
        let mut inner = self.inner.lock().unwrap();
        inner.resource = Some(resource);
        inner.cached = Arc::new(PlaybackState::EMPTY);
    }

    pub fn detach(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.resource = None;
        inner.cached = Arc::new(PlaybackState::EMPTY);
    }

    /// Register `on_change` to run on every resource notification. The
    /// returned guard removes exactly that registration when dropped; with
    /// no resource attached nothing is registered and the guard is a no-op.
    pub fn subscribe(
        &self,
        on_change: impl Fn() + Send + Sync + 'static,
    ) -> MonitorSubscription {
        let inner = self.inner.lock().unwrap();
        let Some(resource) = inner.resource.clone() else {
            return MonitorSubscription { registration: None };
        };
        let on_change = Arc::new(on_change);
        let id = resource.add_listener(Arc::new(move |_event| on_change()));
        MonitorSubscription {
            registration: Some((resource, id)),
        }
    }

    /// Current snapshot, deduplicated: the cached `Arc` is returned
    /// pointer-identical while the freshly derived state is equal to it.
    pub fn snapshot(&self) -> Arc<PlaybackState> {
        let mut inner = self.inner.lock().unwrap();
        let Some(resource) = inner.resource.clone() else {
            return inner.cached.clone();
        };
        let next = PlaybackState::from_resource(resource.as_ref());
        if !PlaybackState::equal(&inner.cached, &next) {
            inner.cached = Arc::new(next);
        }
        inner.cached.clone()
    }
}

impl Default for PlaybackMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one [`PlaybackMonitor::subscribe`] call; dropping it detaches
/// the listener it registered.
pub struct MonitorSubscription {
    registration: Option<(Arc<dyn AudioResource>, ListenerId)>,
}

impl Drop for MonitorSubscription {
    fn drop(&mut self) {
        if let Some((resource, id)) = self.registration.take() {
            resource.remove_listener(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::super::resource::test_support::MockResource;
    use super::super::resource::MediaEvent;
    use super::super::state::PlaybackStatus;
    use super::*;

    #[test]
    fn snapshot_without_resource_is_the_empty_state() {
        let monitor = PlaybackMonitor::new();
        let a = monitor.snapshot();
        let b = monitor.snapshot();
        assert_eq!(a.status, PlaybackStatus::Empty);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn snapshot_is_cached_while_states_are_equal() {
        let resource = Arc::new(MockResource::playing(60.0, 10.0));
        let monitor = PlaybackMonitor::new();
        monitor.attach(resource.clone());

        let first = monitor.snapshot();
        assert_eq!(first.status, PlaybackStatus::Playing);

        // below the 2-decimal tolerance: same instance
        *resource.current_time.lock().unwrap() = 10.004;
        let second = monitor.snapshot();
        assert!(Arc::ptr_eq(&first, &second));

        // past the tolerance: new instance
        *resource.current_time.lock().unwrap() = 11.0;
        let third = monitor.snapshot();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.current_time, 11.0);
    }

    #[test]
    fn subscribe_registers_and_drop_removes_one_listener() {
        let resource = Arc::new(MockResource::playing(60.0, 0.0));
        let monitor = PlaybackMonitor::new();
        monitor.attach(resource.clone());

        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let subscription = monitor.subscribe(move || {
            calls_in.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(resource.listener_count(), 1);

        resource.emit(MediaEvent::TimeUpdate);
        resource.emit(MediaEvent::Ended);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(subscription);
        assert_eq!(resource.listener_count(), 0);
        resource.emit(MediaEvent::TimeUpdate);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribe_without_resource_is_a_noop() {
        let monitor = PlaybackMonitor::new();
        let subscription = monitor.subscribe(|| panic!("must never fire"));
        drop(subscription);
    }

    #[test]
    fn detach_resets_to_empty() {
        let resource = Arc::new(MockResource::playing(60.0, 10.0));
        let monitor = PlaybackMonitor::new();
        monitor.attach(resource);
        assert_eq!(monitor.snapshot().status, PlaybackStatus::Playing);

        monitor.detach();
        assert_eq!(monitor.snapshot().status, PlaybackStatus::Empty);
    }
}
