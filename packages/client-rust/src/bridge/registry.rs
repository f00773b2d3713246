//! Channel registry: the shared mapping from event-channel name to active
//! listeners.
//!
//! This is the one piece of process-wide shared state in the pipeline. The
//! only mutators are add and remove, both safe to call repeatedly and
//! concurrently with emission. Emission iterates a snapshot of the listeners
//! registered at emit time: registrations made mid-emit are not included,
//! and a removed listener never fires again. Nothing is buffered — an event
//! emitted with no listener on the channel is lost (at-most-once, no
//! replay).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Listener callback registered on a channel. Receives the opaque event
/// payload; the registry forwards a signal, not a diff.
pub type Listener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    listener: Listener,
}

// ---------------------------------------------------------------------------
// ListenerHandle
// ---------------------------------------------------------------------------

/// Deregistration handle for exactly one listener. Two registrations of the
/// same callback yield two distinct handles; each is torn down
/// independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    channel: String,
    id: u64,
}

impl ListenerHandle {
    /// Channel this handle's listener was registered on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

// ---------------------------------------------------------------------------
// ChannelRegistry
// ---------------------------------------------------------------------------

/// Mapping from channel name to its active listeners.
///
/// Passed around as `Arc<ChannelRegistry>`; never accessed as ambient global
/// state.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener on the named channel. No deduplication: every
    /// call adds an independent listener, even for an identical callback.
    pub fn on(&self, channel: &str, listener: Listener) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(ListenerEntry { id, listener });
        ListenerHandle {
            channel: channel.to_string(),
            id,
        }
    }

    /// Removes the listener behind the handle. Idempotent: removing an
    /// already-removed listener is a no-op, since explicit unsubscribe and
    /// upstream cancellation may race.
    pub fn off(&self, handle: &ListenerHandle) {
        if let Some(mut entry) = self.channels.get_mut(&handle.channel) {
            entry.retain(|listener| listener.id != handle.id);
        }
        self.channels
            .remove_if(&handle.channel, |_name, listeners| listeners.is_empty());
    }

    /// Fires every listener currently registered on the channel with the
    /// payload. Listeners are invoked outside the map lock, so a listener
    /// may register or deregister (on this or any channel) without
    /// deadlocking; such mutations take effect for subsequent emissions.
    pub fn emit(&self, channel: &str, payload: &serde_json::Value) {
        let snapshot: Vec<Listener> = self.channels.get(channel).map_or_else(Vec::new, |entry| {
            entry
                .iter()
                .map(|listener| Arc::clone(&listener.listener))
                .collect()
        });
        for listener in snapshot {
            listener(payload);
        }
    }

    /// Number of active listeners on the channel.
    #[must_use]
    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |entry| entry.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Arc::new(move |_payload| {
            counter.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn emit_reaches_registered_listeners_only() {
        let registry = ChannelRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        // Fired before registration: lost, no buffering.
        registry.emit("updated", &json!(1));
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        let handle = registry.on("updated", counting_listener(&hits));
        registry.emit("updated", &json!(2));
        registry.emit("other", &json!(3));
        assert_eq!(hits.load(Ordering::Relaxed), 1);

        registry.off(&handle);
        registry.emit("updated", &json!(4));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn duplicate_registrations_are_independent() {
        let registry = ChannelRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = registry.on("updated", counting_listener(&hits));
        let second = registry.on("updated", counting_listener(&hits));
        assert_ne!(first, second);
        assert_eq!(registry.listener_count("updated"), 2);

        registry.emit("updated", &json!(null));
        assert_eq!(hits.load(Ordering::Relaxed), 2);

        registry.off(&first);
        registry.emit("updated", &json!(null));
        assert_eq!(hits.load(Ordering::Relaxed), 3);
        assert_eq!(registry.listener_count("updated"), 1);

        registry.off(&second);
        assert_eq!(registry.listener_count("updated"), 0);
    }

    #[test]
    fn off_is_idempotent() {
        let registry = ChannelRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let handle = registry.on("updated", counting_listener(&hits));

        registry.off(&handle);
        registry.off(&handle);
        registry.emit("updated", &json!(null));
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn listener_payload_is_forwarded_verbatim() {
        let registry = ChannelRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = registry.on(
            "updated",
            Arc::new(move |payload| sink.lock().push(payload.clone())),
        );

        registry.emit("updated", &json!({"table": "posts"}));
        assert_eq!(&*seen.lock(), &[json!({"table": "posts"})]);
    }

    #[test]
    fn registration_from_inside_a_listener_does_not_deadlock() {
        let registry = Arc::new(ChannelRegistry::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_registry = Arc::clone(&registry);
        let inner_hits = Arc::clone(&hits);
        let _handle = registry.on(
            "updated",
            Arc::new(move |_payload| {
                // Mid-emit registration: takes effect next emission only.
                let _ = inner_registry.on("updated", counting_listener(&inner_hits));
            }),
        );

        registry.emit("updated", &json!(null));
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        registry.emit("updated", &json!(null));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
