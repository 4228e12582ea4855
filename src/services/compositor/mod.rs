pub mod niri;
pub mod types;

pub use self::types::{CompositorState, EventKind, Window, WindowLayout, Workspace};

use anyhow::Result;
use log::debug;
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};

/// Outbound side of the compositor connection.
pub trait CommandTransport: Send + Sync {
    /// Queues a command without waiting for the compositor's reply.
    fn send(&self, command: serde_json::Value) -> Result<()>;
}

/// Returned by [`CompositorService::register_for_ipc`], needed to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler = Box<dyn Fn(EventKind) + Send + Sync>;

struct Listener {
    token: SubscriptionToken,
    kinds: Vec<EventKind>,
    handler: Handler,
}

/// Shared compositor snapshot plus the listener registry.
///
/// One instance is shared by every module through an `Arc`. The event reader
/// only keeps a weak reference, so the service goes away with its last module.
pub struct CompositorService {
    state: Mutex<CompositorState>,
    listeners: Mutex<Vec<Listener>>,
    next_token: AtomicU64,
    transport: Box<dyn CommandTransport>,
}

impl CompositorService {
    pub fn new(state: CompositorState, transport: Box<dyn CommandTransport>) -> Self {
        Self {
            state: Mutex::new(state),
            listeners: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
            transport,
        }
    }

    /// Locks the snapshot. Hold the guard for one consistent read, then drop
    /// it before doing any rendering or IO.
    pub fn lock_data(&self) -> MutexGuard<'_, CompositorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers `handler` for the given event kinds.
    ///
    /// Handlers run on the event reader's task while the registry is locked:
    /// they must be cheap and must not register or unregister listeners.
    pub fn register_for_ipc<F>(&self, kinds: &[EventKind], handler: F) -> SubscriptionToken
    where
        F: Fn(EventKind) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.listeners().push(Listener {
            token,
            kinds: kinds.to_vec(),
            handler: Box::new(handler),
        });
        debug!("registered listener {token:?} for {kinds:?}");

        token
    }

    /// Removes a listener. Once this returns, the handler is never called again.
    pub fn unregister_for_ipc(&self, token: SubscriptionToken) -> bool {
        let mut listeners = self.listeners();
        let len_before = listeners.len();
        listeners.retain(|l| l.token != token);
        debug!("unregistered listener {token:?}");

        listeners.len() < len_before
    }

    pub fn send(&self, command: serde_json::Value) -> Result<()> {
        self.transport.send(command)
    }

    /// Mutates the snapshot under the lock, then notifies listeners of `kind`
    /// after the lock is released.
    pub fn apply(&self, kind: EventKind, f: impl FnOnce(&mut CompositorState)) {
        {
            let mut state = self.lock_data();
            f(&mut state);
        }
        self.dispatch(kind);
    }

    fn dispatch(&self, kind: EventKind) {
        for listener in self.listeners().iter() {
            if listener.kinds.contains(&kind) {
                (listener.handler)(kind);
            }
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CompositorService {
    fn drop(&mut self) {
        debug!("compositor service dropped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    pub(crate) struct RecordingTransport {
        pub sent: Arc<Mutex<Vec<serde_json::Value>>>,
        pub fail: bool,
    }

    impl CommandTransport for RecordingTransport {
        fn send(&self, command: serde_json::Value) -> Result<()> {
            if self.fail {
                anyhow::bail!("socket closed");
            }
            self.sent.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn service() -> CompositorService {
        CompositorService::new(
            CompositorState::default(),
            Box::new(RecordingTransport::default()),
        )
    }

    #[test]
    fn dispatch_only_reaches_registered_kinds() {
        let service = service();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        service.register_for_ipc(&[EventKind::WindowClosed], move |k| {
            sink.lock().unwrap().push(k)
        });

        service.apply(EventKind::WorkspacesChanged, |_| {});
        service.apply(EventKind::WindowClosed, |_| {});

        assert_eq!(*seen.lock().unwrap(), vec![EventKind::WindowClosed]);
    }

    #[test]
    fn unregistered_listener_is_not_called() {
        let service = service();
        let count = Arc::new(Mutex::new(0));
        let sink = count.clone();
        let token = service.register_for_ipc(&[EventKind::WindowClosed], move |_| {
            *sink.lock().unwrap() += 1
        });

        service.apply(EventKind::WindowClosed, |_| {});
        assert!(service.unregister_for_ipc(token));
        assert!(!service.unregister_for_ipc(token));
        service.apply(EventKind::WindowClosed, |_| {});

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn apply_updates_the_snapshot() {
        let service = service();
        service.apply(EventKind::WorkspacesChanged, |state| {
            state.workspaces.push(Workspace {
                id: 3,
                output: "DP-1".to_string(),
                is_active: true,
                active_window_id: None,
            });
        });

        let state = service.lock_data();
        assert_eq!(state.workspaces().len(), 1);
        assert!(state.windows().is_empty());
    }

    #[test]
    fn send_goes_through_the_transport() {
        let transport = RecordingTransport::default();
        let service =
            CompositorService::new(CompositorState::default(), Box::new(transport.clone()));

        service
            .send(serde_json::json!({"Action": {"CloseWindow": {"id": 4}}}))
            .unwrap();

        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }
}
