use crate::services::compositor::{CompositorService, EventKind, SubscriptionToken};
use log::debug;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Notify;

/// Events that change what the taskbar shows.
pub const TASKBAR_EVENTS: [EventKind; 5] = [
    EventKind::WorkspaceActivated,
    EventKind::WindowFocusChanged,
    EventKind::WindowOpenedOrChanged,
    EventKind::WindowClosed,
    EventKind::WindowLayoutsChanged,
];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Lifecycle {
    Active(SubscriptionToken),
    Destroyed,
}

#[derive(Default)]
struct Pending {
    requested: AtomicBool,
    notify: Notify,
}

impl Pending {
    fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Turns compositor events into coalesced update requests.
///
/// Any number of events between two passes collapse into one request. After
/// [`TaskbarEvents::unregister`] no request is ever reported again.
pub struct TaskbarEvents {
    service: Arc<CompositorService>,
    pending: Arc<Pending>,
    state: Lifecycle,
}

impl TaskbarEvents {
    /// Registers for [`TASKBAR_EVENTS`] and requests the initial pass.
    pub fn register(service: Arc<CompositorService>) -> Self {
        let pending = Arc::new(Pending::default());

        let token = service.register_for_ipc(&TASKBAR_EVENTS, {
            let pending = Arc::clone(&pending);
            move |kind| {
                debug!("taskbar update requested by {kind:?}");
                pending.request();
            }
        });
        pending.request();

        Self {
            service,
            pending,
            state: Lifecycle::Active(token),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, Lifecycle::Active(_))
    }

    /// Consumes the pending request, if any.
    pub fn take_pending(&self) -> bool {
        self.is_active() && self.pending.requested.swap(false, Ordering::AcqRel)
    }

    /// A handle to await requests with while the taskbar itself is borrowed.
    pub fn waiter(&self) -> UpdateWaiter {
        UpdateWaiter {
            pending: Arc::clone(&self.pending),
        }
    }

    pub fn unregister(&mut self) {
        if let Lifecycle::Active(token) = self.state {
            self.state = Lifecycle::Destroyed;
            self.service.unregister_for_ipc(token);
            self.pending.requested.store(false, Ordering::Release);
        }
    }
}

pub struct UpdateWaiter {
    pending: Arc<Pending>,
}

impl UpdateWaiter {
    /// Resolves once a request came in since the last wake-up. Wake-ups can be
    /// spurious: check [`TaskbarEvents::take_pending`] afterwards.
    pub async fn wait(&self) {
        self.pending.notify.notified().await;
    }
}

impl Drop for TaskbarEvents {
    fn drop(&mut self) {
        self.unregister();
    }
}
