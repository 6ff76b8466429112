//! Toast notifications and the yes/no confirmation dialog.

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tracing::debug;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);
pub const DEFAULT_CONFIRM_TITLE: &str = "Confirm action";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    #[default]
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
}

/// What the confirmation dialog shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmDialog {
    pub open: bool,
    pub title: String,
    pub message: String,
    /// Requests waiting, including the one shown.
    pub pending: usize,
}

struct PendingConfirm {
    title: String,
    message: String,
    responder: oneshot::Sender<bool>,
}

/// Answer to a [`Notifications::confirm`] request.
///
/// Resolves to `false` if the request is dropped without an answer.
#[derive(Debug)]
pub struct ConfirmReply {
    receiver: oneshot::Receiver<bool>,
}

impl Future for ConfirmReply {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|answer| answer.unwrap_or(false))
    }
}

struct NotifyInner {
    toasts: watch::Sender<Vec<Toast>>,
    next_id: AtomicU64,
    default_duration: Duration,
    dialog: watch::Sender<ConfirmDialog>,
    queue: Mutex<VecDeque<PendingConfirm>>,
}

impl NotifyInner {
    fn remove(&self, id: u64) -> bool {
        self.toasts.send_if_modified(|toasts| {
            match toasts.iter().position(|toast| toast.id == id) {
                Some(index) => {
                    toasts.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<PendingConfirm>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop abandoned requests at the head, then show the head or close.
    fn publish(&self, queue: &mut VecDeque<PendingConfirm>) {
        while queue
            .front()
            .is_some_and(|pending| pending.responder.is_closed())
        {
            queue.pop_front();
        }
        let dialog = match queue.front() {
            Some(head) => ConfirmDialog {
                open: true,
                title: head.title.clone(),
                message: head.message.clone(),
                pending: queue.len(),
            },
            None => ConfirmDialog::default(),
        };
        self.dialog.send_replace(dialog);
    }
}

/// Process-wide notification state. Clones share the same toasts and dialog.
#[derive(Clone)]
pub struct Notifications {
    inner: Arc<NotifyInner>,
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("toasts", &*self.inner.toasts.borrow())
            .field("dialog", &*self.inner.dialog.borrow())
            .finish()
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl Notifications {
    pub fn new(default_duration: Duration) -> Self {
        let (toasts, _) = watch::channel(Vec::new());
        let (dialog, _) = watch::channel(ConfirmDialog::default());
        Self {
            inner: Arc::new(NotifyInner {
                toasts,
                next_id: AtomicU64::new(0),
                default_duration,
                dialog,
                queue: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Show a toast and return its id.
    ///
    /// It is removed after `duration`; a zero duration keeps it until
    /// [`Notifications::remove`]. Must be called from within a tokio runtime
    /// when `duration` is non-zero.
    pub fn show(&self, message: impl Into<String>, kind: ToastKind, duration: Duration) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let message = message.into();
        debug!(id, ?kind, message = %message, "toast");
        self.inner.toasts.send_modify(|toasts| {
            toasts.push(Toast { id, message, kind });
        });

        if !duration.is_zero() {
            let inner = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                if let Some(inner) = inner.upgrade() {
                    inner.remove(id);
                }
            });
        }
        id
    }

    /// Remove a toast. Returns false if it was already gone.
    pub fn remove(&self, id: u64) -> bool {
        self.inner.remove(id)
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.show(message, ToastKind::Success, self.inner.default_duration)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(message, ToastKind::Error, self.inner.default_duration)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.show(message, ToastKind::Info, self.inner.default_duration)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.show(message, ToastKind::Warning, self.inner.default_duration)
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.inner.toasts.borrow().clone()
    }

    pub fn subscribe_toasts(&self) -> watch::Receiver<Vec<Toast>> {
        self.inner.toasts.subscribe()
    }

    /// Ask a yes/no question.
    ///
    /// Requests are queued and shown one at a time in call order; each reply
    /// settles when its own request is answered.
    pub fn confirm(&self, message: impl Into<String>, title: Option<&str>) -> ConfirmReply {
        let (responder, receiver) = oneshot::channel();
        let mut queue = self.inner.queue();
        queue.push_back(PendingConfirm {
            title: title.unwrap_or(DEFAULT_CONFIRM_TITLE).to_string(),
            message: message.into(),
            responder,
        });
        self.inner.publish(&mut queue);
        ConfirmReply { receiver }
    }

    /// Answer the request currently shown. No-op when nothing is pending.
    pub fn resolve_confirm(&self, value: bool) {
        let mut queue = self.inner.queue();
        if let Some(head) = queue.pop_front() {
            if head.responder.send(value).is_err() {
                debug!("confirm caller went away before the answer");
            }
        }
        self.inner.publish(&mut queue);
    }

    pub fn dialog(&self) -> ConfirmDialog {
        self.inner.dialog.borrow().clone()
    }

    pub fn subscribe_dialog(&self) -> watch::Receiver<ConfirmDialog> {
        self.inner.dialog.subscribe()
    }
}
