//! Session store: the signed-in user and the one-time auth-ready flag.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info};

use crate::core::{
    auth::{AuthError, AuthProvider, UserIdentity},
    db::{DocumentStore, Gateway},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub current_user: Option<UserIdentity>,
    /// Set once the auth service has reported its initial state. Never reset.
    pub ready: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// Backend detail is logged, never carried here.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Sign-out failed: {0}")]
    SignOut(#[source] AuthError),
}

struct SessionInner<S, A> {
    gateway: Gateway<S, A>,
    session: Arc<watch::Sender<Session>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    /// Set by a local logout until the provider reports no user.
    signed_out: Arc<AtomicBool>,
}

/// Process-wide session store.
///
/// The auth-state listener registered by [`AuthSession::init_auth`] is owned
/// by the process: it is never unregistered and runs until the runtime shuts
/// down or the provider closes its stream.
pub struct AuthSession<S, A> {
    inner: Arc<SessionInner<S, A>>,
}

impl<S, A> Clone for AuthSession<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentStore, A: AuthProvider> AuthSession<S, A> {
    pub fn new(gateway: Gateway<S, A>) -> Self {
        let (session, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(SessionInner {
                gateway,
                session: Arc::new(session),
                listener: Mutex::new(None),
                signed_out: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    /// Register the auth-state listener. Later calls are no-ops.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init_auth(&self) {
        let mut listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            debug!("auth listener already registered");
            return;
        }

        let mut stream = self.inner.gateway.on_auth_state_changed();
        let session = Arc::clone(&self.inner.session);
        let signed_out = Arc::clone(&self.inner.signed_out);
        *listener = Some(tokio::spawn(async move {
            while let Some(user) = stream.next().await {
                if user.is_none() {
                    signed_out.store(false, Ordering::SeqCst);
                } else if signed_out.load(Ordering::SeqCst) {
                    // Sign-in notified before the local logout.
                    debug!("ignoring stale user after logout");
                    session.send_if_modified(|session| !std::mem::replace(&mut session.ready, true));
                    continue;
                }
                info!(
                    uid = user.as_ref().map(|u| u.uid.as_str()),
                    "auth state changed"
                );
                session.send_modify(|session| {
                    session.current_user = user;
                    session.ready = true;
                });
            }
            debug!("auth state stream closed");
        }));
    }

    /// Sign in. The session picks the user up through the auth listener.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserIdentity, SessionError> {
        self.inner.signed_out.store(false, Ordering::SeqCst);
        self.inner
            .gateway
            .sign_in(email, password)
            .await
            .map_err(|err| {
                error!(email, error = %err, "login failed");
                SessionError::InvalidCredentials
            })
    }

    /// Clear the local user, then sign out remotely.
    ///
    /// The local session is cleared even when the remote call is slow or fails.
    /// Sign-in notifications still queued from before the logout are ignored
    /// until the provider reports no user or the next login.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.inner.signed_out.store(true, Ordering::SeqCst);
        self.inner
            .session
            .send_modify(|session| session.current_user = None);
        self.inner.gateway.sign_out().await.map_err(|err| {
            error!(error = %err, "sign-out failed");
            SessionError::SignOut(err)
        })
    }

    /// Resolve once the auth service has reported its initial state.
    /// Returns immediately if that already happened.
    pub async fn wait_until_ready(&self) {
        let mut receiver = self.inner.session.subscribe();
        let _ = receiver.wait_for(|session| session.ready).await;
    }

    /// Resolve once the session holds the user with `uid`.
    pub async fn wait_for_user(&self, uid: &str) {
        let mut receiver = self.inner.session.subscribe();
        let _ = receiver
            .wait_for(|session| {
                session
                    .current_user
                    .as_ref()
                    .is_some_and(|user| user.uid == uid)
            })
            .await;
    }

    pub fn is_ready(&self) -> bool {
        self.inner.session.borrow().ready
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.inner.session.borrow().current_user.clone()
    }

    pub fn session(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }
}
