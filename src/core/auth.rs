use std::{
    collections::HashMap,
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("auth/invalid-credential")]
    InvalidCredential,

    #[error("auth/user-disabled")]
    UserDisabled,

    #[error("auth/network-request-failed: {0}")]
    Network(String),
}

/// What the auth service currently knows about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// A persisted session is still being restored.
    Restoring,
    Resolved(Option<UserIdentity>),
}

/// Stream of auth-state notifications.
///
/// The first item is the restored (possibly absent) user; later items follow
/// every sign-in and sign-out. Intermediate states may be coalesced.
#[derive(Debug)]
pub struct AuthStateStream {
    receiver: watch::Receiver<AuthState>,
    primed: bool,
}

impl AuthStateStream {
    pub fn new(receiver: watch::Receiver<AuthState>) -> Self {
        Self {
            receiver,
            primed: false,
        }
    }

    /// `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<Option<UserIdentity>> {
        loop {
            if self.primed {
                self.receiver.changed().await.ok()?;
            }
            self.primed = true;
            if let AuthState::Resolved(user) = &*self.receiver.borrow_and_update() {
                return Some(user.clone());
            }
        }
    }
}

/// The hosted authentication service.
pub trait AuthProvider: Send + Sync + 'static {
    fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn on_auth_state_changed(&self) -> AuthStateStream;
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: UserIdentity,
    disabled: bool,
}

/// Email/password accounts held in memory.
#[derive(Debug)]
pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<AuthState>,
    sign_out_failure: Mutex<Option<AuthError>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    /// A provider whose initial state (no user) is known immediately.
    pub fn new() -> Self {
        Self::with_state(AuthState::Resolved(None))
    }

    /// A provider that holds back its first notification until `finish_restore`.
    pub fn restoring() -> Self {
        Self::with_state(AuthState::Restoring)
    }

    fn with_state(state: AuthState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
            sign_out_failure: Mutex::new(None),
        }
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, email: &str, password: &str, display_name: Option<&str>) -> UserIdentity {
        let user = UserIdentity {
            uid: Uuid::new_v4().simple().to_string(),
            email: Some(email.to_string()),
            display_name: display_name.map(str::to_string),
        };
        self.accounts().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
                disabled: false,
            },
        );
        user
    }

    pub fn disable(&self, email: &str) {
        if let Some(account) = self.accounts().get_mut(email) {
            account.disabled = true;
        }
    }

    /// Complete session restoration with the given user.
    pub fn finish_restore(&self, user: Option<UserIdentity>) {
        self.state.send_replace(AuthState::Resolved(user));
    }

    /// Make the next sign-out fail with `error`.
    pub fn fail_sign_out(&self, error: AuthError) {
        *self
            .sign_out_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        match &*self.state.borrow() {
            AuthState::Resolved(user) => user.clone(),
            AuthState::Restoring => None,
        }
    }
}

impl AuthProvider for MemoryAuth {
    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserIdentity, AuthError> {
        let user = {
            let accounts = self.accounts();
            match accounts.get(email) {
                Some(account) if account.password == password && account.disabled => {
                    return Err(AuthError::UserDisabled);
                }
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(AuthError::InvalidCredential),
            }
        };
        debug!(uid = %user.uid, "signed in");
        self.state.send_replace(AuthState::Resolved(Some(user.clone())));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let failure = self
            .sign_out_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(err) = failure {
            return Err(err);
        }
        self.state.send_replace(AuthState::Resolved(None));
        Ok(())
    }

    fn on_auth_state_changed(&self) -> AuthStateStream {
        AuthStateStream::new(self.state.subscribe())
    }
}
