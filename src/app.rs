//! The admin console wired together: one gateway shared by the session,
//! the sync modules, the notifications and the router.

use anyhow::Context;
use tracing::{info, warn};

use crate::{
    config::Config,
    core::{
        auth::{AuthProvider, UserIdentity},
        db::{DocumentStore, Gateway},
        notify::Notifications,
        router::{
            AuthGuard, HOME_PATH, LOGIN_PATH, NavigationOutcome, RouteError, Router,
            default_routes,
        },
        session::AuthSession,
        sync::{Attendees, ProjectDetail, Projects},
    },
};

pub const APP_NAME: &str = "Folio Admin";

pub struct AdminApp<S, A> {
    gateway: Gateway<S, A>,
    session: AuthSession<S, A>,
    notifications: Notifications,
    router: Router<AuthGuard<S, A>>,
}

impl<S: DocumentStore, A: AuthProvider> AdminApp<S, A> {
    pub fn new(gateway: Gateway<S, A>, config: &Config) -> Self {
        let session = AuthSession::new(gateway.clone());
        let router = Router::new(default_routes(), AuthGuard::new(session.clone()));
        Self {
            gateway,
            session,
            notifications: Notifications::new(config.toast_duration),
            router,
        }
    }

    /// Start listening for auth state. Later calls are no-ops.
    /// Must run inside a tokio runtime.
    pub fn start(&self) {
        self.session.init_auth();
    }

    pub fn gateway(&self) -> &Gateway<S, A> {
        &self.gateway
    }

    pub fn session(&self) -> &AuthSession<S, A> {
        &self.session
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn router(&self) -> &Router<AuthGuard<S, A>> {
        &self.router
    }

    pub fn projects(&self) -> Projects<S, A> {
        Projects::new(self.gateway.clone())
    }

    pub fn project_detail(&self) -> ProjectDetail<S, A> {
        ProjectDetail::new(self.gateway.clone())
    }

    pub fn attendees(&self) -> Attendees<S, A> {
        Attendees::new(self.gateway.clone())
    }

    pub fn document_title(&self) -> String {
        self.router.document_title(APP_NAME)
    }

    /// Navigate through the auth guard. Starts the auth listener if needed,
    /// since the guard waits for the session to become ready.
    pub async fn navigate(&self, path: &str) -> Result<NavigationOutcome, RouteError> {
        self.start();
        self.router.push(path).await
    }

    /// Sign in and land on the home route. Failures are shown as an error toast.
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<UserIdentity> {
        self.start();
        let user = match self.session.login(email, password).await {
            Ok(user) => user,
            Err(err) => {
                self.notifications.error(err.to_string());
                return Err(err.into());
            }
        };

        // The guard reads the session, so it must hold the user before navigating.
        self.session.wait_for_user(&user.uid).await;
        let name = user
            .display_name
            .as_deref()
            .or(user.email.as_deref())
            .unwrap_or(&user.uid);
        self.notifications.success(format!("Signed in as {name}"));
        self.router
            .push(HOME_PATH)
            .await
            .context("Failed to open the home page")?;
        Ok(user)
    }

    /// Sign out and go to the login route, even if the remote sign-out fails.
    pub async fn logout(&self) -> anyhow::Result<()> {
        let result = self.session.logout().await;
        self.router
            .push(LOGIN_PATH)
            .await
            .context("Failed to open the login page")?;
        match result {
            Ok(()) => {
                self.notifications.info("Signed out");
                Ok(())
            }
            Err(err) => {
                self.notifications.error(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Ask for confirmation, then delete the project.
    ///
    /// Returns `false` if the request was declined.
    pub async fn delete_project(&self, id: &str, name: &str) -> anyhow::Result<bool> {
        let confirmed = self
            .notifications
            .confirm(
                format!("Delete \"{name}\"? This cannot be undone."),
                Some("Delete project"),
            )
            .await;
        if !confirmed {
            info!(id, "project deletion cancelled");
            return Ok(false);
        }

        match self.project_detail().delete(id).await {
            Ok(()) => {
                self.notifications.success(format!("Deleted \"{name}\""));
                Ok(true)
            }
            Err(err) => {
                warn!(id, error = %err, "project deletion failed");
                self.notifications.error("Failed to delete the project.");
                Err(err).with_context(|| format!("Failed to delete project {id}"))
            }
        }
    }
}
