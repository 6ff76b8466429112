//! Route table, navigation guard and router.

use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::{
    auth::AuthProvider,
    db::DocumentStore,
    session::AuthSession,
};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Follow at most this many guard redirects for one navigation.
const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub path: String,
    pub name: Option<String>,
    pub requires_auth: bool,
    pub title: Option<String>,
    pub children: Vec<RouteRecord>,
}

impl RouteRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            requires_auth: false,
            title: None,
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_children(mut self, children: Vec<RouteRecord>) -> Self {
        self.children = children;
        self
    }
}

/// The routes of the admin console.
pub fn default_routes() -> Vec<RouteRecord> {
    vec![
        RouteRecord::new(LOGIN_PATH).named("login").titled("Sign in"),
        RouteRecord::new(HOME_PATH).requires_auth().with_children(vec![
            RouteRecord::new("").named("home").titled("Projects"),
            RouteRecord::new("activity").named("activity").titled("Check-in"),
            RouteRecord::new("about").named("about").titled("About"),
        ]),
        RouteRecord::new("/liff").named("liff").titled("Check-in"),
    ]
}

/// One record of a matched chain, with its full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRecord {
    pub path: String,
    pub name: Option<String>,
    pub requires_auth: bool,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub path: String,
    pub name: Option<String>,
    /// Root first, leaf last.
    pub matched: Vec<MatchedRecord>,
}

impl ResolvedRoute {
    /// True if the route or any of its ancestors requires a signed-in user.
    pub fn requires_auth(&self) -> bool {
        self.matched.iter().any(|record| record.requires_auth)
    }

    /// Title of the deepest matched record that declares one.
    pub fn title(&self) -> Option<&str> {
        self.matched
            .iter()
            .rev()
            .find_map(|record| record.title.as_deref())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("No route matches {0}")]
    NoMatch(String),

    #[error("Too many redirects while navigating to {0}")]
    RedirectLoop(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(String),
}

/// Check run before every navigation commits.
pub trait NavigationGuard: Send + Sync {
    fn before_each(
        &self,
        to: &ResolvedRoute,
        from: Option<&ResolvedRoute>,
    ) -> impl Future<Output = GuardDecision> + Send;
}

/// Keeps signed-out users away from routes that require authentication.
pub struct AuthGuard<S, A> {
    session: AuthSession<S, A>,
    login_path: String,
}

impl<S: DocumentStore, A: AuthProvider> AuthGuard<S, A> {
    pub fn new(session: AuthSession<S, A>) -> Self {
        Self {
            session,
            login_path: LOGIN_PATH.to_string(),
        }
    }
}

impl<S: DocumentStore, A: AuthProvider> NavigationGuard for AuthGuard<S, A> {
    async fn before_each(
        &self,
        to: &ResolvedRoute,
        _from: Option<&ResolvedRoute>,
    ) -> GuardDecision {
        // A reload must not bounce to the login page while the session is restored.
        if !self.session.is_ready() {
            debug!(to = %to.path, "waiting for auth readiness");
            self.session.wait_until_ready().await;
        }

        if to.requires_auth() && self.session.current_user().is_none() {
            info!(to = %to.path, "redirecting unauthenticated navigation");
            return GuardDecision::Redirect(self.login_path.clone());
        }
        GuardDecision::Proceed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Committed(ResolvedRoute),
    Redirected {
        requested: String,
        route: ResolvedRoute,
    },
}

impl NavigationOutcome {
    pub fn route(&self) -> &ResolvedRoute {
        match self {
            NavigationOutcome::Committed(route) => route,
            NavigationOutcome::Redirected { route, .. } => route,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, NavigationOutcome::Redirected { .. })
    }
}

fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn join(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        normalize(child)
    } else {
        normalize(&format!("{parent}/{child}"))
    }
}

fn match_chain(
    records: &[RouteRecord],
    parent: &str,
    target: &str,
    chain: &mut Vec<MatchedRecord>,
) -> bool {
    for record in records {
        let full = join(parent, &record.path);
        chain.push(MatchedRecord {
            path: full.clone(),
            name: record.name.clone(),
            requires_auth: record.requires_auth,
            title: record.title.clone(),
        });
        // Children win over their parent, so "/" lands on its "" child.
        if match_chain(&record.children, &full, target, chain) {
            return true;
        }
        if full == target {
            return true;
        }
        chain.pop();
    }
    false
}

pub struct Router<G> {
    routes: Vec<RouteRecord>,
    guard: G,
    current: watch::Sender<Option<ResolvedRoute>>,
}

impl<G: NavigationGuard> Router<G> {
    pub fn new(routes: Vec<RouteRecord>, guard: G) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            routes,
            guard,
            current,
        }
    }

    pub fn resolve(&self, path: &str) -> Result<ResolvedRoute, RouteError> {
        let target = normalize(path);
        let mut chain = Vec::new();
        if !match_chain(&self.routes, "/", &target, &mut chain) {
            return Err(RouteError::NoMatch(path.to_string()));
        }
        Ok(ResolvedRoute {
            name: chain.last().and_then(|record| record.name.clone()),
            path: target,
            matched: chain,
        })
    }

    /// Navigate to `path`, following guard redirects, and commit the result.
    pub async fn push(&self, path: &str) -> Result<NavigationOutcome, RouteError> {
        let mut target = path.to_string();
        let mut redirected = false;
        for _ in 0..=MAX_REDIRECTS {
            let route = self.resolve(&target)?;
            let from = self.current();
            match self.guard.before_each(&route, from.as_ref()).await {
                GuardDecision::Proceed => {
                    info!(path = %route.path, "navigation committed");
                    self.current.send_replace(Some(route.clone()));
                    return Ok(if redirected {
                        NavigationOutcome::Redirected {
                            requested: path.to_string(),
                            route,
                        }
                    } else {
                        NavigationOutcome::Committed(route)
                    });
                }
                GuardDecision::Redirect(next) => {
                    debug!(from = %route.path, to = %next, "navigation redirected");
                    target = next;
                    redirected = true;
                }
            }
        }
        Err(RouteError::RedirectLoop(path.to_string()))
    }

    pub fn current(&self) -> Option<ResolvedRoute> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ResolvedRoute>> {
        self.current.subscribe()
    }

    pub fn document_title(&self, app_name: &str) -> String {
        match self.current().as_ref().and_then(ResolvedRoute::title) {
            Some(title) => format!("{title} | {app_name}"),
            None => app_name.to_string(),
        }
    }
}
