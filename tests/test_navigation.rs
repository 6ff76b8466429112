mod common;

use std::time::Duration;

use common::*;
use folio_admin::core::{
    router::{
        AuthGuard, GuardDecision, HOME_PATH, LOGIN_PATH, NavigationGuard, NavigationOutcome,
        ResolvedRoute, RouteError, Router, default_routes,
    },
    session::AuthSession,
};

type TestSession = AuthSession<MemoryStore, MemoryAuth>;

fn guarded_router(gateway: &TestGateway) -> (Router<AuthGuard<MemoryStore, MemoryAuth>>, TestSession) {
    let session = AuthSession::new(gateway.clone());
    session.init_auth();
    let router = Router::new(default_routes(), AuthGuard::new(session.clone()));
    (router, session)
}

#[tokio::test]
async fn test_resolve_route_table() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let (router, _) = guarded_router(&gateway);

    let home = router.resolve("/")?;
    assert_eq!(home.name.as_deref(), Some("home"));
    assert!(home.requires_auth());
    assert_eq!(home.title(), Some("Projects"));
    assert_eq!(home.matched.len(), 2);

    let activity = router.resolve("/activity?tab=today")?;
    assert_eq!(activity.path, "/activity");
    assert_eq!(activity.name.as_deref(), Some("activity"));
    assert!(activity.requires_auth());

    let login = router.resolve(LOGIN_PATH)?;
    assert!(!login.requires_auth());
    assert!(!router.resolve("/liff/")?.requires_auth());

    assert_eq!(
        router.resolve("/nowhere"),
        Err(RouteError::NoMatch("/nowhere".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_signed_out_user_is_redirected_to_login() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let (router, _) = guarded_router(&gateway);

    let outcome = router.push("/about").await?;

    assert!(outcome.is_redirect());
    assert_eq!(outcome.route().path, LOGIN_PATH);
    assert!(matches!(
        outcome,
        NavigationOutcome::Redirected { ref requested, .. } if requested == "/about"
    ));
    assert_eq!(router.current().map(|route| route.path), Some(LOGIN_PATH.to_string()));
    assert_eq!(router.document_title("Folio Admin"), "Sign in | Folio Admin");
    Ok(())
}

#[tokio::test]
async fn test_public_routes_need_no_user() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let (router, _) = guarded_router(&gateway);

    let outcome = router.push("/liff").await?;
    assert!(!outcome.is_redirect());
    assert_eq!(outcome.route().name.as_deref(), Some("liff"));
    Ok(())
}

#[tokio::test]
async fn test_signed_in_user_reaches_protected_route() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway();
    let (router, session) = guarded_router(&gateway);
    session.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    session.wait_for_user(&admin.uid).await;

    let outcome = router.push("/activity").await?;

    assert_eq!(outcome, NavigationOutcome::Committed(router.resolve("/activity")?));
    assert_eq!(router.document_title("Folio Admin"), "Check-in | Folio Admin");
    Ok(())
}

#[tokio::test]
async fn test_guard_waits_for_restored_session() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway_with(MemoryAuth::restoring());
    let (router, _) = guarded_router(&gateway);

    let (outcome, ()) = tokio::join!(router.push(HOME_PATH), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(router.current(), None);
        gateway.auth().finish_restore(Some(admin.clone()));
    });

    let outcome = outcome?;
    assert!(!outcome.is_redirect());
    assert_eq!(outcome.route().path, HOME_PATH);
    Ok(())
}

#[tokio::test]
async fn test_guard_redirects_once_restore_finds_no_user() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway_with(MemoryAuth::restoring());
    let (router, _) = guarded_router(&gateway);

    let (outcome, ()) = tokio::join!(router.push(HOME_PATH), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.auth().finish_restore(None);
    });

    assert_eq!(outcome?.route().path, LOGIN_PATH);
    Ok(())
}

struct Bounce;

impl NavigationGuard for Bounce {
    async fn before_each(&self, to: &ResolvedRoute, _from: Option<&ResolvedRoute>) -> GuardDecision {
        if to.path == LOGIN_PATH {
            GuardDecision::Redirect("/about".to_string())
        } else {
            GuardDecision::Redirect(LOGIN_PATH.to_string())
        }
    }
}

#[tokio::test]
async fn test_redirect_loop_is_reported() -> anyhow::Result<()> {
    let router = Router::new(default_routes(), Bounce);

    let result = router.push("/about").await;

    assert_eq!(result, Err(RouteError::RedirectLoop("/about".to_string())));
    assert_eq!(router.current(), None);
    Ok(())
}
