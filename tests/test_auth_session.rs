mod common;

use common::*;
use folio_admin::core::session::{AuthSession, SessionError};

#[tokio::test]
async fn test_ready_after_initial_notification() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let session = AuthSession::new(gateway.clone());
    assert!(!session.is_ready());

    session.init_auth();
    session.init_auth();
    session.wait_until_ready().await;

    assert!(session.is_ready());
    assert_eq!(session.current_user(), None);
    assert!(!session.session().is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_restored_session_resolves_all_waiters() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway_with(MemoryAuth::restoring());
    let session = AuthSession::new(gateway.clone());
    session.init_auth();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.wait_until_ready().await })
        })
        .collect();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!session.is_ready());
    assert!(waiters.iter().all(|waiter| !waiter.is_finished()));

    gateway.auth().finish_restore(Some(admin.clone()));
    for waiter in waiters {
        tokio::time::timeout(WAIT_LIMIT, waiter).await??;
    }
    assert_eq!(session.current_user(), Some(admin));

    // Already ready: returns immediately.
    session.wait_until_ready().await;
    Ok(())
}

#[tokio::test]
async fn test_login_success_reaches_session() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway();
    let session = AuthSession::new(gateway.clone());
    session.init_auth();

    let user = session.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    assert_eq!(user, admin);

    session.wait_for_user(&admin.uid).await;
    assert_eq!(session.current_user(), Some(admin));
    assert!(session.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_login_failures_are_generic() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    gateway.auth().register("off@example.com", "pw", None);
    gateway.auth().disable("off@example.com");
    let session = AuthSession::new(gateway.clone());
    session.init_auth();

    for (email, password) in [
        (ADMIN_EMAIL, "wrong"),
        ("nobody@example.com", ADMIN_PASSWORD),
        ("off@example.com", "pw"),
    ] {
        let err = session.login(email, password).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid email or password");
    }
    assert_eq!(session.current_user(), None);
    Ok(())
}

#[tokio::test]
async fn test_logout_clears_local_user_first() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway();
    let session = AuthSession::new(gateway.clone());
    session.init_auth();
    session.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    session.wait_for_user(&admin.uid).await;

    gateway
        .auth()
        .fail_sign_out(AuthError::Network("offline".to_string()));
    let err = session.logout().await.unwrap_err();

    assert!(matches!(err, SessionError::SignOut(AuthError::Network(_))));
    assert_eq!(session.current_user(), None);
    // The provider still holds the user because the remote sign-out failed.
    assert_eq!(gateway.auth().current_user(), Some(admin));
    Ok(())
}

#[tokio::test]
async fn test_logout_signs_out_remotely() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway();
    let session = AuthSession::new(gateway.clone());
    session.init_auth();
    session.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    session.wait_for_user(&admin.uid).await;

    session.logout().await?;

    assert_eq!(session.current_user(), None);
    assert_eq!(gateway.auth().current_user(), None);
    let mut receiver = session.subscribe();
    let state = wait_for(&mut receiver, |state| state.ready && state.current_user.is_none()).await;
    assert!(!state.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn test_sign_in_notified_before_logout_does_not_restore_user() -> anyhow::Result<()> {
    let (gateway, admin) = memory_gateway();
    let session = AuthSession::new(gateway.clone());
    session.init_auth();
    session.wait_until_ready().await;

    // Sign in behind the session's back; the listener has not run yet.
    gateway.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    gateway
        .auth()
        .fail_sign_out(AuthError::Network("slow".to_string()));
    assert!(session.logout().await.is_err());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(session.current_user(), None);
    assert_eq!(gateway.auth().current_user(), Some(admin.clone()));

    // A fresh login is picked up again.
    session.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    session.wait_for_user(&admin.uid).await;
    assert_eq!(session.current_user(), Some(admin));
    Ok(())
}
