mod common;

use std::time::Duration;

use common::*;
use folio_admin::{
    Config,
    core::sync::{LOAD_FAILED, PROJECT_NOT_FOUND, ProjectDetail},
    models::{PROJECTS, ProjectStatus, ProjectUpdate},
};

fn rename(name: &str) -> ProjectUpdate {
    ProjectUpdate {
        name: Some(name.to_string()),
        ..ProjectUpdate::default()
    }
}

#[tokio::test]
async fn test_fetch_existing_project() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    let detail = ProjectDetail::new(gateway.clone());

    detail.fetch(&id).await;

    let state = detail.state();
    assert!(!state.loading);
    assert_eq!(state.error, None);
    let project = state.project.expect("project loaded");
    assert_eq!(project.id.as_deref(), Some(id.as_str()));
    assert_eq!(project.status, Some(ProjectStatus::Active));
    assert!(project.created_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_fetch_missing_project() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let detail = ProjectDetail::new(gateway.clone());

    detail.fetch("does-not-exist").await;

    let state = detail.state();
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some(PROJECT_NOT_FOUND));
    assert_eq!(state.project, None);
    Ok(())
}

#[tokio::test]
async fn test_fetch_failure_sets_generic_message() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    gateway.store().deny(PROJECTS);
    let detail = ProjectDetail::new(gateway.clone());

    detail.fetch(&id).await;

    let state = detail.state();
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some(LOAD_FAILED));
    Ok(())
}

#[tokio::test]
async fn test_update_is_visible_before_write_completes() -> anyhow::Result<()> {
    let gateway = gated_gateway(&test_config());
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    let detail = ProjectDetail::new(gateway.clone());
    detail.fetch(&id).await;

    let update = rename("Renamed");
    let (result, ()) = tokio::join!(detail.update(&id, &update), async {
        let state = wait_for(&mut detail.subscribe(), |state| {
            state.project.as_ref().is_some_and(|p| p.display_name() == "Renamed")
        })
        .await;
        assert_eq!(state.project.and_then(|p| p.status), Some(ProjectStatus::Active));

        let stored = gateway
            .get_document(PROJECTS, &id)
            .await
            .expect("read")
            .expect("document");
        assert_eq!(stored.get("name"), Some(&serde_json::json!("Alpha")));
        gateway.store().release_update();
    });
    result?;

    let stored = gateway.get_document(PROJECTS, &id).await?.expect("document");
    assert_eq!(stored.get("name"), Some(&serde_json::json!("Renamed")));
    assert_eq!(detail.project().map(|p| p.display_name().to_string()), Some("Renamed".into()));
    Ok(())
}

#[tokio::test]
async fn test_failed_update_restores_previous_record() -> anyhow::Result<()> {
    let gateway = gated_gateway(&test_config());
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    let detail = ProjectDetail::new(gateway.clone());
    detail.fetch(&id).await;
    let before = detail.project();

    let update = rename("Renamed");
    let (result, ()) = tokio::join!(detail.update(&id, &update), async {
        wait_for(&mut detail.subscribe(), |state| {
            state.project.as_ref().is_some_and(|p| p.display_name() == "Renamed")
        })
        .await;
        gateway.store().inner().deny(PROJECTS);
        gateway.store().release_update();
    });

    assert!(matches!(result, Err(StoreError::PermissionDenied(_))));
    assert_eq!(detail.project(), before);
    Ok(())
}

#[tokio::test]
async fn test_failed_update_keeps_later_successful_update() -> anyhow::Result<()> {
    let gateway = gated_gateway(&test_config());
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    let detail = ProjectDetail::new(gateway.clone());
    detail.fetch(&id).await;

    let first = rename("Renamed");
    let second = ProjectUpdate {
        description: Some("New description".to_string()),
        ..ProjectUpdate::default()
    };
    let (first_result, second_result, ()) = tokio::join!(
        detail.update(&id, &first),
        detail.update(&id, &second),
        async {
            wait_for(&mut detail.subscribe(), |state| {
                state.project.as_ref().is_some_and(|p| {
                    p.display_name() == "Renamed" && p.description == "New description"
                })
            })
            .await;

            // The first write fails; the second goes through once access is back.
            gateway.store().inner().deny(PROJECTS);
            gateway.store().release_update();
            wait_for(&mut detail.subscribe(), |state| {
                state.project.as_ref().is_some_and(|p| p.display_name() == "Alpha")
            })
            .await;
            gateway.store().inner().allow(PROJECTS);
            gateway.store().release_update();
        }
    );

    assert!(matches!(first_result, Err(StoreError::PermissionDenied(_))));
    second_result?;

    let local = detail.project().expect("project");
    assert_eq!(local.display_name(), "Alpha");
    assert_eq!(local.description, "New description");

    let stored = gateway.get_document(PROJECTS, &id).await?.expect("document");
    assert_eq!(stored.get("name"), Some(&serde_json::json!("Alpha")));
    assert_eq!(stored.get("description"), Some(&serde_json::json!("New description")));
    Ok(())
}

#[tokio::test]
async fn test_timed_out_update_restores_previous_record() -> anyhow::Result<()> {
    let config = Config {
        call_timeout: Some(Duration::from_millis(50)),
        ..test_config()
    };
    let gateway = gated_gateway(&config);
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    let detail = ProjectDetail::new(gateway.clone());
    detail.fetch(&id).await;

    // The gate stays closed, so the write never completes.
    let result = detail.update(&id, &rename("Renamed")).await;

    assert!(matches!(result, Err(StoreError::Timeout(_))));
    assert_eq!(detail.project().map(|p| p.display_name().to_string()), Some("Alpha".into()));
    Ok(())
}

#[tokio::test]
async fn test_update_writes_only_present_fields() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let mut project = sample_project("Alpha");
    project.tech_core = Some("Rust".to_string());
    let id = seed_project(gateway.store(), &project).await;
    let detail = ProjectDetail::new(gateway.clone());

    // No local record yet: the write still goes through.
    detail.update(&id, &rename("Renamed")).await?;
    assert_eq!(detail.project(), None);

    let stored = gateway.get_document(PROJECTS, &id).await?.expect("document");
    assert_eq!(stored.get("name"), Some(&serde_json::json!("Renamed")));
    assert_eq!(stored.get("techCore"), Some(&serde_json::json!("Rust")));
    assert_eq!(stored.get("description"), Some(&serde_json::json!("Alpha description")));
    Ok(())
}

#[tokio::test]
async fn test_update_missing_project_fails() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let detail = ProjectDetail::new(gateway.clone());

    let result = detail.update("ghost", &rename("Renamed")).await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
    assert_eq!(gateway.store().document_count(PROJECTS), 0);
    Ok(())
}

#[tokio::test]
async fn test_update_of_other_id_leaves_local_record() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let shown = seed_project(gateway.store(), &sample_project("Shown")).await;
    let other = seed_project(gateway.store(), &sample_project("Other")).await;
    let detail = ProjectDetail::new(gateway.clone());
    detail.fetch(&shown).await;

    detail.update(&other, &rename("Renamed")).await?;

    assert_eq!(detail.project().map(|p| p.display_name().to_string()), Some("Shown".into()));
    Ok(())
}

#[tokio::test]
async fn test_delete_leaves_local_record_stale() -> anyhow::Result<()> {
    let (gateway, _) = memory_gateway();
    let id = seed_project(gateway.store(), &sample_project("Alpha")).await;
    let detail = ProjectDetail::new(gateway.clone());
    detail.fetch(&id).await;

    detail.delete(&id).await?;

    assert_eq!(gateway.store().document_count(PROJECTS), 0);
    assert!(detail.project().is_some());

    detail.fetch(&id).await;
    assert_eq!(detail.state().error.as_deref(), Some(PROJECT_NOT_FOUND));
    Ok(())
}
