use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use defo_console::api::MockServer;
use defo_console::session::MemoryCredentials;
use defo_console::{
    ApiClient, ErrorKind, ProjectDraft, ProjectId, ProjectPatch, ProjectStatus, ProjectStore,
    ProjectsState, Session,
};
use futures::pin_mut;

fn signed_in_store() -> (Rc<MockServer>, ProjectStore) {
    let server = Rc::new(MockServer::new());
    let credentials = Rc::new(MemoryCredentials::with_token(server.token()));
    let client = ApiClient::new("http://api.test", server.clone(), credentials.clone());
    let store = ProjectStore::new(client, Session::new(credentials));
    (server, store)
}

async fn loaded_store() -> (Rc<MockServer>, ProjectStore) {
    let (server, store) = signed_in_store();
    store.initialize().await.unwrap();
    (server, store)
}

#[tokio::test]
async fn successful_creates_grow_cache_with_unique_ids() {
    for n in [0usize, 1, 3, 8] {
        let (_server, store) = loaded_store().await;
        for i in 0..n {
            // Duplicate names are legal.
            let name = if i % 2 == 0 { "Forecast" } else { "Baseline" };
            store.create(ProjectDraft::new(name)).await.unwrap();
        }

        let projects = store.projects();
        assert_eq!(projects.len(), n);
        let ids: HashSet<&ProjectId> = projects.iter().map(|p| &p.id).collect();
        assert_eq!(ids.len(), n);
    }
}

#[tokio::test]
async fn concurrent_creates_are_independent() {
    let (server, store) = loaded_store().await;

    let (a, b) = futures::join!(
        store.create(ProjectDraft::new("Q1 Demand")),
        store.create(ProjectDraft::new("Q1 Demand")),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);
    assert_eq!(store.projects().len(), 2);
    assert_eq!(server.projects().len(), 2);
}

#[tokio::test]
async fn update_unknown_id_is_validation_without_network() {
    let (server, store) = loaded_store().await;
    let before = server.request_count();

    let err = store
        .update(&ProjectId::from("missing"), ProjectPatch::default().name("x"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(server.request_count(), before);
}

#[tokio::test]
async fn update_rejects_blank_name_before_network() {
    let (server, store) = loaded_store().await;
    let project = store.create(ProjectDraft::new("Q1 Demand")).await.unwrap();
    let before = server.request_count();

    let err = store
        .update(&project.id, ProjectPatch::default().name("   "))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(server.request_count(), before);
    assert_eq!(store.get(&project.id), Some(project));
}

#[tokio::test]
async fn empty_name_create_is_rejected_before_network() {
    let (server, store) = loaded_store().await;
    let before = server.request_count();

    let err = store.create(ProjectDraft::new("")).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(server.request_count(), before);
    assert!(store.projects().is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_entry() {
    let (server, store) = loaded_store().await;
    let project = store.create(ProjectDraft::new("Q1 Demand")).await.unwrap();

    server.fail_next(500, "database is locked");
    let err = store.delete(&project.id).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::ServerError);
    assert!(err.message.contains("database is locked"));
    assert_eq!(store.get(&project.id), Some(project));
}

#[tokio::test]
async fn delete_removes_after_server_confirms() {
    let (server, store) = loaded_store().await;
    let keep = store.create(ProjectDraft::new("Keep")).await.unwrap();
    let gone = store.create(ProjectDraft::new("Gone")).await.unwrap();

    let gate = server.hold_next();
    let deletion = store.delete(&gone.id);
    pin_mut!(deletion);

    // In flight: still cached.
    assert!(futures::poll!(deletion.as_mut()).is_pending());
    assert!(store.get(&gone.id).is_some());

    gate.release();
    deletion.await.unwrap();
    assert_eq!(store.projects(), vec![keep]);
}

#[tokio::test]
async fn failed_list_keeps_last_good_snapshot() {
    let (server, store) = loaded_store().await;
    store.create(ProjectDraft::new("Q1 Demand")).await.unwrap();
    store.list().await.unwrap();
    let before = store.projects();

    server.set_offline(true);
    let err = store.list().await.unwrap_err();

    let state = store.state();
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(state.projects, before);
    assert!(state.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(!state.loading);

    server.set_offline(false);
    store.refresh().await.unwrap();
    assert_eq!(store.state().error, None);
}

#[tokio::test]
async fn refresh_after_failure_clears_error_while_loading() {
    let (server, store) = loaded_store().await;
    server.set_offline(true);
    store.list().await.unwrap_err();
    server.set_offline(false);

    let seen: Rc<RefCell<Vec<ProjectsState>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let _sub = store.subscribe(move |s| sink.borrow_mut().push(s.clone()));

    store.refresh().await.unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].loading);
    assert_eq!(seen[0].error, None);
    assert!(!seen[1].loading);
    assert_eq!(seen[1].error, None);
}

#[tokio::test]
async fn list_in_flight_across_sign_out_is_discarded() {
    let (server, store) = loaded_store().await;
    server.insert_project("North");

    let gate = server.hold_next();
    let listing = store.list();
    pin_mut!(listing);
    assert!(futures::poll!(listing.as_mut()).is_pending());

    store.session().sign_out();
    gate.release();
    listing.await.unwrap();

    assert!(!store.session().is_authenticated());
    assert_eq!(store.state(), ProjectsState::signed_out());
}

#[tokio::test]
async fn create_in_flight_across_sign_out_is_not_cached() {
    let (server, store) = loaded_store().await;

    let gate = server.hold_next();
    let creation = store.create(ProjectDraft::new("Q1 Demand"));
    pin_mut!(creation);
    assert!(futures::poll!(creation.as_mut()).is_pending());

    store.session().sign_out();
    gate.release();
    creation.await.unwrap();

    assert!(store.projects().is_empty());
    assert_eq!(server.projects().len(), 1);
}

#[tokio::test]
async fn unparseable_list_response_is_network_failure() {
    let (server, store) = loaded_store().await;
    server.garble_next();

    let err = store.list().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Network);
    assert!(store.state().error.is_some());
}

#[tokio::test]
async fn list_is_idempotent() {
    let (server, store) = loaded_store().await;
    server.insert_project("North");
    server.insert_project("South");

    store.list().await.unwrap();
    let first = store.projects();
    store.list().await.unwrap();
    let second = store.projects();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn create_then_update_round_trip() {
    let (_server, store) = loaded_store().await;

    let created = store
        .create(
            ProjectDraft::new("Q1 Demand")
                .description("")
                .tags("retail,us"),
        )
        .await
        .unwrap();
    store
        .update(&created.id, ProjectPatch::default().status(ProjectStatus::Paused))
        .await
        .unwrap();

    let cached = store.get(&created.id).unwrap();
    assert_eq!(cached.status, ProjectStatus::Paused);
    assert_eq!(cached.name, "Q1 Demand");
    assert_eq!(cached.tags.as_deref(), Some("retail,us"));
    assert_eq!(cached.tag_list(), vec!["retail", "us"]);
}

#[tokio::test]
async fn failed_update_leaves_cache_untouched() {
    let (server, store) = loaded_store().await;
    let project = store.create(ProjectDraft::new("Q1 Demand")).await.unwrap();

    server.fail_next(403, "Access denied");
    let err = store
        .update(&project.id, ProjectPatch::default().status(ProjectStatus::Completed))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ClientError);
    assert_eq!(err.message, "Access denied");
    assert_eq!(store.get(&project.id), Some(project));
}

#[tokio::test]
async fn racing_updates_last_response_wins() {
    let (server, store) = loaded_store().await;
    let project = store.create(ProjectDraft::new("Q1 Demand")).await.unwrap();

    let gate_paused = server.hold_next();
    let gate_completed = server.hold_next();
    let paused = store.update(&project.id, ProjectPatch::default().status(ProjectStatus::Paused));
    let completed =
        store.update(&project.id, ProjectPatch::default().status(ProjectStatus::Completed));
    pin_mut!(paused, completed);

    assert!(futures::poll!(paused.as_mut()).is_pending());
    assert!(futures::poll!(completed.as_mut()).is_pending());

    // The "completed" request was applied last server-side but arrives first.
    gate_completed.release();
    completed.await.unwrap();
    gate_paused.release();
    paused.await.unwrap();

    assert_eq!(store.get(&project.id).unwrap().status, ProjectStatus::Paused);
}

#[tokio::test]
async fn racing_lists_last_arrival_wins() {
    let (server, store) = loaded_store().await;
    server.insert_project("North");

    let gate_old = server.hold_next();
    let old = store.list();
    pin_mut!(old);
    assert!(futures::poll!(old.as_mut()).is_pending());

    server.insert_project("South");
    let gate_new = server.hold_next();
    let new = store.list();
    pin_mut!(new);
    assert!(futures::poll!(new.as_mut()).is_pending());
    assert!(store.state().loading);

    gate_new.release();
    new.await.unwrap();
    assert_eq!(store.projects().len(), 2);

    // The older snapshot arrives last and is what remains visible.
    gate_old.release();
    old.await.unwrap();
    assert_eq!(store.projects().len(), 1);
}

#[tokio::test]
async fn create_racing_a_list_never_duplicates() {
    let (server, store) = loaded_store().await;

    let gate = server.hold_next();
    let creation = store.create(ProjectDraft::new("Q1 Demand"));
    pin_mut!(creation);
    assert!(futures::poll!(creation.as_mut()).is_pending());

    // The list already sees the new project server-side.
    store.list().await.unwrap();
    gate.release();
    let project = creation.await.unwrap();

    let matching = store
        .projects()
        .into_iter()
        .filter(|p| p.id == project.id)
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn two_subscribers_see_loading_transitions() {
    let (server, store) = signed_in_store();
    server.insert_project("North");

    let seen_a: Rc<RefCell<Vec<ProjectsState>>> = Rc::default();
    let seen_b: Rc<RefCell<Vec<ProjectsState>>> = Rc::default();
    let sink_a = Rc::clone(&seen_a);
    let sink_b = Rc::clone(&seen_b);
    let _a = store.subscribe(move |s| sink_a.borrow_mut().push(s.clone()));
    let _b = store.subscribe(move |s| sink_b.borrow_mut().push(s.clone()));

    store.list().await.unwrap();

    for seen in [&seen_a, &seen_b] {
        let seen = seen.borrow();
        let flags: Vec<bool> = seen.iter().map(|s| s.loading).collect();
        assert_eq!(flags, vec![true, false]);
        assert_eq!(seen.last().unwrap().projects, store.projects());
    }
}

#[tokio::test]
async fn unsubscribing_mid_flight_leaves_others_running() {
    let (server, store) = loaded_store().await;

    let count_a = Rc::new(RefCell::new(0));
    let count_b = Rc::new(RefCell::new(0));
    let a = Rc::clone(&count_a);
    let sub_a = store.subscribe(move |_| *a.borrow_mut() += 1);
    let b = Rc::clone(&count_b);
    let _sub_b = store.subscribe(move |_| *b.borrow_mut() += 1);

    let gate = server.hold_next();
    let listing = store.list();
    pin_mut!(listing);
    assert!(futures::poll!(listing.as_mut()).is_pending());

    // Loading transition delivered; now one consumer unmounts.
    drop(sub_a);
    gate.release();
    listing.await.unwrap();

    assert_eq!(*count_a.borrow(), 1);
    assert_eq!(*count_b.borrow(), 2);
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn expired_credential_forces_reauthentication() {
    let (server, store) = loaded_store().await;
    store.create(ProjectDraft::new("Q1 Demand")).await.unwrap();

    server.fail_next(401, "Could not validate credentials");
    let err = store.create(ProjectDraft::new("Q2 Demand")).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert!(!store.session().is_authenticated());
    assert_eq!(store.state(), ProjectsState::signed_out());

    // No credential now: initialize short-circuits.
    let before = server.request_count();
    store.initialize().await.unwrap();
    assert_eq!(server.request_count(), before);
}
