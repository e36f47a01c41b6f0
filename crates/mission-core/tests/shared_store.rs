use std::sync::Arc;
use std::time::Duration;

use mission_core::role::{AuthEvent, RoleResolver};
use mission_core::state::DashboardState;
use mission_core::store::{DocPath, DocumentStore, Fields, MemoryDocumentStore, StoreError};
use mission_core::sync::{Mutation, SkipReason};
use mission_core::{Dashboard, DashboardError, DashboardOptions};
use mission_model::{Column, MissionDraft, MissionPatch, PanelKey, Role, Slot, TodoDraft};
use serde_json::{Value, json};
use tokio::time::timeout;

const TASKS: &str = "crypto-missions/tasks";
const TODOS: &str = "crypto-missions/todos";
const SETTINGS: &str = "crypto-missions/settings";
const PATIENCE: Duration = Duration::from_secs(2);

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn draft(title: &str) -> MissionDraft {
    MissionDraft {
        title: title.to_string(),
        url: format!("https://{}.xyz", title.to_lowercase()),
        ..MissionDraft::default()
    }
}

struct Client {
    store: Arc<MemoryDocumentStore>,
    roles: Arc<RoleResolver>,
    dashboard: Dashboard,
}

impl Client {
    async fn wait_for(&self, ready: impl Fn(&DashboardState) -> bool) {
        timeout(PATIENCE, self.dashboard.wait_until(ready))
            .await
            .expect("state reconciled in time");
    }
}

/// Signs `alice` in with `role` (no role document when `None`).
async fn connect(store: Arc<MemoryDocumentStore>, role: Option<&str>) -> Client {
    if let Some(role) = role {
        store
            .set(&DocPath::new("users", "alice"), fields(json!({ "role": role })))
            .await
            .expect("seed role");
    }

    let roles = Arc::new(RoleResolver::new(store.clone()).expect("runtime"));
    roles.handle(AuthEvent::SignedIn {
        identity: "alice".to_string(),
    });
    timeout(PATIENCE, roles.resolved())
        .await
        .expect("role resolved");

    let dashboard = Dashboard::connect_shared(store.clone(), roles.clone(), DashboardOptions::default())
        .expect("connect");
    Client {
        store,
        roles,
        dashboard,
    }
}

async fn seed_mission(store: &MemoryDocumentStore, id: &str, title: &str) {
    store
        .set(
            &DocPath::new(TASKS, id),
            fields(json!({
                "title": title,
                "url": "https://example.xyz",
                "description": "",
                "tags": [],
                "isCompleted": false
            })),
        )
        .await
        .expect("seed mission");
}

#[tokio::test]
async fn editor_creates_reach_the_cache_through_the_subscription() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;

    let mutation = client.dashboard.missions().create(draft("Galxe")).expect("create");
    assert!(mutation.is_pending());
    assert!(
        client.dashboard.state().missions.is_empty(),
        "remote creates wait for the store"
    );

    let mission = mutation
        .settled()
        .await
        .expect("store committed")
        .expect("not skipped");
    let stored = client
        .store
        .get(&DocPath::new(TASKS, mission.id.clone()))
        .expect("document written");
    assert!(!stored.fields.contains_key("id"));
    assert_eq!(stored.fields["title"], json!("Galxe"));

    client
        .wait_for(|state| state.missions.iter().any(|m| m.id == mission.id))
        .await;
    assert_eq!(client.dashboard.mission_progress().total, 1);
}

#[tokio::test]
async fn guests_cannot_change_anything() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_mission(&store, "m1", "Layer3").await;
    let client = connect(store, Some("guest")).await;
    client.wait_for(|state| state.missions.len() == 1).await;
    assert!(!client.dashboard.can_edit());

    let before = client.dashboard.snapshot();
    let revision = client.dashboard.revision();

    let outcomes = [
        client
            .dashboard
            .missions()
            .create(draft("Nope"))
            .expect("create")
            .skip_reason(),
        client.dashboard.toggle_mission("m1").expect("toggle").skip_reason(),
        client.dashboard.missions().delete("m1").expect("delete").skip_reason(),
        client.dashboard.set_notes("guest scribbles").expect("notes").skip_reason(),
        client
            .dashboard
            .move_panel(Slot::new(Column::Column1, 0), Slot::new(Column::Column2, 0))
            .expect("move")
            .skip_reason(),
    ];
    for outcome in outcomes {
        assert_eq!(outcome, Some(SkipReason::PermissionDenied));
    }

    tokio::task::yield_now().await;
    assert_eq!(client.dashboard.snapshot(), before);
    assert_eq!(client.dashboard.revision(), revision);
    assert!(client.store.get(&DocPath::new(SETTINGS, "dashboard")).is_none());
    assert_eq!(
        client.store.get(&DocPath::new(TASKS, "m1")).expect("kept").fields["isCompleted"],
        json!(false)
    );
}

#[tokio::test]
async fn missing_role_document_means_read_only() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), None).await;
    assert_eq!(client.roles.role(), Role::Guest);
    let outcome = client.dashboard.add_todo("gm").expect("add");
    assert_eq!(outcome.skip_reason(), Some(SkipReason::PermissionDenied));
}

#[tokio::test]
async fn toggle_goes_through_the_store() {
    let store = Arc::new(MemoryDocumentStore::new());
    seed_mission(&store, "m1", "Zealy").await;
    let client = connect(store, Some("admin")).await;
    client.wait_for(|state| state.missions.len() == 1).await;

    let mutation = client.dashboard.toggle_mission("m1").expect("toggle");
    assert!(!client.dashboard.state().missions[0].is_completed);
    mutation.settled().await.expect("committed");
    client.wait_for(|state| state.missions[0].is_completed).await;

    client
        .dashboard
        .toggle_mission("m1")
        .expect("toggle back")
        .settled()
        .await
        .expect("committed");
    client.wait_for(|state| !state.missions[0].is_completed).await;
}

#[tokio::test]
async fn store_failures_surface_through_the_ack() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;
    let err = client
        .dashboard
        .missions()
        .update("ghost", MissionPatch::completion(true))
        .expect("sent")
        .settled()
        .await
        .expect_err("document does not exist");
    assert!(matches!(err, DashboardError::Store(StoreError::NotFound(_))));
}

#[tokio::test]
async fn notes_apply_optimistically_and_yield_to_snapshots() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;

    let mutation = client.dashboard.set_notes("gm frens").expect("notes");
    assert!(mutation.is_pending());
    assert_eq!(client.dashboard.state().notes, "gm frens");

    mutation.settled().await.expect("committed");
    let settings = client
        .store
        .get(&DocPath::new(SETTINGS, "dashboard"))
        .expect("settings written");
    assert_eq!(settings.fields["notes"], json!("gm frens"));

    client
        .store
        .merge(
            &DocPath::new(SETTINGS, "dashboard"),
            fields(json!({ "notes": "from another client" })),
        )
        .await
        .expect("remote edit");
    client
        .wait_for(|state| state.notes == "from another client")
        .await;
}

#[tokio::test]
async fn layout_moves_apply_optimistically() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("admin")).await;

    let mutation = client
        .dashboard
        .move_panel(Slot::new(Column::Column1, 2), Slot::new(Column::Column2, 0))
        .expect("move");
    let layout = client.dashboard.snapshot().layout;
    assert_eq!(layout.column2[0], PanelKey::Dates);
    assert!(layout.is_complete());

    mutation.settled().await.expect("committed");
    let settings = client
        .store
        .get(&DocPath::new(SETTINGS, "dashboard"))
        .expect("settings written");
    assert_eq!(
        settings.fields["sidebarLayout"]["column2"],
        json!(["dates", "todos", "notes"])
    );
    assert!(!settings.fields.contains_key("notes"));
}

#[tokio::test]
async fn role_changes_apply_live() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;
    assert!(client.dashboard.can_edit());

    client
        .store
        .set(&DocPath::new("users", "alice"), fields(json!({ "role": "guest" })))
        .await
        .expect("demote");
    let mut roles = client.roles.subscribe();
    timeout(PATIENCE, roles.wait_for(|state| state.role() == Role::Guest))
        .await
        .expect("in time")
        .expect("resolver alive");

    let outcome = client.dashboard.add_todo("after demotion").expect("add");
    assert_eq!(outcome.skip_reason(), Some(SkipReason::PermissionDenied));

    client.roles.handle(AuthEvent::SignedOut);
    assert!(!client.dashboard.can_edit());
}

#[tokio::test]
async fn offline_writes_stall_without_touching_the_cache() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;
    client.store.set_online(false);

    let Mutation::Pending { value: mission, ack } =
        client.dashboard.missions().create(draft("Stalled")).expect("create")
    else {
        panic!("editor writes are sent");
    };
    assert!(
        timeout(Duration::from_millis(100), ack.settled()).await.is_err(),
        "write must not resolve while offline"
    );
    assert!(client.dashboard.state().missions.is_empty());

    client.store.set_online(true);
    client
        .wait_for(|state| state.missions.iter().any(|m| m.id == mission.id))
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_writes_commit_in_the_order_they_were_made() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;
    client.store.set_online(false);

    let mut acks = Vec::new();
    for n in 1..=20 {
        let Mutation::Pending { ack, .. } =
            client.dashboard.set_notes(format!("edit {n}")).expect("notes")
        else {
            panic!("editor notes are sent");
        };
        acks.push(ack);
    }

    let Mutation::Pending { value: mission, ack } =
        client.dashboard.missions().create(draft("Ordered")).expect("create")
    else {
        panic!("editor writes are sent");
    };
    acks.push(ack);
    for mutation in [
        client
            .dashboard
            .missions()
            .update(&mission.id, MissionPatch::completion(true))
            .expect("update"),
        client.dashboard.missions().delete(&mission.id).expect("delete"),
    ] {
        let Mutation::Pending { ack, .. } = mutation else {
            panic!("editor writes are sent");
        };
        acks.push(ack);
    }
    assert_eq!(client.dashboard.state().notes, "edit 20");

    client.store.set_online(true);
    for ack in acks {
        timeout(PATIENCE, ack.settled())
            .await
            .expect("write settled in time")
            .expect("store committed");
    }

    let settings = client
        .store
        .get(&DocPath::new(SETTINGS, "dashboard"))
        .expect("settings written");
    assert_eq!(settings.fields["notes"], json!("edit 20"));
    assert!(client.store.get(&DocPath::new(TASKS, mission.id.clone())).is_none());

    client
        .wait_for(|state| state.notes == "edit 20" && state.missions.is_empty())
        .await;
}

#[tokio::test]
async fn collections_reconcile_independently() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;
    client
        .store
        .set(&DocPath::new(TASKS, "broken"), fields(json!({ "title": 7 })))
        .await
        .expect("seed broken");
    seed_mission(&client.store, "ok", "Kaito").await;
    client
        .dashboard
        .todos()
        .create(TodoDraft {
            text: "check snapshot".to_string(),
        })
        .expect("todo")
        .settled()
        .await
        .expect("committed");

    client
        .wait_for(|state| state.missions.len() == 1 && state.todos.len() == 1)
        .await;
    let state = client.dashboard.snapshot();
    assert_eq!(state.missions[0].id, "ok");
    assert!(client.store.get(&DocPath::new(TODOS, state.todos[0].id.clone())).is_some());
}

#[tokio::test]
async fn dropping_the_dashboard_stops_every_listener() {
    let client = connect(Arc::new(MemoryDocumentStore::new()), Some("editor")).await;
    let mut revisions = client.dashboard.subscribe();
    let store = client.store.clone();
    drop(client);

    seed_mission(&store, "late", "After close").await;
    timeout(PATIENCE, async {
        while revisions.changed().await.is_ok() {}
    })
    .await
    .expect("state cell released once listeners are gone");
}
