use std::sync::Arc;

use mission_core::kv::{KvBinding, MemoryMedium};
use mission_core::role::RoleResolver;
use mission_core::store::MemoryDocumentStore;
use mission_core::transfer::{ImportOutcome, IssueKind};
use mission_core::{Dashboard, DashboardError, DashboardOptions};
use mission_model::{Column, MissionDraft, QuickLinkDraft, SidebarLayout, Slot};

const SLICES: [&str; 6] = [
    "tasks",
    "todos",
    "notes",
    "quickLinks",
    "importantDates",
    "sidebarLayout",
];

fn local() -> (Arc<MemoryMedium>, Dashboard) {
    let medium = Arc::new(MemoryMedium::new());
    let dashboard = Dashboard::open_local(
        KvBinding::new(medium.clone(), "crypto-missions"),
        DashboardOptions::default(),
    );
    (medium, dashboard)
}

fn seeded() -> (Arc<MemoryMedium>, Dashboard) {
    let (medium, dashboard) = local();
    dashboard
        .missions()
        .create(MissionDraft {
            title: "Galxe".to_string(),
            url: "https://galxe.com".to_string(),
            tags: vec!["yaping".to_string()],
            ..MissionDraft::default()
        })
        .expect("mission");
    dashboard.add_todo("claim").expect("todo");
    dashboard
        .quick_links()
        .create(QuickLinkDraft {
            title: "Docs".to_string(),
            url: "docs.galxe.com".to_string(),
        })
        .expect("link");
    dashboard.set_notes("gm").expect("notes");
    dashboard
        .move_panel(Slot::new(Column::Column1, 2), Slot::new(Column::Column2, 0))
        .expect("move");
    (medium, dashboard)
}

fn raw_slices(medium: &MemoryMedium) -> Vec<Option<String>> {
    SLICES
        .iter()
        .map(|slice| medium.raw(&format!("crypto-missions:{slice}")))
        .collect()
}

#[test]
fn export_then_import_reproduces_the_dashboard() {
    let (_, source) = seeded();
    let backup = source.export_json().expect("export");

    let (medium, target) = local();
    let outcome = target
        .import(&backup, |report| {
            assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
            true
        })
        .expect("import");
    assert!(matches!(outcome, ImportOutcome::Applied(_)));

    assert_eq!(target.snapshot(), source.snapshot());
    assert!(raw_slices(&medium).iter().all(Option::is_some));
}

#[test]
fn malformed_documents_change_nothing() {
    let (medium, dashboard) = seeded();
    let before_state = dashboard.snapshot();
    let before_raw = raw_slices(&medium);

    for raw in ["[]", "42", "not json"] {
        let mut asked = false;
        let err = dashboard
            .import(raw, |_| {
                asked = true;
                true
            })
            .expect_err("malformed");
        assert!(matches!(err, DashboardError::ImportMalformed(_)));
        assert!(!asked, "confirmation must not be requested for {raw}");
    }

    assert_eq!(dashboard.snapshot(), before_state);
    assert_eq!(raw_slices(&medium), before_raw);
}

#[test]
fn declined_confirmation_changes_nothing() {
    let (medium, dashboard) = seeded();
    let before_state = dashboard.snapshot();
    let before_raw = raw_slices(&medium);

    let outcome = dashboard
        .import(r#"{"tasks": [], "notes": "wiped"}"#, |_| false)
        .expect("parsed");
    assert_eq!(outcome, ImportOutcome::Declined);
    assert_eq!(dashboard.snapshot(), before_state);
    assert_eq!(raw_slices(&medium), before_raw);
}

#[test]
fn partial_backups_replace_everything_with_defaults() {
    let (medium, dashboard) = seeded();
    let outcome = dashboard
        .import(
            r#"{"notes": "fresh start", "todos": "oops", "sidebarLayout": {"column1": [], "column2": []}}"#,
            |_| true,
        )
        .expect("import");

    let ImportOutcome::Applied(report) = outcome else {
        panic!("confirmed import must apply");
    };
    let malformed: Vec<&str> = report
        .issues
        .iter()
        .filter(|issue| matches!(issue.kind, IssueKind::Malformed(_)))
        .map(|issue| issue.field)
        .collect();
    assert_eq!(malformed, vec!["todos", "sidebarLayout"]);

    let state = dashboard.snapshot();
    assert!(state.missions.is_empty());
    assert!(state.todos.is_empty());
    assert!(state.quick_links.is_empty());
    assert_eq!(state.notes, "fresh start");
    assert_eq!(state.layout, SidebarLayout::default());
    assert_eq!(
        medium.raw("crypto-missions:tasks").as_deref(),
        Some("[]")
    );
    assert_eq!(
        medium.raw("crypto-missions:notes").as_deref(),
        Some("\"fresh start\"")
    );
}

#[tokio::test]
async fn shared_mode_refuses_backups() {
    let store = Arc::new(MemoryDocumentStore::new());
    let roles = Arc::new(RoleResolver::new(store.clone()).expect("runtime"));
    let dashboard = Dashboard::connect_shared(store, roles, DashboardOptions::default())
        .expect("connect");

    assert!(matches!(
        dashboard.export_json(),
        Err(DashboardError::LocalOnly("export"))
    ));
    assert!(matches!(
        dashboard.import("{}", |_| true),
        Err(DashboardError::LocalOnly("import"))
    ));
}
