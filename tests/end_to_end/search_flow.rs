//! Search as callers see it

use crate::test_utils::app_with_switch;
use nodwatch::{Entity, EntityKey, Error, Nodwatch, NodwatchConfig, Post, Waypoint};
use serde_json::json;

#[test]
fn test_search_after_commit_and_not_after_rollback() {
    let app = Nodwatch::open_in_memory().unwrap();
    let kept = app.posts().create(&Post::new(1, "Clinic visit note")).unwrap();

    let mut txn = app.db().begin();
    txn.insert_entity(&Post::new(1, "Clinic follow-up draft"))
        .unwrap();
    txn.abort("user cancelled").unwrap();

    let results = app.posts().search("clinic", 1).unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.items[0].id, kept);
    assert_eq!(app.posts().search("draft", 1).unwrap().total, 0);
}

#[test]
fn test_pagination_with_configured_page_size() {
    let mut config = NodwatchConfig::default();
    config.search.per_page = 10;
    let app = Nodwatch::with_config(config).unwrap();

    app.db()
        .transaction(|txn| {
            for n in 0..25 {
                txn.insert_entity(&Post::new(1, format!("test reading {}", n)))?;
            }
            Ok(())
        })
        .unwrap();

    let posts = app.posts();
    let p1 = posts.search("test", 1).unwrap();
    let p3 = posts.search("test", 3).unwrap();
    assert_eq!((p1.len(), p1.total), (10, 25));
    assert_eq!((p3.len(), p3.total), (5, 25));
    assert_eq!(p1.next_page(), Some(2));
    assert_eq!(p3.next_page(), None);

    // Pages partition the matches
    let mut seen: Vec<_> = (1..=3)
        .flat_map(|p| posts.search("test", p).unwrap().items)
        .map(|s| s.id)
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 25);
}

#[test]
fn test_types_are_searched_separately() {
    let app = Nodwatch::open_in_memory().unwrap();
    app.posts().create(&Post::new(1, "Gulu market")).unwrap();
    app.waypoints()
        .create(&Waypoint::new(1, "Gulu market"))
        .unwrap();

    assert_eq!(app.posts().search("gulu", 1).unwrap().total, 1);
    assert_eq!(app.waypoints().search("gulu", 1).unwrap().total, 1);
    assert_eq!(
        app.search().search::<Waypoint>("market", 1).unwrap().items[0].place,
        "Gulu market"
    );
}

#[test]
fn test_index_outage_and_recovery() {
    let (app, index) = app_with_switch();
    app.posts().create(&Post::new(1, "baseline entry")).unwrap();

    index.set_down(true);
    let (id, outcome) = app
        .db()
        .transaction_with_outcome(|txn| txn.insert_entity(&Post::new(1, "written during outage")))
        .unwrap();
    assert!(!outcome.is_clean());
    assert!(matches!(outcome.index_failures[0].error, Error::IndexSync { .. }));

    // The store is right even though the index is not
    let stored = app.posts().get(id.clone()).unwrap().unwrap();
    assert_eq!(stored.body, "written during outage");

    // Degraded search is an error, not an empty page
    assert!(app.posts().search("outage", 1).unwrap_err().is_search_unavailable());

    index.set_down(false);
    assert_eq!(app.posts().search("outage", 1).unwrap().total, 0);

    let reports = app.reindex_all().unwrap();
    let post_report = reports
        .iter()
        .find(|r| r.entity_type == Post::TYPE_NAME)
        .unwrap();
    assert_eq!(post_report.indexed, 2);
    assert_eq!(app.posts().search("outage", 1).unwrap().items[0].id, id);
    assert_eq!(app.posts().search("baseline", 1).unwrap().total, 1);
}

#[test]
fn test_first_committer_wins() {
    let app = Nodwatch::open_in_memory().unwrap();
    let id = app.posts().create(&Post::new(1, "height 92cm")).unwrap();

    let mut a = app.db().begin();
    let mut b = app.db().begin();
    a.update("post", id.clone(), json!({ "body": "height 93cm", "timestamp": chrono::Utc::now(), "user_id": 1 }))
        .unwrap();
    b.delete(&EntityKey::new("post", id.clone())).unwrap();

    a.commit().unwrap();
    let err = b.commit().unwrap_err();
    assert!(err.is_primary_failure());

    assert_eq!(app.posts().get(id.clone()).unwrap().unwrap().body, "height 93cm");
    assert_eq!(app.posts().search("93cm", 1).unwrap().items[0].id, id);
}

#[test]
fn test_deferred_mode_end_to_end() {
    let mut config = NodwatchConfig::default();
    config.search.sync_mode = "deferred".into();
    let app = Nodwatch::with_config(config).unwrap();

    for n in 0..10 {
        app.waypoints()
            .create(&Waypoint::new(2, format!("checkpoint {}", n)))
            .unwrap();
    }
    app.db().flush_index();

    assert_eq!(app.waypoints().search("checkpoint", 1).unwrap().total, 10);
}

#[test]
fn test_disabled_search_still_stores() {
    let mut config = NodwatchConfig::default();
    config.search.enabled = false;
    let app = Nodwatch::with_config(config).unwrap();

    let id = app.posts().create(&Post::new(1, "offline note")).unwrap();
    assert!(app.posts().get(id).unwrap().is_some());
    assert!(app.posts().search("offline", 1).unwrap_err().is_search_unavailable());
}
