//! Domain facades sharing one database

use nodwatch::{Nodwatch, Post, Waypoint};
use serde_json::json;

#[test]
fn test_user_timeline() {
    let app = Nodwatch::open_in_memory().unwrap();
    let posts = app.posts();

    let mut older = Post::new(4, "intake: weight 9.1kg").with_measurements(78.0, 9.1);
    older.timestamp = chrono::Utc::now() - chrono::Duration::days(7);
    posts.create(&older).unwrap();
    posts
        .create(&Post::new(4, "follow-up: weight 9.8kg").with_muac(12.4))
        .unwrap();
    posts.create(&Post::new(5, "other patient")).unwrap();

    let timeline = posts.list_by_user(4).unwrap();
    assert_eq!(timeline.len(), 2);
    assert!(timeline[0].body.starts_with("follow-up"));
    assert_eq!(timeline[0].muac, Some(12.4));
    assert!(timeline[1].bmi.is_some());
}

#[test]
fn test_waypoint_route() {
    let app = Nodwatch::open_in_memory().unwrap();
    let id = app
        .waypoints()
        .create(
            &Waypoint::new(4, "Anaka health centre")
                .with_route(("32.05", "2.60"), ("32.30", "2.78"))
                .with_description("monthly weighing"),
        )
        .unwrap();

    let stored = app.waypoints().get(id).unwrap().unwrap();
    assert_eq!(stored.tolat.as_deref(), Some("2.78"));
    assert_eq!(stored.color, nodwatch_primitives::DEFAULT_COLOR);
}

#[test]
fn test_task_lifecycle_with_notifications() {
    let app = Nodwatch::open_in_memory().unwrap();
    let notes = app.notifications().clone();

    let task = app
        .tasks()
        .launch(9, "export_posts", Some("Exporting posts..."), move |ctx| {
            ctx.set_progress(50);
            notes.add(9, "task_progress", json!({ "task_id": ctx.job_id(), "progress": 50 }))?;
            Ok(())
        })
        .unwrap();
    app.db().jobs().wait_idle();

    let task_id = task.id.as_str().unwrap();
    assert!(app.tasks().get(task_id).unwrap().unwrap().complete);
    assert_eq!(app.tasks().progress(task_id), 100);
    assert!(app.tasks().in_progress_named(9, "export_posts").unwrap().is_none());

    let pending = app.notifications().since(9, 0.0).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].payload["task_id"], json!(task_id));
}

#[test]
fn test_tasks_and_notifications_are_not_indexed() {
    let app = Nodwatch::open_in_memory().unwrap();
    app.notifications().add(1, "export", json!("ready")).unwrap();

    assert!(!app.db().registry().is_searchable("notification"));
    assert!(!app.db().registry().is_searchable("task"));
    assert!(app.db().registry().is_searchable("post"));
    assert!(app.db().registry().is_searchable("waypoint"));
}

#[test]
fn test_messaging_drives_unread_notification() {
    let app = Nodwatch::open_in_memory().unwrap();
    let messages = app.messages();

    messages.send_text(1, 2, "Amina missed her weighing").unwrap();
    messages.send_text(3, 2, "village visit on Monday").unwrap();

    let unread = |app: &Nodwatch| {
        app.notifications()
            .since(2, 0.0)
            .unwrap()
            .into_iter()
            .find(|n| n.name == nodwatch::UNREAD_MESSAGE_COUNT)
            .unwrap()
            .value
            .payload
    };
    assert_eq!(messages.unread_count(2).unwrap(), 2);
    assert_eq!(unread(&app), json!(2));

    let inbox = messages.inbox(2, 1).unwrap();
    assert_eq!(inbox.total, 2);
    assert_eq!(inbox.items[0].sender_id, 3);

    messages.mark_read(2).unwrap();
    assert_eq!(messages.unread_count(2).unwrap(), 0);
    assert_eq!(unread(&app), json!(0));
    assert_eq!(app.notifications().since(2, 0.0).unwrap().len(), 1);
}
