//! Message timeline synchronizer tests
//!
//! Each test drives a `MemoryStore` directly and observes an open timeline.

mod common;

use common::*;
use serde_json::json;
use valetchat_core::store::paths;
use valetchat_core::{
    MediaKind, MessageId, ResolvedMedia, SubscriptionStatus, TimelineEvent, TimelineHandle,
};

fn texts(timeline: &TimelineHandle) -> Vec<String> {
    timeline
        .messages()
        .iter()
        .filter_map(|m| m.body.as_text().map(str::to_string))
        .collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_out_of_order_arrival_is_sorted_by_sent_at() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();

    // Index keys arrive a, b, c; timestamps say b, c, a.
    seed_text(&store, "a", "111", "222", "third", 3_000);
    seed_text(&store, "b", "222", "111", "first", 1_000);
    seed_text(&store, "c", "111", "222", "second", 2_000);

    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    wait_until("three messages", || timeline.messages().len() == 3).await;
    assert_eq!(texts(&timeline), vec!["first", "second", "third"]);

    // A late message older than everything still lands first.
    seed_text(&store, "d", "111", "222", "zeroth", 500);
    wait_until("four messages", || timeline.messages().len() == 4).await;
    assert_eq!(texts(&timeline), vec!["zeroth", "first", "second", "third"]);
}

#[tokio::test]
async fn test_snapshots_are_full_and_sorted() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = timeline.subscribe();

    seed_text(&store, "m2", "111", "222", "later", 2_000);
    let first = next_matching(&mut events, |e| e.snapshot().map(<[_]>::to_vec)).await;
    assert_eq!(first.len(), 1);

    seed_text(&store, "m1", "111", "222", "earlier", 1_000);
    let second = next_matching(&mut events, |e| e.snapshot().map(<[_]>::to_vec)).await;
    let ids: Vec<&str> = second.iter().map(|e| e.id().as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
}

#[tokio::test]
async fn test_legacy_records_without_millis() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();

    for (id, date, text) in [("a", "03/02/19", "march"), ("b", "01/15/19", "january")] {
        store.seed(
            &paths::message(&MessageId::new(id)),
            json!({"senderId": "111", "receiverId": "222", "sentAt": date, "text": text}),
        );
        seed_index(&store, "222", id);
    }

    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    wait_until("two messages", || timeline.messages().len() == 2).await;
    assert_eq!(texts(&timeline), vec!["january", "march"]);
}

// ============================================================================
// Scoping and failure isolation
// ============================================================================

#[tokio::test]
async fn test_other_conversations_are_filtered_out() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();

    seed_text(&store, "x", "333", "222", "from carol", 1_000);
    seed_text(&store, "y", "111", "222", "from ada", 2_000);

    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    wait_until("ada's message", || timeline.messages().len() == 1).await;
    settle().await;
    assert_eq!(texts(&timeline), vec!["from ada"]);
}

#[tokio::test]
async fn test_malformed_record_is_skipped_and_subscription_survives() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = timeline.subscribe();

    store.seed(
        &paths::message(&MessageId::new("bad")),
        json!({"senderId": "111", "sentAt": "01/01/19", "text": "no receiver"}),
    );
    seed_index(&store, "222", "bad");

    let (skipped, reason) = next_matching(&mut events, |e| match e {
        TimelineEvent::ItemSkipped { message_id, reason } => {
            Some((message_id.clone(), reason.clone()))
        }
        _ => None,
    })
    .await;
    assert_eq!(skipped, Some(MessageId::new("bad")));
    assert!(reason.contains("receiverId"));

    seed_text(&store, "good", "111", "222", "still here", 1_000);
    wait_until("good message", || timeline.messages().len() == 1).await;
    assert_eq!(timeline.status(), SubscriptionStatus::Live);
}

#[tokio::test]
async fn test_dangling_index_entry_is_skipped() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = timeline.subscribe();

    seed_index(&store, "222", "ghost");
    let skipped = next_matching(&mut events, |e| match e {
        TimelineEvent::ItemSkipped { message_id, .. } => Some(message_id.clone()),
        _ => None,
    })
    .await;
    assert_eq!(skipped, Some(MessageId::new("ghost")));
    assert!(timeline.messages().is_empty());
}

#[tokio::test]
async fn test_skipped_message_lands_in_jsonl_log() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = timeline.subscribe();

    seed_index(&store, "222", "phantom-42");
    next_matching(&mut events, |e| match e {
        TimelineEvent::ItemSkipped { .. } => Some(()),
        _ => None,
    })
    .await;

    let logged = log_entries().into_iter().find(|entry| {
        entry.msg == "skipping message"
            && entry
                .fields
                .as_ref()
                .and_then(|f| f["message_id"].as_str())
                .map_or(false, |id| id.contains("phantom-42"))
    });
    let entry = logged.expect("skipped message in the JSONL log");
    assert_eq!(entry.level, "warn");
    assert_eq!(entry.device, LOG_DEVICE);
    assert!(entry.target.starts_with("valetchat_core::sync"));
}

#[tokio::test]
async fn test_denied_subscription_reports_failure() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    store.deny_access(true);

    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = timeline.subscribe();
    let reason = next_matching(&mut events, |e| match e {
        TimelineEvent::SubscriptionFailed { reason } => Some(reason.clone()),
        _ => None,
    })
    .await;
    assert!(reason.contains("Permission denied"));
    wait_until("failed status", || {
        matches!(timeline.status(), SubscriptionStatus::Failed(_))
    })
    .await;
}

// ============================================================================
// Media
// ============================================================================

#[tokio::test]
async fn test_photo_is_inserted_with_resolved_media() {
    let (store, engine) = engine();
    let ada = engine.register("111", "Ada", "Lovelace").await.unwrap();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();

    let bob_view = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = bob_view.subscribe();
    let sent = engine
        .outbox(&ada)
        .send_media(&user("222"), &png_bytes(6, 4), MediaKind::Image)
        .await
        .unwrap();

    let resolved = next_matching(&mut events, |e| match e {
        TimelineEvent::MediaResolved { message_id } => Some(message_id.clone()),
        _ => None,
    })
    .await;
    assert_eq!(resolved, sent.id);

    let entries = bob_view.entries();
    assert_eq!(entries.len(), 1);
    match entries[0].media.as_ref() {
        Some(ResolvedMedia::Image { width, height, .. }) => assert_eq!((*width, *height), (6, 4)),
        other => panic!("expected resolved image, got {:?}", other),
    }
    assert_eq!(store.object_count(), 1);
}

#[tokio::test]
async fn test_failed_media_download_omits_message() {
    let (store, engine) = engine();
    let ada = engine.register("111", "Ada", "Lovelace").await.unwrap();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    store.fail_downloads(Some(404));

    let bob_view = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = bob_view.subscribe();
    let outbox = engine.outbox(&ada);
    let voice = outbox
        .send_media(&user("222"), b"aac", MediaKind::Audio)
        .await
        .unwrap();

    let (skipped, reason) = next_matching(&mut events, |e| match e {
        TimelineEvent::ItemSkipped { message_id, reason } => {
            Some((message_id.clone(), reason.clone()))
        }
        _ => None,
    })
    .await;
    assert_eq!(skipped, Some(voice.id));
    assert!(reason.contains("404"));

    outbox.send_text(&user("222"), "did you get it?").await.unwrap();
    wait_until("text message", || bob_view.messages().len() == 1).await;
    assert_eq!(texts(&bob_view), vec!["did you get it?"]);
}

// ============================================================================
// Title and lifecycle
// ============================================================================

#[tokio::test]
async fn test_counterpart_name_follows_profile() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    seed_profile(&store, "111", "Ada Lovelace");

    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    let mut events = timeline.subscribe();
    let name = next_matching(&mut events, |e| match e {
        TimelineEvent::CounterpartRenamed { display_name } => Some(display_name.clone()),
        _ => None,
    })
    .await;
    assert_eq!(name, "Ada Lovelace");

    seed_profile(&store, "111", "Ada King");
    let renamed = next_matching(&mut events, |e| match e {
        TimelineEvent::CounterpartRenamed { display_name } => Some(display_name.clone()),
        _ => None,
    })
    .await;
    assert_eq!(renamed, "Ada King");
    assert_eq!(timeline.counterpart_name().as_deref(), Some("Ada King"));
}

#[tokio::test]
async fn test_close_unsubscribes() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    assert_eq!(store.active_subscriptions(), 2);

    with_timeout(timeline.close()).await;
    assert_eq!(store.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_dropping_handle_unsubscribes() {
    let (store, engine) = engine();
    let bob = engine.register("222", "Bob", "Byrne").await.unwrap();
    let timeline = engine.open_conversation(&bob, user("111")).unwrap();
    drop(timeline);

    wait_until("subscriptions released", || store.active_subscriptions() == 0).await;
}
