use std::sync::Arc;
use std::time::Duration;

use backchat_client::api::{
    ChannelEvent, ChannelState, Error, ThreadId, User, UserId, VideoId,
};
use backchat_client::{Engine, UiEvent};
use backchat_mock_server::{FixedIdentity, MemoryCache, MockServer};
use serde_json::json;

fn me() -> User {
    User {
        id: UserId(String::from("me")),
        username: String::from("me-name"),
    }
}

fn bob() -> User {
    User {
        id: UserId(String::from("bob")),
        username: String::from("bob-name"),
    }
}

fn engine_for(server: &MockServer, cache: MemoryCache, user: Option<User>) -> Engine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let identity = match user {
        Some(user) => FixedIdentity::new(user),
        None => FixedIdentity::anonymous(),
    };
    Engine::new(
        Arc::new(server.clone()),
        Arc::new(server.clone()),
        Arc::new(cache),
        Arc::new(identity),
    )
}

fn engine(server: &MockServer) -> Engine {
    engine_for(server, MemoryCache::new(), Some(me()))
}

fn tid(id: &str) -> ThreadId {
    ThreadId(String::from(id))
}

#[tokio::test(start_paused = true)]
async fn optimistic_post_is_visible_then_confirmed() {
    let server = MockServer::new();
    server.set_latency(Duration::from_millis(200));
    let engine = engine(&server);
    let video = VideoId::new("V1");
    let mut events = engine.subscribe();

    let posted = engine.post_message(&video, "hi", None).unwrap();
    // Visible before the remote call resolves, under its temporary id.
    assert!(posted.id.is_provisional());
    let feed = engine.public_comments(&video);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, posted.id);
    assert_eq!(
        events.try_recv().unwrap(),
        UiEvent::NewCommentPosted {
            video: video.clone(),
            is_private: false,
        }
    );

    // After the simulated 200ms network, same single entry, server id.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let feed = engine.public_comments(&video);
    assert_eq!(feed.len(), 1);
    assert!(!feed[0].id.is_provisional());
    assert_eq!(feed[0].text, "hi");
    // The posted-event fired exactly once, at insertion time.
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn private_post_lands_in_thread_without_public_event() {
    let server = MockServer::new();
    let engine = engine(&server);
    let video = VideoId::new("V1");
    let mut events = engine.subscribe();

    engine
        .post_message(&video, "psst", Some(tid("T1")))
        .unwrap();
    let thread = engine.private_thread(&video, &tid("T1"));
    assert_eq!(thread.len(), 1);
    assert!(thread[0].is_private);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn failed_creation_keeps_the_provisional_entry() {
    let server = MockServer::new();
    server.fail_next_create();
    let engine = engine(&server);
    let video = VideoId::new("V1");

    engine.post_message(&video, "draft", None).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The user's text is not rolled back on failure.
    let feed = engine.public_comments(&video);
    assert_eq!(feed.len(), 1);
    assert!(feed[0].id.is_provisional());
    assert_eq!(feed[0].text, "draft");
}

#[tokio::test(start_paused = true)]
async fn confirmation_appends_when_reconciliation_evicted_the_provisional() {
    let server = MockServer::new();
    server.set_latency(Duration::from_millis(300));
    let engine = engine(&server);
    let video = VideoId::new("V1");

    engine
        .post_message(&video, "hello there", Some(tid("T1")))
        .unwrap();
    // Let the create call get in flight before dropping the latency.
    tokio::task::yield_now().await;
    // A reconciliation lands while the create is still pending; the server
    // does not know thread T1 yet, so the provisional entry is evicted.
    server.set_latency(Duration::ZERO);
    engine.reconcile(&video).await.unwrap();
    assert!(engine.private_thread(&video, &tid("T1")).is_empty());

    // The confirmed comment is appended rather than lost.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let thread = engine.private_thread(&video, &tid("T1"));
    assert_eq!(thread.len(), 1);
    assert!(!thread[0].id.is_provisional());
    assert_eq!(thread[0].text, "hello there");
}

#[tokio::test(start_paused = true)]
async fn reconcile_drops_threads_the_server_no_longer_has() {
    let server = MockServer::new();
    let engine = engine(&server);
    let video = VideoId::new("V1");
    server.seed_comment(&video, &bob(), "in A", Some(&tid("A")));
    server.seed_comment(&video, &bob(), "in B", Some(&tid("B")));

    engine.reconcile(&video).await.unwrap();
    assert_eq!(engine.private_thread(&video, &tid("A")).len(), 1);
    assert_eq!(engine.private_thread(&video, &tid("B")).len(), 1);

    server.remove_thread(&video, &tid("B"));
    engine.reconcile(&video).await.unwrap();
    assert_eq!(engine.private_thread(&video, &tid("A")).len(), 1);
    assert!(engine.private_thread(&video, &tid("B")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_reconcile_that_started_earlier_is_dropped() {
    let server = MockServer::new();
    let engine = engine(&server);
    let video = VideoId::new("V1");
    let first = server.seed_comment(&video, &bob(), "first", None);

    // A slow pass gets its sequence number, then stalls on the network.
    server.set_latency(Duration::from_millis(500));
    let slow = {
        let engine = engine.clone();
        let video = video.clone();
        tokio::spawn(async move { engine.reconcile(&video).await })
    };
    tokio::task::yield_now().await;

    // A later pass overtakes it and applies.
    server.set_latency(Duration::ZERO);
    engine.reconcile(&video).await.unwrap();
    assert_eq!(engine.public_comments(&video).len(), 1);

    // When the slow pass finally resolves it sees fresher server state, but
    // its sequence number is older than the applied one, so it is dropped.
    server.seed_comment(&video, &bob(), "second", None);
    tokio::time::sleep(Duration::from_millis(600)).await;
    slow.await.unwrap().unwrap();
    let feed = engine.public_comments(&video);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, first.id);

    // The next pass catches up normally.
    engine.reconcile(&video).await.unwrap();
    assert_eq!(engine.public_comments(&video).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unread_breakdown_for_prefixed_key_lands_under_normalized_id() {
    let server = MockServer::new();
    server.set_unread_payload(
        "FILE#V2",
        json!({ "total": 2, "threads": { "T1": 2, "T2": 0 } }),
    );
    let engine = engine(&server);
    let video = VideoId::new("V2");
    let mut events = engine.subscribe();

    engine.load_unread_counts(&video).await.unwrap();
    assert!(engine.is_thread_unread(&video, &tid("T1")));
    assert!(!engine.is_thread_unread(&video, &tid("T2")));
    assert_eq!(engine.unread_count(&video), 2);
    assert_eq!(
        events.try_recv().unwrap(),
        UiEvent::UnreadChanged {
            video: video.clone(),
            unread: 2,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn live_private_comment_bumps_unread_and_survives_zero_reports() {
    let server = MockServer::new();
    server.set_channel_state(ChannelState::Connected);
    let engine = engine(&server);
    let video = VideoId::new("V1");
    let _feed = engine.start_feed();
    tokio::time::sleep(Duration::from_millis(1)).await;

    server.push_event(ChannelEvent::NewComment {
        video: video.clone(),
        thread: Some(tid("TA")),
        is_private: true,
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    // Indicator set before any network confirmation.
    assert!(engine.is_thread_unread(&video, &tid("TA")));
    assert_eq!(engine.unread_count(&video), 1);

    // A later report that says nothing about TA (zero for another thread)
    // must not clear the indicator.
    server.set_unread_payload("V1", json!({ "total": 0, "threads": { "TB": 0 } }));
    engine.load_unread_counts(&video).await.unwrap();
    assert!(engine.is_thread_unread(&video, &tid("TA")));
    assert!(engine.unread_count(&video) >= 1);

    // But a confirmation promotes it and stays.
    server.set_unread_payload("V1", json!({ "total": 1, "threads": { "TA": 1 } }));
    engine.load_unread_counts(&video).await.unwrap();
    assert!(engine.is_thread_unread(&video, &tid("TA")));
    assert_eq!(engine.unread_count(&video), 1);
}

#[tokio::test(start_paused = true)]
async fn mark_thread_read_clears_flag_and_acks_remotely() {
    let server = MockServer::new();
    server.set_unread_payload("V1", json!({ "total": 1, "threads": { "T1": 1 } }));
    let engine = engine(&server);
    let video = VideoId::new("V1");

    engine.load_unread_counts(&video).await.unwrap();
    assert!(engine.is_thread_unread(&video, &tid("T1")));

    engine.mark_thread_read(&video, &tid("T1")).unwrap();
    assert!(!engine.is_thread_unread(&video, &tid("T1")));
    assert_eq!(engine.unread_count(&video), 0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(server.read_acks(), vec![(video.clone(), tid("T1"))]);
}

#[tokio::test(start_paused = true)]
async fn like_toggles_optimistically_and_reports_target_state() {
    let server = MockServer::new();
    let engine = engine(&server);
    let video = VideoId::new("V1");
    let seeded = server.seed_comment(&video, &bob(), "nice video", None);

    engine.reconcile(&video).await.unwrap();
    engine.like_message(&video, &seeded.id).unwrap();

    let feed = engine.public_comments(&video);
    assert!(feed[0].liked_by_me);
    assert_eq!(feed[0].like_count, 1);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(server.like_calls(), vec![(seeded.id.clone(), true)]);

    // And back again.
    engine.like_message(&video, &seeded.id).unwrap();
    let feed = engine.public_comments(&video);
    assert!(!feed[0].liked_by_me);
    assert_eq!(feed[0].like_count, 0);
}

#[tokio::test(start_paused = true)]
async fn roster_is_regenerated_on_reconcile() {
    let server = MockServer::new();
    let engine = engine(&server);
    let video = VideoId::new("V1");
    server.seed_comment(&video, &bob(), "first!", None);

    engine.reconcile(&video).await.unwrap();
    let roster = engine.roster(&video);
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].other_participant, "bob-name");
    assert!(!roster[0].has_unread);
}

#[tokio::test(start_paused = true)]
async fn cached_comments_survive_restart_without_network() {
    let cache = MemoryCache::new();
    let server = MockServer::new();
    let engine = engine_for(&server, cache.clone(), Some(me()));
    let video = VideoId::new("V1");

    engine.post_message(&video, "hi", None).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // New process, empty server: cached state is visible before any fetch.
    let restarted = engine_for(&MockServer::new(), cache, Some(me()));
    restarted.load_cached();
    let feed = restarted.public_comments(&video);
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].text, "hi");
}

#[tokio::test(start_paused = true)]
async fn polling_kicks_in_while_disconnected_and_stops_on_connect() {
    let server = MockServer::new();
    let engine = engine(&server);
    let video = VideoId::new("V1");

    engine.watch(&video);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let baseline = server.list_calls();

    let _feed = engine.start_feed();
    // Not yet: still inside the connect grace period.
    tokio::time::sleep(Duration::from_millis(1900)).await;
    assert_eq!(server.list_calls(), baseline);

    // Grace expired: first poll fires, then one every three seconds.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.list_calls(), baseline + 1);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(server.list_calls(), baseline + 2);

    // Connection comes up: polling stops immediately.
    server.set_channel_state(ChannelState::Connected);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let settled = server.list_calls();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.list_calls(), settled);
}

#[tokio::test(start_paused = true)]
async fn unauthenticated_calls_fail_synchronously() {
    let server = MockServer::new();
    let engine = engine_for(&server, MemoryCache::new(), None);
    let video = VideoId::new("V1");

    assert_eq!(
        engine.post_message(&video, "hi", None).unwrap_err(),
        Error::NotAuthenticated
    );
    assert_eq!(
        engine
            .like_message(&video, &backchat_client::api::CommentId(String::from("c")))
            .unwrap_err(),
        Error::NotAuthenticated
    );
    assert_eq!(
        engine.mark_thread_read(&video, &tid("T")).unwrap_err(),
        Error::NotAuthenticated
    );
}
