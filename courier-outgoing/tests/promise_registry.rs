//! Registry behaviour: matching, ordering, timeouts, explicit rejection, and
//! notification/send-cache side effects.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::time::{advance, sleep};

use courier_core::{
    Attachment, ChatGuid, ChatRef, EventCategory, Message, MessageGuid, Notification,
    NotificationSink, OutgoingSettings, RejectReason,
};
use courier_outgoing::{OutgoingRegistry, PendingSends, SendRequest};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Notification>>,
}

impl Recorder {
    fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.lock())
    }
}

impl NotificationSink for Recorder {
    fn notify(&self, notification: &Notification) {
        self.seen.lock().push(notification.clone());
    }
}

fn registry() -> (OutgoingRegistry, Arc<Recorder>, Arc<PendingSends>) {
    let recorder = Arc::new(Recorder::default());
    let sends = Arc::new(PendingSends::new());
    let registry = OutgoingRegistry::builder(OutgoingSettings::default())
        .sink(recorder.clone())
        .send_cache(sends.clone())
        .build();
    (registry, recorder, sends)
}

fn row(guid: &str, chat: &str, text: &str, created: i64) -> Arc<Message> {
    Arc::new(Message {
        guid: MessageGuid::from(guid),
        text: Some(text.to_string()),
        is_from_me: true,
        date_created: t(created),
        chats: vec![ChatRef {
            guid: ChatGuid::from(chat),
            ..ChatRef::default()
        }],
        ..Message::default()
    })
}

// ---------------------------------------------------------------------------
// 1. Matching
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn text_send_resolves_on_normalised_match() {
    let (registry, recorder, sends) = registry();
    sends.add("temp-1");
    let handle = registry.register(
        SendRequest::text("C1", "Hello World")
            .submitted_at(t(0))
            .temp_guid("temp-1"),
    );

    let candidate = row("m-1", "iMessage;-;C1", "Hello World!!", 1);
    assert!(registry.try_match(&candidate));

    let message = handle.wait().await.expect("resolved");
    assert_eq!(message.guid.0, "m-1");
    assert_eq!(registry.pending(), 0);
    assert!(!sends.contains("temp-1"), "send cache entry is dropped");

    let notifications = recorder.take();
    assert_eq!(notifications.len(), 1, "exactly one match notification");
    assert!(matches!(
        &notifications[0],
        Notification::MessageMatch { temp_guid: Some(guid), .. } if guid == "temp-1"
    ));
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn attachment_send_resolves_by_transfer_name() {
    let (registry, _recorder, _sends) = registry();
    let handle = registry.register(SendRequest::attachment("C1", "photo").submitted_at(t(0)));

    let mut candidate = (*row("m-2", "iMessage;-;C1", "\u{fffc}", 5)).clone();
    candidate.attachments.push(Attachment {
        transfer_name: Some("photo.jpg".into()),
        ..Attachment::default()
    });
    assert!(registry.try_match(&Arc::new(candidate)));
    assert_eq!(handle.wait().await.expect("resolved").guid.0, "m-2");
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn identical_sends_resolve_in_registration_order() {
    let (registry, _recorder, _sends) = registry();
    let first = registry.register(
        SendRequest::text("C1", "ok").submitted_at(t(0)).temp_guid("first"),
    );
    let second = registry.register(
        SendRequest::text("C1", "ok").submitted_at(t(0)).temp_guid("second"),
    );

    assert!(registry.try_match(&row("m-a", "C1", "ok", 1)));
    assert_eq!(first.wait().await.expect("first").guid.0, "m-a");
    assert_eq!(registry.pending(), 1);

    assert!(registry.try_match(&row("m-b", "C1", "ok", 2)));
    assert_eq!(second.wait().await.expect("second").guid.0, "m-b");
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn one_row_never_resolves_two_sends() {
    let (registry, _recorder, _sends) = registry();
    let _first = registry.register(SendRequest::text("C1", "ok").submitted_at(t(0)));
    let _second = registry.register(SendRequest::text("C1", "ok").submitted_at(t(0)));

    let candidate = row("m-a", "C1", "ok", 1);
    assert!(registry.try_match(&candidate));
    assert!(
        !registry.try_match(&candidate),
        "a row seen again through an overlapping window is not a second send"
    );
    assert_eq!(registry.pending(), 1);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn row_without_chat_joins_still_resolves() {
    let (registry, _recorder, _sends) = registry();
    let handle = registry.register(SendRequest::text("C1", "Hello World").submitted_at(t(0)));

    let mut candidate = (*row("m-bare", "C1", "Hello World!!", 1)).clone();
    candidate.chats.clear();
    assert!(registry.try_match(&Arc::new(candidate)));
    assert_eq!(handle.wait().await.expect("resolved").guid.0, "m-bare");
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn older_identical_row_does_not_match() {
    let (registry, _recorder, _sends) = registry();
    let _handle = registry.register(SendRequest::text("C1", "ok").submitted_at(t(10)));
    assert!(!registry.try_match(&row("m-old", "C1", "ok", 9)));
    assert_eq!(registry.pending(), 1);
}

// ---------------------------------------------------------------------------
// 2. Rejection and timeouts
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn unmatched_text_send_times_out_once() {
    let (registry, recorder, _sends) = registry();
    let handle = registry.register(
        SendRequest::text("C1", "hello").submitted_at(t(0)).temp_guid("temp-9"),
    );

    advance(Duration::from_secs(29)).await;
    assert_eq!(registry.pending(), 1, "still pending before the timeout");

    sleep(Duration::from_secs(2)).await;
    let err = handle.wait().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.temp_guid.as_deref(), Some("temp-9"));

    assert!(
        !registry.try_match(&row("m-late", "C1", "hello", 40)),
        "late match is a no-op"
    );
    let errors: Vec<_> = recorder
        .take()
        .into_iter()
        .filter(|n| matches!(n, Notification::MessageError { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn attachment_sends_wait_three_minutes() {
    let (registry, _recorder, _sends) = registry();
    let _handle = registry.register(SendRequest::attachment("C1", "clip.mov").submitted_at(t(0)));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(registry.pending(), 1);

    sleep(Duration::from_secs(121)).await;
    assert_eq!(registry.pending(), 0);
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn resolved_send_never_times_out() {
    let (registry, recorder, _sends) = registry();
    let handle = registry.register(SendRequest::text("C1", "hi").submitted_at(t(0)));
    assert!(registry.try_match(&row("m-1", "C1", "hi", 1)));
    assert!(handle.wait().await.is_ok());

    sleep(Duration::from_secs(60)).await;
    let notifications = recorder.take();
    assert_eq!(notifications.len(), 1);
    assert!(matches!(notifications[0], Notification::MessageMatch { .. }));
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn explicit_rejection_wins_over_timeout() {
    let (registry, recorder, sends) = registry();
    sends.add("temp-2");
    let handle = registry.register(
        SendRequest::text("C1", "hi").submitted_at(t(0)).temp_guid("temp-2"),
    );

    let reason = RejectReason::Other {
        detail: "executor failed".into(),
    };
    assert!(registry.reject("temp-2", reason.clone()));
    assert!(!registry.reject("temp-2", reason.clone()), "second reject is a no-op");

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.reason, reason);
    assert!(!sends.contains("temp-2"));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(recorder.take().len(), 1, "no stray timeout after rejection");
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn send_error_row_rejects_with_code() {
    let (registry, recorder, _sends) = registry();
    let handle = registry.register(SendRequest::text("C1", "hi").submitted_at(t(0)));

    let mut failed = (*row("m-err", "C1", "hi", 1)).clone();
    failed.error = 22;
    let failed = Arc::new(failed);
    registry.notify(&Notification::Events {
        category: EventCategory::MessageSendError,
        messages: vec![failed.clone()],
    });

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.reason, RejectReason::SendFailed { code: 22 });
    assert_eq!(err.message.as_deref(), Some(&*failed));
    assert!(matches!(
        recorder.take().as_slice(),
        [Notification::MessageError { message: Some(_), .. }]
    ));
}

// ---------------------------------------------------------------------------
// 3. Sink integration
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn registry_as_sink_only_consumes_outgoing_categories() {
    let (registry, _recorder, _sends) = registry();
    let _handle = registry.register(SendRequest::text("C1", "hi").submitted_at(t(0)));

    registry.notify(&Notification::Events {
        category: EventCategory::NewMessage,
        messages: vec![row("m-in", "C1", "hi", 1)],
    });
    assert_eq!(registry.pending(), 1, "inbound rows are not outgoing sends");

    registry.notify(&Notification::Events {
        category: EventCategory::SelfMessage,
        messages: vec![row("m-out", "C1", "hi", 1)],
    });
    assert_eq!(registry.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_matches_settle_each_send_once() {
    let (registry, recorder, _sends) = registry();
    let handles: Vec<_> = (0..16)
        .map(|_| registry.register(SendRequest::text("C1", "ping").submitted_at(t(0))))
        .collect();

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.try_match(&row(&format!("m-{i}"), "C1", "ping", 1)) })
        })
        .collect();
    let mut matched = 0;
    for task in tasks {
        if task.await.expect("join") {
            matched += 1;
        }
    }

    assert_eq!(matched, 16);
    for handle in handles {
        assert!(handle.wait().await.is_ok());
    }
    assert_eq!(recorder.take().len(), 16);
}
