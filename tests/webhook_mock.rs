mod common;

use common::{test_config, SCHEDULE_EVENT_COUNT, SCHEDULE_HTML};
use cruisecal::components::notifier::{ChangeNotice, Notifier, WebhookNotifier};
use cruisecal::components::source::{HttpSource, ScheduleSource};
use cruisecal::error::Error;
use cruisecal::orchestrator::{NotifyStatus, Orchestrator};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn notice() -> ChangeNotice {
    ChangeNotice {
        calendar_name: "The Rock Boat XXV".to_string(),
        event_count: 9,
        skipped_count: 0,
        first_run: false,
        schedule_page_url: Some("https://www.therockboat.com/schedule/".to_string()),
        calendar_url: Some("https://example.github.io/rockboat_schedule.ics".to_string()),
    }
}

#[tokio::test]
async fn test_http_source_fetches_page() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/schedule/print/")
        .match_header("user-agent", Matcher::Regex("RockBoatCalendarBot".to_string()))
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(SCHEDULE_HTML)
        .create_async()
        .await;

    let url = format!("{}/schedule/print/", server.url());
    let source = HttpSource::new(vec![url.clone()], TIMEOUT);
    let page = source.fetch().await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.url, url);
    assert_eq!(page.status, 200);
    assert_eq!(page.body, SCHEDULE_HTML);
}

#[tokio::test]
async fn test_http_source_joins_pages_in_order() {
    let mut server = Server::new_async().await;
    let _day1 = server
        .mock("GET", "/day1")
        .with_body("Thursday, January 29\nSail Away 4:00 - 5:00")
        .create_async()
        .await;
    let _day2 = server
        .mock("GET", "/day2")
        .with_body("Friday, January 30\nTrivia 10:00 - 11:00")
        .create_async()
        .await;

    let source = HttpSource::new(
        vec![
            format!("{}/day1", server.url()),
            format!("{}/day2", server.url()),
        ],
        TIMEOUT,
    );
    let page = source.fetch().await.unwrap();

    assert_eq!(
        page.body,
        "Thursday, January 29\nSail Away 4:00 - 5:00\nFriday, January 30\nTrivia 10:00 - 11:00"
    );
}

#[tokio::test]
async fn test_http_source_rejects_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/schedule/print/")
        .with_status(503)
        .create_async()
        .await;

    let url = format!("{}/schedule/print/", server.url());
    let err = HttpSource::new(vec![url.clone()], TIMEOUT)
        .fetch()
        .await
        .unwrap_err();

    match err {
        Error::Fetch { url: failed, message } => {
            assert_eq!(failed, url);
            assert!(message.contains("503"), "unexpected message: {}", message);
        }
        other => panic!("expected a fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_webhook_posts_blocks_payload() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "text": "🚢🎸 The Rock Boat XXV Schedule Updated!",
            "blocks": [
                { "type": "header" },
                { "type": "section" },
                { "type": "actions" }
            ]
        })))
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let notifier = WebhookNotifier::new(format!("{}/hook", server.url()), TIMEOUT);
    notifier.notify(&notice()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_webhook_error_is_recoverable() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/hook")
        .with_status(500)
        .with_body("invalid_payload")
        .create_async()
        .await;

    let notifier = WebhookNotifier::new(format!("{}/hook", server.url()), TIMEOUT);
    let err = notifier.notify(&notice()).await.unwrap_err();

    assert!(matches!(err, Error::Notify(_)));
    assert!(err.to_string().contains("invalid_payload"));
}

#[tokio::test]
async fn test_full_run_over_http() {
    let mut server = Server::new_async().await;
    let page = server
        .mock("GET", "/schedule/print/")
        .with_body(SCHEDULE_HTML)
        .expect(2)
        .create_async()
        .await;
    let hook = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(json!({
            "text": "🚢🎸 The Rock Boat XXV Schedule Updated!"
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let schedule_url = format!("{}/schedule/print/", server.url());
    let webhook_url = format!("{}/hook", server.url());
    let config = test_config(
        dir.path(),
        &[
            ("SCHEDULE_URL", schedule_url.as_str()),
            ("WEBHOOK_URL", webhook_url.as_str()),
        ],
    );

    let first = Orchestrator::from_config(config.clone()).run().await.unwrap();
    assert!(first.changed);
    assert_eq!(first.event_count, SCHEDULE_EVENT_COUNT);
    assert_eq!(first.notification, NotifyStatus::Sent);

    // Same page again: nothing to publish, no second notification
    let second = Orchestrator::from_config(config).run().await.unwrap();
    assert!(!second.changed);
    assert_eq!(second.notification, NotifyStatus::NotNeeded);

    page.assert_async().await;
    hook.assert_async().await;
}
