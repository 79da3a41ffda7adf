use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::models::{
    generate_booking_id, Direction, EntryDenial, ExitDenial, NewBooking, ParkingSession,
    PlateFormat, PlateNumber, RecognitionOutcome,
};
use crate::repository::{InMemorySessionStore, SessionStore};

const PLATE: &str = "MH12AB1234";

struct Harness {
    workflow: EntryExitWorkflow,
    recognizer: Arc<ScriptedRecognizer>,
    store: Arc<InMemorySessionStore>,
    devices: MockServer,
}

impl Harness {
    /// Every peripheral answers 200 unless a test mounts something else first.
    async fn new() -> Self {
        let devices = MockServer::start().await;
        Self::with_devices(devices).await
    }

    async fn with_devices(devices: MockServer) -> Self {
        Mock::given(method("GET"))
            .and(path("/gate"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&devices)
            .await;
        Mock::given(method("GET"))
            .and(path("/capture"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&devices)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&devices)
            .await;

        let timeout = Duration::from_secs(2);
        let recognizer = Arc::new(ScriptedRecognizer::default());
        let store = Arc::new(InMemorySessionStore::new());
        let workflow = EntryExitWorkflow::new(
            recognizer.clone(),
            store.clone(),
            Devices {
                gate: GateDispatcher::new(devices.uri(), timeout, RetryPolicy::immediate(3))
                    .unwrap(),
                camera: CameraClient::new(devices.uri(), timeout).unwrap(),
                display: DisplayClient::new(devices.uri(), timeout).unwrap(),
            },
            RetryTracker::new(Duration::from_secs(120)),
            WorkflowSettings::default(),
        );

        Self {
            workflow,
            recognizer,
            store,
            devices,
        }
    }

    async fn submit(&self, direction: Direction) -> RecognitionOutcome {
        self.workflow
            .process(submission(direction))
            .await
            .expect("workflow should not fail")
    }

    async fn requests_to(&self, endpoint: &str) -> Vec<wiremock::Request> {
        self.devices
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == endpoint)
            .collect()
    }
}

fn key(direction: Direction) -> RetryKey {
    RetryKey::new("cam-1", direction)
}

fn submission(direction: Direction) -> PlateSubmission {
    PlateSubmission {
        image: b"\xff\xd8frame".to_vec(),
        mime_type: "image/jpeg".to_string(),
        direction,
        retry_key: key(direction),
    }
}

fn plate() -> PlateNumber {
    PlateNumber::parse(PLATE, PlateFormat::Strict).unwrap()
}

fn parked_since(minutes_ago: i64, seconds_ago: i64) -> ParkingSession {
    ParkingSession {
        id: 0,
        plate: PLATE.to_string(),
        booking_id: "BK20240101090000".to_string(),
        name: None,
        phone: None,
        booking_time: None,
        entry_time: Some(
            Utc::now() - chrono::Duration::minutes(minutes_ago) - chrono::Duration::seconds(seconds_ago),
        ),
        exit_time: None,
        slot: Some(2),
        bill_amount: None,
    }
}

#[tokio::test]
async fn four_unclear_frames_then_a_plate_is_admitted() {
    let h = Harness::new().await;
    for _ in 0..4 {
        h.recognizer.push(PlateResult::Unclear);
    }
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    let mut flashes = Vec::new();
    for expected in 1..=4 {
        match h.submit(Direction::Entry).await {
            RecognitionOutcome::Retry { attempt, flash } => {
                assert_eq!(attempt, expected);
                flashes.push(flash);
            }
            other => panic!("attempt {} should retry, got {:?}", expected, other),
        }
    }
    assert_eq!(flashes, vec![false, false, false, true]);

    let outcome = h.submit(Direction::Entry).await;
    assert!(matches!(outcome, RecognitionOutcome::EntryAllowed { gate_actuated: true, .. }));
    assert_eq!(h.workflow.retry_tracker().count(&key(Direction::Entry)), 0);

    let captures = h.requests_to("/capture").await;
    assert_eq!(captures.len(), 4);
    assert_eq!(captures[3].url.query(), Some("flash=1"));
}

#[tokio::test]
async fn fifth_unclear_frame_gives_up_and_resets() {
    let h = Harness::new().await;
    for _ in 0..5 {
        h.recognizer.push(PlateResult::Unclear);
    }

    for _ in 0..4 {
        assert!(matches!(
            h.submit(Direction::Entry).await,
            RecognitionOutcome::Retry { .. }
        ));
    }
    assert_eq!(h.submit(Direction::Entry).await, RecognitionOutcome::MaxRetriesReached);
    assert_eq!(h.workflow.retry_tracker().count(&key(Direction::Entry)), 0);

    assert_eq!(h.requests_to("/capture").await.len(), 4);
    assert!(h.requests_to("/gate").await.is_empty());
    assert!(h.store.all().is_empty());
}

#[tokio::test]
async fn second_entry_for_parked_plate_is_denied() {
    let h = Harness::new().await;
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    assert!(matches!(
        h.submit(Direction::Entry).await,
        RecognitionOutcome::EntryAllowed { .. }
    ));
    assert_eq!(
        h.submit(Direction::Entry).await,
        RecognitionOutcome::EntryDenied {
            plate: PLATE.to_string(),
            reason: EntryDenial::AlreadyParked,
        }
    );

    assert_eq!(h.store.all().len(), 1);
    assert_eq!(h.requests_to("/gate").await.len(), 1);
}

#[tokio::test]
async fn exit_for_unknown_plate_is_denied_without_mutation() {
    let devices = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&devices)
        .await;
    let h = Harness::with_devices(devices).await;
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    assert_eq!(
        h.submit(Direction::Exit).await,
        RecognitionOutcome::ExitDenied {
            plate: PLATE.to_string(),
            reason: ExitDenial::NotFound,
        }
    );
    assert!(h.store.all().is_empty());
    assert!(h.requests_to("/display_bill").await.is_empty());
}

#[tokio::test]
async fn entry_reuses_the_booking_id() {
    let h = Harness::new().await;
    // Booked an hour ago, so a freshly minted id would differ
    let booked_at = Utc::now() - chrono::Duration::hours(1);
    let booking = NewBooking::new(plate(), "Ravi".into(), "9820000000".into(), booked_at);
    let booked = h.store.create_booking(&booking).await.unwrap();
    h.recognizer.push(PlateResult::Plate("mh 12 ab 1234".to_string()));

    match h.submit(Direction::Entry).await {
        RecognitionOutcome::EntryAllowed { plate, booking_id, .. } => {
            assert_eq!(plate, PLATE);
            assert_eq!(booking_id, booked.booking_id);
            assert_ne!(booking_id, generate_booking_id(Utc::now()));
        }
        other => panic!("expected entry, got {:?}", other),
    }

    let sessions = h.store.all();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].entry_time.is_some());
}

#[tokio::test]
async fn exit_bills_closes_and_notifies_display() {
    let devices = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/display_bill"))
        .and(body_json(json!({ "plate": PLATE, "amount": 30 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&devices)
        .await;
    let h = Harness::with_devices(devices).await;
    h.store.insert_raw(parked_since(3, 24));
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    assert_eq!(
        h.submit(Direction::Exit).await,
        RecognitionOutcome::ExitApproved {
            plate: PLATE.to_string(),
            bill_amount: 30,
            gate_actuated: true,
        }
    );

    let closed = &h.store.all()[0];
    assert!(closed.exit_time.is_some());
    assert_eq!(closed.bill_amount, Some(30));
    assert_eq!(h.requests_to("/gate").await[0].url.query(), Some("action=open"));
}

#[tokio::test]
async fn exit_for_booking_that_never_entered_is_denied() {
    let h = Harness::new().await;
    let booking = NewBooking::new(plate(), "Ravi".into(), "9820000000".into(), Utc::now());
    h.store.create_booking(&booking).await.unwrap();
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    assert!(matches!(
        h.submit(Direction::Exit).await,
        RecognitionOutcome::ExitDenied { reason: ExitDenial::NotEntered, .. }
    ));
    assert!(h.store.all()[0].exit_time.is_none());
}

#[tokio::test]
async fn failed_gate_still_admits_the_car() {
    let devices = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&devices)
        .await;
    let h = Harness::with_devices(devices).await;
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    assert!(matches!(
        h.submit(Direction::Entry).await,
        RecognitionOutcome::EntryAllowed { gate_actuated: false, .. }
    ));
    assert_eq!(h.store.all().len(), 1);
    assert_eq!(h.requests_to("/set_plate").await.len(), 1);
}

#[tokio::test]
async fn display_outage_does_not_block_entry() {
    let devices = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/set_plate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&devices)
        .await;
    let h = Harness::with_devices(devices).await;
    h.recognizer.push(PlateResult::Plate(PLATE.to_string()));

    assert!(matches!(
        h.submit(Direction::Entry).await,
        RecognitionOutcome::EntryAllowed { gate_actuated: true, .. }
    ));
}

#[tokio::test]
async fn malformed_plate_text_keeps_gate_closed() {
    let h = Harness::new().await;
    h.recognizer.push(PlateResult::Plate("Sorry, I cannot read that".to_string()));

    assert_eq!(
        h.submit(Direction::Entry).await,
        RecognitionOutcome::InvalidPlate {
            raw: "Sorry, I cannot read that".to_string()
        }
    );
    assert!(h.store.all().is_empty());
    assert!(h.requests_to("/gate").await.is_empty());
}

#[tokio::test]
async fn no_plate_ends_the_retry_sequence() {
    let h = Harness::new().await;
    h.recognizer.push(PlateResult::Unclear);
    h.recognizer.push(PlateResult::Unclear);
    h.recognizer.push(PlateResult::NoPlate);

    h.submit(Direction::Entry).await;
    h.submit(Direction::Entry).await;
    assert_eq!(h.workflow.retry_tracker().count(&key(Direction::Entry)), 2);

    assert_eq!(h.submit(Direction::Entry).await, RecognitionOutcome::NoPlate);
    assert_eq!(h.workflow.retry_tracker().count(&key(Direction::Entry)), 0);
}

#[tokio::test]
async fn recognition_failure_surfaces_and_keeps_the_counter() {
    let h = Harness::new().await;
    h.recognizer.push(PlateResult::Unclear);
    h.recognizer.push_failure("inference offline");

    h.submit(Direction::Entry).await;
    let err = h
        .workflow
        .process(submission(Direction::Entry))
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Recognition(_)));
    assert_eq!(h.workflow.retry_tracker().count(&key(Direction::Entry)), 1);
    assert_eq!(h.recognizer.remaining(), 0);
}
