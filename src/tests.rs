use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use crate::builder::{MessageBuilder, PayloadMessageBuilder};
use crate::config::Config;
use crate::error::{BuildError, Error};
use crate::message::{BaseMessage, MessagePayload, OutboundMessage, Recipient};
use crate::orchestrator::DeliveryOrchestrator;
use crate::status::{OperationStatus, StatusStore};
use crate::storage::{MemoryStorage, MessageStorage, MessageStorageError};
use crate::task::{SendPerRecipient, Task};
use crate::tracking::{TrackedBodyBuilder, TrackingBodyBuilder, TrackingOptions};
use crate::transport::{Transport, TransportError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const BODY: &str = "<p>Hello</p><a href=\"https://example.com/page\">details</a>";

fn payload(to: &[&str]) -> MessagePayload {
    MessagePayload {
        from: "sender@example.com".to_owned(),
        subject: "Quarterly update".to_owned(),
        body: BODY.to_owned(),
        to: to.iter().map(|e| Recipient::new(e)).collect(),
        references: vec!["<root@example.com>".to_owned(), "<parent@example.com>".to_owned()],
        in_reply_to: Some("<parent@example.com>".to_owned()),
    }
}

fn tracking_both() -> TrackingOptions {
    TrackingOptions {
        open_tracking: true,
        link_tracking: true,
    }
}

// A transport that fails for a fixed set of addresses and records every
// copy it accepted.
struct StubTransport {
    fail_for: Vec<String>,
    sent: Rc<RefCell<Vec<OutboundMessage>>>,
}

impl StubTransport {
    fn new(fail_for: &[&str], sent: Rc<RefCell<Vec<OutboundMessage>>>) -> StubTransport {
        StubTransport {
            fail_for: fail_for.iter().map(|s| (*s).to_owned()).collect(),
            sent,
        }
    }
}

impl Transport for StubTransport {
    fn send_to(
        &mut self,
        message: &OutboundMessage,
        recipient: &Recipient,
    ) -> Result<(), TransportError> {
        if self.fail_for.iter().any(|f| f == &recipient.email) {
            return Err(TransportError::new("550 mailbox unavailable"));
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingStatus {
    transitions: Vec<OperationStatus>,
}

impl StatusStore for RecordingStatus {
    fn update(&mut self, status: OperationStatus) {
        self.transitions.push(status);
    }
}

#[derive(Debug)]
struct SaveFailed;

impl fmt::Display for SaveFailed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "save failed")
    }
}

impl StdError for SaveFailed {}
impl MessageStorageError for SaveFailed {}

struct FailingStorage;

impl MessageStorage for FailingStorage {
    type Error = SaveFailed;

    fn save(&mut self, _message: &BaseMessage) -> Result<(), SaveFailed> {
        Err(SaveFailed)
    }

    fn retrieve(&self, _message_id: &str) -> Result<BaseMessage, SaveFailed> {
        Err(SaveFailed)
    }
}

type StubOrchestrator =
    DeliveryOrchestrator<PayloadMessageBuilder, TrackedBodyBuilder, StubTransport, MemoryStorage>;

fn orchestrator(
    fail_for: &[&str],
    sent: Rc<RefCell<Vec<OutboundMessage>>>,
) -> StubOrchestrator {
    let config = Config::default();
    DeliveryOrchestrator::new(
        PayloadMessageBuilder::new(&config),
        TrackedBodyBuilder::new(&config),
        StubTransport::new(fail_for, sent),
        MemoryStorage::new(),
    )
}

#[test]
fn partial_failure_reports_failed_recipients_and_commits() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&["b@x.com"], sent.clone());
    let mut status = RecordingStatus::default();

    let report = orch
        .execute(
            &payload(&["a@x.com", "b@x.com", "c@x.com"]),
            &tracking_both(),
            &mut status,
        )
        .unwrap();

    assert_eq!(report.failed_recipients, vec!["b@x.com".to_owned()]);
    assert_eq!(sent.borrow().len(), 2);

    let message = report.message.unwrap();
    assert!(message.is_sent);

    // The persisted record carries the plain body, not the tracked one
    let stored = orch.storage().retrieve(&message.message_id).unwrap();
    assert!(stored.is_sent);
    assert_eq!(stored.body, BODY);

    assert_eq!(
        status.transitions,
        vec![OperationStatus::InProgressNotRetryable]
    );
}

#[test]
fn all_recipients_failed_is_a_send_failure() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&["a@x.com", "b@x.com", "c@x.com"], sent.clone());
    let mut status = RecordingStatus::default();

    let result = orch.execute(
        &payload(&["a@x.com", "b@x.com", "c@x.com"]),
        &tracking_both(),
        &mut status,
    );

    match result {
        Err(Error::SendFailure) => {}
        other => panic!("expected SendFailure, got {:?}", other),
    }
    assert_eq!(Error::SendFailure.status_code(), 500);

    // Nothing delivered, nothing persisted
    assert!(sent.borrow().is_empty());
    assert!(orch.storage().is_empty());

    // The operation still became non-retryable before the first attempt
    assert_eq!(
        status.transitions,
        vec![OperationStatus::InProgressNotRetryable]
    );
}

#[test]
fn zero_recipients_is_a_noop_success() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&[], sent.clone());
    let mut status = RecordingStatus::default();

    let report = orch
        .execute(&payload(&[]), &tracking_both(), &mut status)
        .unwrap();

    assert!(report.failed_recipients.is_empty());
    assert!(sent.borrow().is_empty());

    // Nothing went out, so nothing is recorded as sent
    let message = report.message.unwrap();
    assert!(!message.is_sent);
    assert!(orch.storage().is_empty());
}

#[test]
fn post_send_save_failure_degrades_to_empty_success() {
    init_logging();

    let config = Config::default();
    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = DeliveryOrchestrator::new(
        PayloadMessageBuilder::new(&config),
        TrackedBodyBuilder::new(&config),
        StubTransport::new(&[], sent.clone()),
        FailingStorage,
    );
    let mut status = RecordingStatus::default();

    let report = orch
        .execute(&payload(&["a@x.com", "b@x.com"]), &tracking_both(), &mut status)
        .unwrap();

    // Both copies went out; the lost record must not look like a send
    // failure or the caller would re-deliver
    assert_eq!(sent.borrow().len(), 2);
    assert!(report.message.is_none());
    assert!(report.failed_recipients.is_empty());
}

#[test]
fn build_failure_propagates_and_never_commits() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&[], sent.clone());
    let mut status = RecordingStatus::default();

    let mut bad = payload(&["a@x.com"]);
    bad.from = "".to_owned();

    match orch.execute(&bad, &tracking_both(), &mut status) {
        Err(Error::Build(BuildError::MissingFrom)) => {}
        other => panic!("expected Build(MissingFrom), got {:?}", other),
    }

    // Nothing sent, and the operation never became non-retryable
    assert!(sent.borrow().is_empty());
    assert!(status.transitions.is_empty());
}

#[test]
fn failed_recipients_keep_attempt_order() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&["c@x.com", "a@x.com"], sent.clone());
    let mut status = OperationStatus::Pending;

    let report = orch
        .execute(
            &payload(&["a@x.com", "b@x.com", "c@x.com"]),
            &tracking_both(),
            &mut status,
        )
        .unwrap();

    assert_eq!(
        report.failed_recipients,
        vec!["a@x.com".to_owned(), "c@x.com".to_owned()]
    );
    assert!(!status.is_retryable());
}

#[test]
fn every_copy_carries_the_base_threading_headers() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&[], sent.clone());
    let mut status = OperationStatus::Pending;

    let p = payload(&["a@x.com", "b@x.com", "c@x.com"]);
    orch.execute(&p, &tracking_both(), &mut status).unwrap();

    let copies = sent.borrow();
    assert_eq!(copies.len(), 3);
    for copy in copies.iter() {
        assert_eq!(copy.references, p.references);
        assert_eq!(copy.in_reply_to, p.in_reply_to);
    }

    // Bodies differ per recipient even though the headers match
    assert_ne!(copies[0].body, copies[1].body);
    assert_ne!(copies[1].body, copies[2].body);
    assert_ne!(copies[0].body, copies[2].body);
}

#[test]
fn personalized_body_strips_back_to_plain_content() {
    let config = Config::default();
    let bodies = TrackedBodyBuilder::new(&config);

    let base = BaseMessage {
        message_id: "mid-1@localhost".to_owned(),
        from: "sender@example.com".to_owned(),
        subject: "s".to_owned(),
        body: BODY.to_owned(),
        to: vec![Recipient::new("a@x.com")],
        references: vec![],
        in_reply_to: None,
        is_sent: false,
    };

    let tracked = bodies.build_body(&Recipient::new("a@x.com"), &base, &tracking_both());

    // The tracked copy points at the tracking host and tags the recipient,
    // with the original target and the recipient hex-encoded in the query
    assert!(tracked.contains(&format!(
        "{}/open/{}?r={}",
        config.tracking_host,
        base.message_id,
        hex::encode("a@x.com")
    )));
    assert!(tracked.contains(&format!(
        "{}/link/{}?u={}&r={}",
        config.tracking_host,
        base.message_id,
        hex::encode("https://example.com/page"),
        hex::encode("a@x.com")
    )));
    assert!(!tracked.contains("href=\"https://example.com/page\""));

    // Stripping recovers exactly the plain content
    assert_eq!(bodies.strip_body(&tracked), BODY);

    // A body that never had markup passes through unchanged
    assert_eq!(bodies.strip_body(BODY), BODY);
}

#[test]
fn build_body_is_keyed_to_the_recipient() {
    let config = Config::default();
    let bodies = TrackedBodyBuilder::new(&config);

    let base = BaseMessage {
        message_id: "mid-2@localhost".to_owned(),
        from: "sender@example.com".to_owned(),
        subject: "s".to_owned(),
        body: BODY.to_owned(),
        to: vec![],
        references: vec![],
        in_reply_to: None,
        is_sent: false,
    };

    let a = bodies.build_body(&Recipient::new("a@x.com"), &base, &tracking_both());
    let b = bodies.build_body(&Recipient::new("b@x.com"), &base, &tracking_both());
    assert_ne!(a, b);

    // With tracking off the body passes through untouched
    let plain = bodies.build_body(&Recipient::new("a@x.com"), &base, &TrackingOptions::default());
    assert_eq!(plain, BODY);
}

#[test]
fn builder_validates_and_stamps_a_message_id() {
    let config = Config::default();
    let builder = PayloadMessageBuilder::new(&config);

    let message = builder.build_for_send(&payload(&["a@x.com"])).unwrap();
    assert!(!message.is_sent);
    assert!(message.message_id.ends_with(&format!("@{}", config.helo_name)));

    let mut bad = payload(&["not-an-address"]);
    match builder.build_for_send(&bad) {
        Err(BuildError::InvalidRecipient(addr)) => assert_eq!(addr, "not-an-address"),
        other => panic!("expected InvalidRecipient, got {:?}", other),
    }

    bad = payload(&["a@x.com"]);
    bad.from = "  ".to_owned();
    match builder.build_for_send(&bad) {
        Err(BuildError::MissingFrom) => {}
        other => panic!("expected MissingFrom, got {:?}", other),
    }
}

#[test]
fn header_fields_with_line_breaks_never_reach_the_wire() {
    init_logging();

    let config = Config::default();
    let builder = PayloadMessageBuilder::new(&config);

    let mut bad = payload(&["a@x.com"]);
    bad.subject = "Hello\r\nBcc: attacker@evil.com".to_owned();
    match builder.build_for_send(&bad) {
        Err(BuildError::InvalidHeaderValue(field)) => assert_eq!(field, "subject"),
        other => panic!("expected InvalidHeaderValue, got {:?}", other),
    }

    let mut bad = payload(&["a@x.com"]);
    bad.from = "sender@example.com\nBcc: attacker@evil.com".to_owned();
    match builder.build_for_send(&bad) {
        Err(BuildError::InvalidHeaderValue(field)) => assert_eq!(field, "from"),
        other => panic!("expected InvalidHeaderValue, got {:?}", other),
    }

    let mut bad = payload(&["a@x.com"]);
    bad.to[0].name = Some("Eve\r\nBcc: attacker@evil.com".to_owned());
    match builder.build_for_send(&bad) {
        Err(BuildError::InvalidHeaderValue(field)) => assert_eq!(field, "to"),
        other => panic!("expected InvalidHeaderValue, got {:?}", other),
    }

    let mut bad = payload(&["a@x.com"]);
    bad.in_reply_to = Some("<parent@example.com>\r\nBcc: attacker@evil.com".to_owned());
    match builder.build_for_send(&bad) {
        Err(BuildError::InvalidHeaderValue(field)) => assert_eq!(field, "in-reply-to"),
        other => panic!("expected InvalidHeaderValue, got {:?}", other),
    }

    // End to end: the smuggled header is rejected before anything is sent
    // or the operation becomes non-retryable
    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut orch = orchestrator(&[], sent.clone());
    let mut status = RecordingStatus::default();

    let mut bad = payload(&["a@x.com"]);
    bad.subject = "Hello\r\nBcc: attacker@evil.com".to_owned();
    match orch.execute(&bad, &tracking_both(), &mut status) {
        Err(Error::Build(BuildError::InvalidHeaderValue(_))) => {}
        other => panic!("expected Build(InvalidHeaderValue), got {:?}", other),
    }
    assert!(sent.borrow().is_empty());
    assert!(status.transitions.is_empty());
}

#[test]
fn outbound_wire_form_has_threading_headers() {
    let base = BaseMessage {
        message_id: "mid-3@localhost".to_owned(),
        from: "sender@example.com".to_owned(),
        subject: "Quarterly update".to_owned(),
        body: "<p>Hello</p>".to_owned(),
        to: vec![Recipient::new("a@x.com")],
        references: vec!["<root@example.com>".to_owned()],
        in_reply_to: Some("<parent@example.com>".to_owned()),
        is_sent: false,
    };

    let outbound =
        OutboundMessage::for_recipient(&base, &base.to[0], "<p>Hello</p>".to_owned());
    let wire = String::from_utf8(outbound.as_bytes()).unwrap();

    assert!(wire.contains("Message-ID: <mid-3@localhost>\r\n"));
    assert!(wire.contains("In-Reply-To: <parent@example.com>\r\n"));
    assert!(wire.contains("References: <root@example.com>\r\n"));
    assert!(wire.contains("To: a@x.com\r\n"));
    assert!(wire.ends_with("\r\n\r\n<p>Hello</p>"));
}

#[test]
fn config_loads_from_toml_with_defaults() {
    let config = Config::from_toml(
        r#"
        helo_name = "mail.example.com"

        [relay]
        domain_name = "smtp.example.com"
        port = 587
        "#,
    )
    .unwrap();

    assert_eq!(config.helo_name, "mail.example.com");
    assert_eq!(config.relay.domain_name, "smtp.example.com");
    assert_eq!(config.relay.port, 587);
    assert_eq!(config.smtp_timeout_secs, 60);
    assert!(config.is_valid());

    let mut invalid = Config::default();
    invalid.require_tls = true;
    invalid.relay.use_tls = false;
    assert!(!invalid.is_valid());

    match Config::from_toml("helo_name = 12") {
        Err(Error::Config(_)) => {}
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn send_per_recipient_runs_as_a_task() {
    init_logging();

    let sent = Rc::new(RefCell::new(Vec::new()));
    let orch = orchestrator(&["b@x.com"], sent.clone());

    let mut task = SendPerRecipient::new(
        orch,
        payload(&["a@x.com", "b@x.com"]),
        tracking_both(),
        OperationStatus::Pending,
    );

    assert!(task.description().contains("2 recipients"));

    let report = task.run().unwrap();
    assert_eq!(report.failed_recipients, vec!["b@x.com".to_owned()]);
    assert!(!task.status().is_retryable());
}
