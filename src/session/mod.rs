//! Socket session management.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Session`] and its connection state |
//! | `dispatch` | Inbound event handling |
//! | `queue` | Outbound queueing policy |

// ============================================================================
// Submodules
// ============================================================================

/// Session handle and outbound path.
pub mod core;

/// Transport event dispatch.
mod dispatch;

/// Outbound queueing policy.
pub mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{ConnectionState, Session};
pub use queue::{OutboundQueue, Route};

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::bus::{SubscribeOptions, TopicBus};
    use crate::error::{Error, Result};
    use crate::identifiers::Identifier;
    use crate::protocol::Command;
    use crate::runtime::EventLoop;
    use crate::transport::{Connector, Headers, Transport, TransportEvent, TransportSink};

    // ------------------------------------------------------------------------
    // Recording transport
    // ------------------------------------------------------------------------

    #[derive(Default)]
    struct Wire {
        sent: Mutex<Vec<Value>>,
        sinks: Mutex<Vec<TransportSink>>,
        /// Writes left to fail before sends succeed again.
        failures: Mutex<usize>,
    }

    impl Wire {
        fn sink(&self) -> TransportSink {
            self.sinks.lock().last().cloned().expect("connected")
        }

        fn commands(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .map(|frame| frame["command"].as_str().unwrap_or_default().to_string())
                .collect()
        }

        fn channels(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter_map(|frame| frame["identifier"].as_str())
                .filter_map(|id| serde_json::from_str::<Value>(id).ok())
                .map(|id| id["channel"].as_str().unwrap_or_default().to_string())
                .collect()
        }
    }

    struct Recorder(Arc<Wire>);

    impl Transport for Recorder {
        fn send(&self, frame: String) -> Result<()> {
            {
                let mut failures = self.0.failures.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(Error::ConnectionClosed);
                }
            }
            let value = serde_json::from_str(&frame).expect("json frame");
            self.0.sent.lock().push(value);
            Ok(())
        }

        fn close(&self) {}
    }

    struct RecordingConnector(Arc<Wire>);

    impl Connector for RecordingConnector {
        fn open(&self, _: &str, _: &Headers, sink: TransportSink) -> Result<Box<dyn Transport>> {
            self.0.sinks.lock().push(sink);
            Ok(Box::new(Recorder(Arc::clone(&self.0))))
        }
    }

    fn setup() -> (EventLoop, Session, Arc<Wire>) {
        let event_loop = EventLoop::new();
        let bus = TopicBus::new(&event_loop.scheduler());
        let wire = Arc::new(Wire::default());
        let session = Session::new(
            bus,
            Arc::new(RecordingConnector(Arc::clone(&wire))),
            Some("ws://test/cable".into()),
            Headers::default(),
        );
        (event_loop, session, wire)
    }

    fn confirm(channel: &str) -> TransportEvent {
        TransportEvent::Message(
            json!({
                "identifier": json!({"channel": channel}).to_string(),
                "type": "confirm_subscription"
            })
            .to_string(),
        )
    }

    // ------------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_connect_without_url() {
        let event_loop = EventLoop::new();
        let wire = Arc::new(Wire::default());
        let session = Session::new(
            TopicBus::new(&event_loop.scheduler()),
            Arc::new(RecordingConnector(wire)),
            None,
            Headers::default(),
        );

        assert!(session.connect().unwrap_err().is_invalid_argument());
        assert_eq!(session.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        session.connect().unwrap();
        assert_eq!(wire.sinks.lock().len(), 1);
        assert_eq!(session.state(), ConnectionState::Connecting);

        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();
        session.connect().unwrap();
        assert_eq!(wire.sinks.lock().len(), 1);
        assert_eq!(session.state(), ConnectionState::Open);
    }

    #[test]
    fn test_message_queued_until_confirmed() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();

        session.subscribe_channel("rooms", Value::Null).unwrap();
        session
            .send(Command::Message, &Identifier::channel("rooms"), json!({"action": "ping"}))
            .unwrap();
        assert_eq!(session.reserved(), 1);
        assert_eq!(session.queued("rooms"), 1);

        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();
        assert_eq!(wire.commands(), vec!["subscribe"]);

        wire.sink().emit(confirm("rooms"));
        event_loop.run_until_idle();
        assert_eq!(wire.commands(), vec!["subscribe", "message"]);
        assert_eq!(wire.sent.lock()[1]["data"], "{\"action\":\"ping\"}");
        assert!(session.is_subscribed("rooms"));
        assert_eq!(session.queued("rooms"), 0);
    }

    #[test]
    fn test_message_missing_channel_rejected() {
        let (_loop, session, _wire) = setup();
        let identifier = Identifier::default().with("room", json!(1));
        let err = session
            .send(Command::Message, &identifier, Value::Null)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_open_publishes_topic() {
        let (mut event_loop, session, wire) = setup();
        let opened = Arc::new(Mutex::new(0));

        let o = Arc::clone(&opened);
        session
            .bus()
            .subscribe("socket.open", move |_, _| *o.lock() += 1, SubscribeOptions::new())
            .unwrap();

        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();
        assert_eq!(*opened.lock(), 1);
    }

    #[test]
    fn test_inbound_action_published() {
        let (mut event_loop, session, wire) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        session
            .bus()
            .subscribe(
                "socket.message.rooms.said",
                move |topic, data| s.lock().push((topic.to_string(), data.clone())),
                SubscribeOptions::new(),
            )
            .unwrap();

        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Message(
            json!({
                "identifier": "{\"channel\":\"rooms\"}",
                "message": {"action": "said", "data": {"text": "hi"}}
            })
            .to_string(),
        ));
        wire.sink().emit(TransportEvent::Message("not json".into()));
        event_loop.run_until_idle();

        assert_eq!(
            *seen.lock(),
            vec![("socket.message.rooms.said".to_string(), json!({"text": "hi"}))]
        );
    }

    #[test]
    fn test_error_published_with_message() {
        let (mut event_loop, session, wire) = setup();
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::clone(&seen);
        session
            .bus()
            .subscribe("socket.error", move |_, data| *s.lock() = Some(data.clone()), SubscribeOptions::new())
            .unwrap();

        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Error("reset".into()));
        event_loop.run_until_idle();
        assert_eq!(*seen.lock(), Some(json!({"message": "reset"})));
    }

    #[test]
    fn test_remote_close_keeps_queues() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        session.subscribe_channel("rooms", Value::Null).unwrap();
        event_loop.run_until_idle();
        wire.sink().emit(confirm("rooms"));
        event_loop.run_until_idle();
        assert!(session.is_subscribed("rooms"));

        wire.sink().emit(TransportEvent::Close);
        event_loop.run_until_idle();
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(!session.is_subscribed("rooms"));

        session
            .send(Command::Message, &Identifier::channel("rooms"), Value::Null)
            .unwrap();
        session
            .send(Command::Subscribe, &Identifier::channel("chat"), Value::Null)
            .unwrap();
        assert_eq!(session.queued("rooms"), 1);
        assert_eq!(session.reserved(), 1);
    }

    #[test]
    fn test_close_discards_queues_and_stale_events() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        session.subscribe_channel("rooms", Value::Null).unwrap();
        session
            .send(Command::Message, &Identifier::channel("rooms"), Value::Null)
            .unwrap();
        let stale = wire.sink();

        session.close();
        assert_eq!(session.state(), ConnectionState::Closed);
        assert_eq!(session.reserved(), 0);
        assert_eq!(session.queued("rooms"), 0);

        stale.emit(TransportEvent::Open);
        event_loop.run_until_idle();
        assert_eq!(session.state(), ConnectionState::Closed);

        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();
        assert_eq!(session.state(), ConnectionState::Open);
        assert!(wire.sent.lock().is_empty());
    }

    #[test]
    fn test_double_confirm_sends_once() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        session.subscribe_channel("rooms", Value::Null).unwrap();
        session
            .send(Command::Message, &Identifier::channel("rooms"), Value::Null)
            .unwrap();

        wire.sink().emit(confirm("rooms"));
        wire.sink().emit(confirm("rooms"));
        event_loop.run_until_idle();
        assert_eq!(wire.commands(), vec!["subscribe", "message"]);
    }

    #[test]
    fn test_unsubscribe_keeps_channel_subscribed() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        session.subscribe_channel("rooms", Value::Null).unwrap();
        event_loop.run_until_idle();
        wire.sink().emit(confirm("rooms"));
        event_loop.run_until_idle();

        session.unsubscribe_channel("rooms", Value::Null).unwrap();
        assert!(session.is_subscribed("rooms"));

        session
            .send(Command::Message, &Identifier::channel("rooms"), Value::Null)
            .unwrap();
        assert_eq!(wire.commands(), vec!["subscribe", "unsubscribe", "message"]);
    }

    #[test]
    fn test_failed_send_kept_for_next_open() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        *wire.failures.lock() = 1;
        session
            .send(Command::Subscribe, &Identifier::channel("rooms"), Value::Null)
            .unwrap();
        assert_eq!(session.reserved(), 1);

        wire.sink().emit(TransportEvent::Close);
        event_loop.run_until_idle();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        assert_eq!(wire.commands(), vec!["subscribe"]);
        assert_eq!(session.reserved(), 0);
    }

    #[test]
    fn test_failed_send_retried_before_next_frame() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        *wire.failures.lock() = 1;
        session
            .send(Command::Subscribe, &Identifier::channel("a"), Value::Null)
            .unwrap();
        assert_eq!(session.reserved(), 1);

        session
            .send(Command::Subscribe, &Identifier::channel("b"), Value::Null)
            .unwrap();

        assert_eq!(wire.channels(), vec!["a", "b"]);
        assert_eq!(session.reserved(), 0);
    }

    #[test]
    fn test_confirm_retries_reserved_first() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        session.subscribe_channel("rooms", Value::Null).unwrap();
        session
            .send(Command::Message, &Identifier::channel("rooms"), json!({"n": 2}))
            .unwrap();

        *wire.failures.lock() = 1;
        session
            .send(Command::Subscribe, &Identifier::channel("chat"), Value::Null)
            .unwrap();

        wire.sink().emit(confirm("rooms"));
        event_loop.run_until_idle();

        assert_eq!(wire.commands(), vec!["subscribe", "subscribe", "message"]);
        assert_eq!(wire.channels(), vec!["rooms", "chat", "rooms"]);
    }

    #[test]
    fn test_undelivered_frames_resent_after_reconnect() {
        let (mut event_loop, session, wire) = setup();
        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        let lost = json!({
            "command": "subscribe",
            "identifier": "{\"channel\":\"rooms\"}"
        })
        .to_string();
        wire.sink().emit(TransportEvent::Undelivered(vec![lost]));
        wire.sink().emit(TransportEvent::Close);
        event_loop.run_until_idle();
        assert_eq!(session.reserved(), 1);

        session.connect().unwrap();
        wire.sink().emit(TransportEvent::Open);
        event_loop.run_until_idle();

        assert_eq!(wire.channels(), vec!["rooms"]);
        assert_eq!(session.reserved(), 0);
    }
}
