use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatfold.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("chatfold.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatfold.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("chatfold.stream.events");
pub(crate) static STREAM_MALFORMED: Counter = Counter::new("chatfold.stream.malformed");
pub(crate) static STREAM_DROPPED_EMPTY: Counter = Counter::new("chatfold.stream.dropped_empty");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatfold.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatfold.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("chatfold.stream.duration_seconds");

pub(crate) static SESSION_TURNS: Counter = Counter::new("chatfold.session.turns");
pub(crate) static SESSION_TURN_FAILURES: Counter = Counter::new("chatfold.session.turn_failures");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("chatfold.session.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_MALFORMED);
    collector.register_counter(&STREAM_DROPPED_EMPTY);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TURNS);
    collector.register_counter(&SESSION_TURN_FAILURES);
    collector.register_moments(&SESSION_TURN_DURATION);
}
