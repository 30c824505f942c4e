use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("supportintel.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("supportintel.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("supportintel.client.request_duration_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("supportintel.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("supportintel.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("supportintel.stream.bytes");
pub(crate) static STREAM_FIRST_DELTA: Moments =
    Moments::new("supportintel.stream.first_delta_seconds");
pub(crate) static STREAM_DURATION: Moments =
    Moments::new("supportintel.stream.duration_seconds");

pub(crate) static CHAT_COMPLETED: Counter = Counter::new("supportintel.chat.completed");
pub(crate) static CHAT_EMPTY_RESPONSES: Counter =
    Counter::new("supportintel.chat.empty_responses");
pub(crate) static CHAT_FAILURES: Counter = Counter::new("supportintel.chat.failures");
pub(crate) static CHAT_INTERRUPTS: Counter = Counter::new("supportintel.chat.interrupts");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_FIRST_DELTA);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CHAT_COMPLETED);
    collector.register_counter(&CHAT_EMPTY_RESPONSES);
    collector.register_counter(&CHAT_FAILURES);
    collector.register_counter(&CHAT_INTERRUPTS);
}
