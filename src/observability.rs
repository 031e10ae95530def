use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("crcbot.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("crcbot.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("crcbot.client.request_duration_seconds");

pub(crate) static STORE_SUBMISSIONS: Counter = Counter::new("crcbot.store.submissions");
pub(crate) static STORE_REJECTED_EMPTY: Counter = Counter::new("crcbot.store.rejected_empty");
pub(crate) static STORE_REJECTED_BUSY: Counter = Counter::new("crcbot.store.rejected_busy");
pub(crate) static STORE_REPLIES: Counter = Counter::new("crcbot.store.replies");
pub(crate) static STORE_DOCUMENT_LINKS: Counter = Counter::new("crcbot.store.document_links");
pub(crate) static STORE_FAILURES: Counter = Counter::new("crcbot.store.failures");
pub(crate) static STORE_DETACHED: Counter = Counter::new("crcbot.store.detached");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STORE_SUBMISSIONS);
    collector.register_counter(&STORE_REJECTED_EMPTY);
    collector.register_counter(&STORE_REJECTED_BUSY);
    collector.register_counter(&STORE_REPLIES);
    collector.register_counter(&STORE_DOCUMENT_LINKS);
    collector.register_counter(&STORE_FAILURES);
    collector.register_counter(&STORE_DETACHED);
}
