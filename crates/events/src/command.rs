use folio_core::StreamId;

/// A command targets a specific event stream.
///
/// Commands represent **intent** and are transient; the decider turns accepted
/// commands into events, which are the only thing persisted.
///
/// Each command operates on exactly one stream. That stream is the unit of
/// optimistic concurrency: two commands against different streams never
/// contend, two commands against the same stream are serialized by the
/// store's expected-version check.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_stream(&self) -> StreamId;
}
