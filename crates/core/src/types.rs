/// Correlation identifiers are 32-bit and wrap on overflow; only
/// identifiers of requests still awaiting a response must be unique.
pub type CorrelationId = u32;

/// Counter samples and everything derived from them are unsigned 64-bit.
pub type SampleValue = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
