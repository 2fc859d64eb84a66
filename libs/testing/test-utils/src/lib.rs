//! Shared test utilities
//!
//! - `TestNats`: NATS container with JetStream and automatic cleanup
//! - `TestDataBuilder`: Deterministic stream/consumer names and message ids
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestNats};
//!
//! #[tokio::test]
//! async fn my_jetstream_test() {
//!     let nats = TestNats::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_jetstream_test");
//!
//!     let stream = builder.name("stream", "main");
//!     nats.create_stream(&stream, &builder.subject("events")).await;
//! }
//! ```

mod nats;

pub use nats::TestNats;

/// Builder for test data with deterministic names
///
/// Names are derived from a seed so each test gets its own streams and
/// consumers while staying reproducible.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_redelivery");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique stream or consumer name
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(12345);
    /// assert_eq!(builder.name("stream", "main"), "test-stream-12345-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Generate a subject under this builder's namespace
    pub fn subject(&self, token: &str) -> String {
        format!("test.{}.{}", self.seed, token)
    }

    /// Generate the deduplication id for the n-th published message
    pub fn message_id(&self, n: u64) -> String {
        format!("msg-{}-{}", self.seed, n)
    }
}
