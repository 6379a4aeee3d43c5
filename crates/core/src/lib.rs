// Helloapi Instance Core
//
// A single fleet instance serves delayed HTTP responses, burns CPU to produce a
// work-rate metric and reports its status to an external message channel.
//
// Key design decisions:
// - InstanceState is owned by the Coordinator task and never shared
// - Request handlers, the load generator, ticks and OS signals all feed one inbox
// - Publishing goes through the MessageSink trait (Pub/Sub REST or in-memory)
// - Any publish failure is fatal; there is no retry or buffering

pub mod config;
pub mod coordinator;
pub mod error;
pub mod load;
pub mod naming;
pub mod publisher;
pub mod pubsub;
pub mod state;

// In-memory sink for tests and local runs
pub mod memory;

// Re-exports for convenience
pub use config::{HandlerConfig, InstanceConfig, PubSubConfig};
pub use coordinator::{Coordinator, CoordinatorHandle, Event, Shutdown};
pub use error::{ConfigError, CoordinatorError, PublishError};
pub use load::{work_rate, LoadGenerator};
pub use memory::InMemorySink;
pub use naming::random_name;
pub use publisher::{MessageSink, StatusPublisher};
pub use pubsub::{DefaultCredentials, PubSubSink, StaticToken, TokenSource};
pub use state::{InstanceState, InstanceStatus, StatusMessage};
