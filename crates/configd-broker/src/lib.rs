//! In-process publish/subscribe event broker for fanning out config updates
//! to SSE subscribers keyed by (org, app, env) topic.

pub mod broker;

pub use broker::{EventBroker, SubscriberHandle, DEFAULT_QUEUE_CAPACITY};
