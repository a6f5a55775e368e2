//! Channel construction for SASL listeners and clients.
//!
//! This module provides:
//! - [`RawSocket`] - the connected socket abstraction the builder consumes
//! - [`TransportSelector`] / [`TransportLayer`] - plaintext or TLS transport per connection
//! - [`KafkaChannel`] - the per-connection channel handed to the event loop
//! - [`SaslChannelBuilder`] - configure once, build per connection, close

pub mod builder;
pub mod channel;
pub mod socket;
pub mod transport;

pub use builder::SaslChannelBuilder;
pub use channel::KafkaChannel;
pub use socket::RawSocket;
pub use transport::{TransportLayer, TransportSelector};
