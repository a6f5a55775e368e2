//! Test utilities for channel construction.
//!
//! - [`MockSocket`] - An in-memory [`RawSocket`](crate::network::RawSocket) with a shared handle
//! - [`CountingLogin`] - A [`Login`](crate::auth::login_manager::Login) that counts logins and logouts
//! - [`RecordingSessionFactory`] - A session factory that records the peers it was asked for
//! - [`fixtures`] - PEM certificate and key for TLS tests
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_channel_core::testing::{CountingLogin, MockSocket};
//!
//! let socket = MockSocket::new("10.0.0.5:50000".parse().unwrap());
//! let handle = socket.clone();
//!
//! let result = builder.build_channel("conn-1", socket, 1024);
//! assert!(result.is_err());
//! assert!(handle.is_closed());
//! ```

pub mod fixtures;
pub mod mock_login;
pub mod mock_session;
pub mod mock_socket;

pub use mock_login::CountingLogin;
pub use mock_session::RecordingSessionFactory;
pub use mock_socket::MockSocket;
