//! WebSocket gateway: one authenticated session per connection, each owning
//! its own set of wellness components.

pub mod auth;
pub mod connection;
pub mod session;
