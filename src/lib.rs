// Infrastructure layer (shared components)
pub mod concurrent;
pub mod config;
pub mod error;
pub mod metrics;
pub mod transport;

// Domain layer (business logic)
pub mod changefeed;
pub mod chat;
pub mod events;
pub mod eventstore;
pub mod forwarding;
pub mod registry;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;
