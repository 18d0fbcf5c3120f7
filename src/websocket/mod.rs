mod handler;
mod transport;

pub use handler::ws_handler;
