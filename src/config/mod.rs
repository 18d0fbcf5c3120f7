mod settings;

pub use settings::{
    EventStoreConfig, ForwardingConfig, RedisConfig, ServerConfig, Settings, WebSocketConfig,
};
