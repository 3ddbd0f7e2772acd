pub mod config;
pub mod domain;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::order::{
    AddOutcome, CheckoutOutcome, LineItem, OrderId, OrderPolicy, OrderSession, PlacedOrder,
    RemoveOutcome, SessionId,
};
