//! Conversational boundary for cartbot
//!
//! This crate sits between the external NLU collaborator and the order
//! state machine in `cartbot-core`:
//! - **Intents** (`intent`) - wire types for NLU query results and the
//!   typed product/quantity parameters extracted from them
//! - **Dispatch** (`dispatch`) - routes a recognized intent to the matching
//!   session operation and maps outcomes to fulfillment text
//! - **Registry** (`registry`) - per-conversation session store keyed by
//!   session id, with idle eviction
//! - **NLU client** (`nlu`) - detect-intent call for the text-query path
//!
//! # Architecture
//!
//! ```text
//! NLU result → IntentDispatcher → OrderSession (cartbot-core)
//!                   ↓                   ↓ checkout
//!            fulfillment text     OrderRepository (detached write)
//! ```

pub mod dispatch;
pub mod intent;
pub mod nlu;
pub mod registry;

pub use dispatch::IntentDispatcher;
pub use intent::{
    OrderIntent, OrderParameters, QueryResult, RawParameters, WebhookRequest, WebhookResponse,
};
pub use nlu::{HttpNluClient, NluClient, NluError, StaticNluClient};
pub use registry::SessionRegistry;
