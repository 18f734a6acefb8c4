//! Change feed client for the fleet trips document store
//!
//! Subscribes to insert/update/delete notifications on a collection over
//! a websocket and hands each change to registered callbacks.

mod channel;
mod client;
mod error;
mod filters;
mod message;

pub use channel::{ChannelBuilder, CollectionChanges, Subscription};
pub use client::{ChangeFeedClient, ChangeFeedOptions, ConnectionState};
pub use error::ChangeFeedError;
pub use filters::{ChangeFilter, FilterOperator};
pub use message::{ChangeEvent, ChangePayload, RealtimeMessage};
