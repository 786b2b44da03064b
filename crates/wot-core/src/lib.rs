//! The client-side Web of Things consumption engine.
//!
//! A process wires three long-lived, shared pieces together —
//! [`servient::Servient`] (which schemes are reachable and how),
//! [`wot_codecs::CodecRegistry`] (which media types decode to what) and
//! optionally a [`credentials::CredentialsProvider`] — then wraps each
//! Thing Description it wants to talk to in a
//! [`consumed_thing::ConsumedThing`]. Everything else (form selection,
//! client creation, subscription bookkeeping) happens behind that single
//! entry point.
//!
//! ```no_run
//! # async fn example() -> wot_core::error::Result<()> {
//! use std::sync::Arc;
//! use wot_core::{ConsumedThing, Servient};
//! use wot_codecs::CodecRegistry;
//!
//! let servient = Arc::new(Servient::new());
//! let codecs = Arc::new(CodecRegistry::with_defaults());
//! let td = wot_core::td::ThingDescription::parse(r#"{"properties":{}}"#)?;
//! let thing = ConsumedThing::new(td, servient, codecs);
//! let _ = thing.read_all_properties().await;
//! # Ok(())
//! # }
//! ```

pub mod consumed_thing;
pub mod content;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod interaction;
pub mod protocol_client;
pub mod servient;
pub mod subscription;
pub mod td;

pub use consumed_thing::ConsumedThing;
pub use content::Content;
pub use credentials::{Credentials, CredentialsLookup, CredentialsProvider, StaticCredentialsStore};
pub use error::{Result, WotError};
pub use interaction::{InteractionInput, InteractionOutput};
pub use protocol_client::{ProtocolClient, ProtocolClientFactory, ResourceType};
pub use servient::Servient;
pub use subscription::{Subscription, SubscriptionRegistry};
pub use td::ThingDescription;
