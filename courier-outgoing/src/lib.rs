//! # courier-outgoing
//!
//! Correlates sends this process dispatched with the rows they eventually
//! produce in the chat database.
//!
//! Call [`OutgoingRegistry::register`] when a send is dispatched, then feed
//! the registry self-message and send-error rows, usually by adding it as a
//! sink on the listener. Each registration resolves to the matching row, or
//! is rejected on a send error, an explicit [`OutgoingRegistry::reject`], or
//! its timeout.

pub mod error;
pub mod promise;
pub mod registry;
pub mod send_cache;

pub use error::PromiseRejection;
pub use promise::{MessagePromise, SendRequest};
pub use registry::{OutgoingRegistry, PromiseHandle, RegistryBuilder};
pub use send_cache::{PendingSends, SendCache};
