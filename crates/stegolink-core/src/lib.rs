//! StegoLink Core - client workflow for a hide-and-extract secure transfer service
//!
//! A Sender encrypts a message and conceals it in a cover file; a Receiver
//! generates the key pair and later recovers the message. Cryptography and
//! embedding run on the remote service; this crate validates inputs,
//! assembles requests, picks output containers, saves produced files and
//! tracks each role's status.

pub mod codec;
pub mod config;
pub mod container;
pub mod error;
pub mod keys;
pub mod request;
pub mod service;
pub mod status;
pub mod workflow;

// Re-export commonly used types
pub use config::ClientConfig;
pub use container::ContainerFormat;
pub use error::TransferError;
pub use keys::KeyMaterial;
pub use request::{SelectedFile, TransferRequest};
pub use service::{HttpStegoService, StegoService};
pub use status::{Status, StatusKind, StatusReporter};
pub use workflow::{Phase, ReceiverWorkflow, SenderWorkflow};
