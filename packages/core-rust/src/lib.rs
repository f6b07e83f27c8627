//! `MeshLens` Core — identity records, metadata parsing, and destination
//! service resolution for the proxy telemetry pipeline.

pub mod error;
pub mod identity;
pub mod service_name;
pub mod value;

pub use error::{Error, Result};
pub use identity::{select_exchange_metadata, IdentityRecord};
pub use service_name::{resolve_destination_service, DestinationService};
pub use value::Value;
