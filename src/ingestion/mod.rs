//! # Ingestion Module
//!
//! The ingestion module registers genomic data files with a running visualization
//! server instance. It takes a host file (or an alignment URL), works out its format
//! and data category, reuses an existing record for identical content, and otherwise
//! places the file where the server can read it and registers it exactly once.
//!
//! ## Components
//!
//! * `core` - Main ingestion orchestrator
//! * `file_types` - File format and data category tags, and their inference
//! * `identity` - Detection of files already registered with an instance
//! * `hashing` - Content digests used to compare files
//! * `aggregation` - Aggregation of raw interval files into tile databases
//! * `placement` - Linking files into the instance's mounts
//! * `registration` - The in-instance registration command and identifier minting
//!
//! ## Architecture
//!
//! The ingestion process follows these steps:
//! 1. Validate that the input can be found
//! 2. Fill in the file format and data category from the file name
//! 3. Check every precondition before touching the instance
//! 4. Start the instance if it is not running
//! 5. Return an existing record's identifier when the same content is registered
//! 6. Aggregate raw interval files
//! 7. Place the file in the temp mount, the static directory, or leave it in place
//! 8. Register it under a caller-supplied or freshly minted identifier

pub mod aggregation;
pub mod core;
pub mod file_types;
pub mod hashing;
pub mod identity;
pub mod placement;
pub mod registration;

// Public re-exports
pub use aggregation::{AggregationRequest, Aggregator, ClodiusAggregator};
pub use core::{IngestionCore, IngestionRequest, IngestionResponse};
pub use file_types::{fill_filetype_and_datatype, DataType, FileType, TypeResolution};
pub use identity::tileset_uuid_by_filename;
pub use registration::{mint_uid, RegistrationRequest, StorageLocation};

#[cfg(test)]
mod tests;
