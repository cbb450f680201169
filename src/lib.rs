pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod pipeline;
pub mod puzzle;
pub mod scoring;
pub mod search;

pub use config::Config;
pub use error::{LinkError, Result};
pub use graph::RelationshipGraph;
pub use ingest::{EntityDirectory, EntityId};
pub use search::{PathEngine, PathSet};
