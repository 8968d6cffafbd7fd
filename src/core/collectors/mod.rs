/// Error types shared by all collectors and by startup registration.
pub mod error;

/// Node identity collector (`/_node`), registered as `info`.
pub mod node_info;

/// Node runtime statistics collector (`/_node/stats`), registered as `node`.
pub mod node_stats;

/// Collector registry and the object-safe collector interface.
pub mod registry;

pub mod traits;

/// Sample type, output stream aliases and result alias.
pub mod types;
