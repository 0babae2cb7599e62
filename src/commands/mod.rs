//! CLI commands implementation

pub mod analyze;
pub mod execute;
pub mod ingest;
pub mod init;
pub mod manifest;
pub mod query;
pub mod status;

pub use analyze::*;
pub use execute::*;
pub use ingest::*;
pub use init::*;
pub use manifest::*;
pub use query::*;
pub use status::*;
