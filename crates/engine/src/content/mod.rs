mod compiler;
mod database;
mod discovery;

pub use compiler::{compile_def_database, ContentCompileError, ContentErrorCode, SourceLocation};
pub use database::{CreatureTemplate, DefDatabase};
pub use discovery::{ContentDiscoveryError, ContentRequest};
