//! intentrank: intent-adaptive hybrid retrieval over a knowledge graph, plus the
//! embedding projection pipeline that feeds its vector signal.

pub mod benchmark;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod errors;
pub mod intent;
pub mod logging;
pub mod projection;
pub mod search;

pub use errors::{EngineError, ErrorKind};
