pub mod analyzer;
pub mod config;
pub mod ir_processor;
pub mod parser;
pub mod report;
pub mod span;

pub use analyzer::Analyzer;
pub use config::{Config, FlatConfig, ReachabilityMode, TraversalMode};
pub use flowcheck_analyzer_error as error;
pub use flowcheck_analyzer_ir as ir;
