//! Command line and file-based settings for the `friendgraph` binary.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
