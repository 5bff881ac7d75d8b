//! Edge adapters for file formats consumed and produced by the CLI.

pub mod csv;
