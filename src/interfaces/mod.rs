//! Input and output formats for the batch CLI.

pub mod csv;
