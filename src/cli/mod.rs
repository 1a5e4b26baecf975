//! Command line interface for the demo binary

pub mod commands;
