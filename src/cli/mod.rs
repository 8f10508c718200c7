//! Command implementations behind the `sdeploy` binary.

pub mod commands;
