//! Command implementations for the modelgate CLI.

pub mod check;
pub mod list;
pub mod render;
pub mod run;
pub mod show;
