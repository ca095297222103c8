//! Domain types for the Gantry pipeline engine

pub mod event;
pub mod pipeline;
pub mod run;
