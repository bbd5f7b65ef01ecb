//! Core models: structure hierarchy, execution traces and behavior views.

pub mod behavior;
pub mod component;
pub mod exploration;
pub mod palette;
pub mod structure;
pub mod trace;
