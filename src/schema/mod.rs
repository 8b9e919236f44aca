//! Timeline data types: ids, variable values, nodes, cast and events.

pub mod cast;
pub mod event;
pub mod ids;
pub mod node;
pub mod value;
