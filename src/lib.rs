//! HAM timeline: branching dialog for visual novels.
//!
//! A timeline is a directed graph of dialog, decision, branch and
//! consequence nodes. Authoring tools edit it through the graph API on
//! [`core::timeline::Timeline`], store it in a compact binary format, and a
//! [`core::instance::TimelineInstance`] plays it back, emitting presentation
//! events to a listener.

pub mod core;
pub mod schema;
