//! # Protocol Layer
//!
//! Extension point of the engines: the [`Plugin`](registry::Plugin) capability
//! trait and the [`PluginRegistry`](registry::PluginRegistry) that fans send and
//! receive events out to every registered plugin.

pub mod registry;
