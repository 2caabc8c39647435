//! Infrastructure layer: event stores, dispatch, projections, config.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod stay_registry;
pub mod workers;

#[cfg(test)]
mod integration_tests;
