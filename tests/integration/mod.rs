//! Integration tests for the ACP coordinator

mod bridge_protocol;
mod concurrency;
mod discovery;
mod scenario;
mod support;
mod validation_props;
