//! Library half of the `meshwatch-server` binary, split out so integration
//! tests can exercise the debug HTTP surface without a running process.

pub mod debug_server;
pub mod transports;
pub mod webhook_notifier;
