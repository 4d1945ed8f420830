//! AI-Bridge console: a terminal control panel that relays text messages
//! between two Claude agents through the bridge backend's HTTP API.
//!
//! The heavy lifting — message storage, session orchestration, file bundle
//! application — lives in the backend. This crate is the operator side:
//! session lifecycle, counter-based merge of the polled server message list,
//! manual dispatch, metrics display, and conversation export.

pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod export;
pub mod notify;
pub mod poller;
pub mod session;
pub mod store;

pub use api::{BridgeClient, BridgeError};
pub use controller::{SessionController, SessionSettings};
pub use poller::{merge_new_messages, MessagePoller, MetricsPoller};
pub use session::{Agent, Message, SessionState, Speaker};
