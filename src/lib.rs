pub mod builder;
pub mod connection;
pub mod controller;
pub mod disposable;
pub mod event_loop;
pub mod hook;
pub mod logger;
pub mod prelude;
pub mod processor;
pub mod publisher;
pub mod queue;
pub mod router;
pub mod state_machine;
pub mod types;
pub mod utils;
