//! Remote binding for the coordinator
//!
//! taskpull uses a pull model: workers connect to the coordinator and ask
//! for work, the coordinator never pushes.
//!
//! - **Coordinator server**: exposes `pull`/`finish` over TCP
//! - **Remote coordinator**: worker-side client for the same two calls
//! - **Worker**: poll loop that executes tasks and reports outcomes
//!
//! # Modules
//!
//! - `protocol`: message definitions and framing
//! - `service`: the `CoordinatorService` trait and its in-process binding
//! - `server`: TCP adapter around a shared `Coordinator`
//! - `client`: TCP implementation of `CoordinatorService`
//! - `worker`: worker loops

pub mod client;
pub mod protocol;
pub mod server;
pub mod service;
pub mod worker;

pub use client::RemoteCoordinator;
pub use protocol::{Message, PROTOCOL_VERSION};
pub use server::CoordinatorServer;
pub use service::{CoordinatorService, LocalCoordinator};
pub use worker::{run_remote_workers, run_workers, Worker, WorkerOptions, WorkerSummary};
