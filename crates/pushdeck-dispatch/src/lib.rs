//! # pushdeck-dispatch
//!
//! The notification dispatch workflow.
//!
//! - [`resolve`] maps a [`pushdeck_core::CredentialBundle`] to client
//!   authentication settings
//! - [`ClientFactory`] builds a gateway client for an endpoint
//! - [`dispatch`] runs one build / send / await / close cycle and returns
//!   exactly one [`DispatchOutcome`]
//! - [`classify`] turns a gateway answer into `Accepted` or `Rejected`
//! - [`DispatchScheduler`] runs dispatches one at a time, in order, on a
//!   background worker and reports each through a completion channel
//! - [`ResultLog`] is the append-only history shown to the user

#![deny(unsafe_code)]

pub mod classify;
pub mod credentials;
pub mod factory;
pub mod outcome;
pub mod scheduler;
pub mod task;
pub mod testing;

pub use classify::classify;
pub use credentials::{AuthMode, ClientAuthConfig, resolve};
pub use factory::{ApnsClientFactory, ClientFactory, build_client};
pub use outcome::{
    ClientBuildError, DispatchError, DispatchOutcome, ExecutionFailure, ResultEntry, ResultLog,
};
pub use scheduler::{
    CompletionEvent, DispatchScheduler, DispatchTicket, SchedulerConfig, SchedulerError,
};
pub use task::{DispatchRequest, dispatch};
