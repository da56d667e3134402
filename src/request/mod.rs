//! Request state of one endpoint invocation scope and its reducer.
//!
//! Every change to a [`RequestState`] goes through [`reduce`]; the executor
//! never mutates the state directly.

mod reducer;
mod state;

pub use reducer::{reduce, RequestAction};
pub use state::{RequestError, RequestExtra, RequestState};
