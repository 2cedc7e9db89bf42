#![forbid(unsafe_code)]

//! reactx public facade crate.
//!
//! Re-exports the reactive core and adds the pieces a UI host needs on top
//! of it: render bindings ([`observer`]) and event sinks ([`EventLog`],
//! [`EventRecorder`]).

pub mod binding;
pub mod console;

pub use binding::{Observed, observer};
pub use console::{EventLog, EventRecorder};

pub mod prelude {
    pub use reactx_core as core;

    pub use crate::binding::{Observed, observer};
    pub use crate::console::{EventLog, EventRecorder};
    pub use reactx_core::{
        ArrayMethod, Class, Collection, Merged, Observer, Reactive, ReactiveError, ReactiveEvent, ReactiveObserver, Runtime,
        RuntimeConfig, SharedSubscription, Subscription, Target, Value,
    };
}
