//! Host hook points and the ordered bus that dispatches them.

pub mod bus;
pub mod event;

pub use bus::HookBus;
pub use event::{
    DEFAULT_PRIORITY, HookEvent, HookHandler, HookRegistration, ListenerFn, ParamsFn, PostFn,
    QuerystringFn, ReportFn,
};
