//! Route access policy: classification plus the access decision function.

pub mod evaluator;
pub mod route_class;

pub use evaluator::{evaluate, SessionState, Verdict};
pub use route_class::{classify, RouteClass};
