//! Request dispatch, response lifecycle and output transforms.

pub mod handler;
pub mod lifecycle;
pub mod transform;

pub use handler::{Handler, Outcome, error_page};
pub use lifecycle::{LifecycleState, RequestLifecycle, SUPPORTED_METHODS};
pub use transform::{ChunkedTransform, GzipTransform, OutputTransform};
