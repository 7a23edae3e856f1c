//! Job source implementations.

pub mod html;
pub mod http;
pub mod session;

pub use http::{HttpJobSource, HttpSourceConfig};
pub use session::{Credentials, HttpSession, HttpSessionConfig};
