pub mod auth;
pub mod datasets;
pub mod error;
pub mod notification;
pub mod tasks;

pub use auth::*;
pub use datasets::*;
pub use error::*;
pub use notification::*;
pub use tasks::*;
