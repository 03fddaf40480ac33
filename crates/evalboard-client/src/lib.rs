#![allow(non_snake_case)]

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod datasets;
pub mod error;
pub mod notifications;
pub mod router;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::AuthService;
pub use client::{ApiClient, TokenProvider};
pub use config::ClientConfig;
pub use context::ClientContext;
pub use datasets::DatasetService;
pub use error::{ClientError, ErrorClass};
pub use notifications::{NotificationStore, NotifyOptions};
pub use router::{Location, NavigationDecision, Navigator, RouteMatch, RouteTable};
pub use session::{AuthSession, SessionState};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
pub use tasks::{TaskListState, TaskStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};
