use std::sync::Arc;

use tracing::info;

use crate::auth::AuthService;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::datasets::DatasetService;
use crate::error::ClientError;
use crate::notifications::NotificationStore;
use crate::router::Navigator;
use crate::session::AuthSession;
use crate::storage::TokenStore;
use crate::tasks::TaskStore;
use crate::transport::{HttpTransport, Transport};

/// Everything a front end needs, wired once and passed around explicitly.
#[derive(Clone)]
pub struct ClientContext {
    pub notifications: NotificationStore,
    pub navigator: Navigator,
    pub session: Arc<AuthSession>,
    pub api: ApiClient,
    pub tasks: TaskStore,
    pub datasets: DatasetService,
}

impl ClientContext {
    pub fn new(config: &ClientConfig, storage: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config)?;
        info!("api base url {}", config.base_url);
        Ok(Self::with_transport(Arc::new(transport), storage))
    }

    /// Wires the stores over an arbitrary transport. Auth endpoints go
    /// through a credential-free client so the session never calls itself.
    pub fn with_transport(transport: Arc<dyn Transport>, storage: Arc<dyn TokenStore>) -> Self {
        let notifications = NotificationStore::new();
        let navigator = Navigator::default();

        let authApi = ApiClient::new(transport.clone(), notifications.clone());
        let session = Arc::new(AuthSession::new(AuthService::new(authApi), storage));

        let api = ApiClient::new(transport, notifications.clone())
            .with_tokens(session.clone())
            .with_navigator(navigator.clone());

        Self {
            tasks: TaskStore::new(api.clone()),
            datasets: DatasetService::new(api.clone()),
            notifications,
            navigator,
            session,
            api,
        }
    }

    /// Navigates with the current authentication state applied to the guard.
    pub fn navigate(&self, to: &str) -> Option<crate::router::RouteMatch> {
        self.navigator.navigate(to, self.session.is_authenticated())
    }
}
