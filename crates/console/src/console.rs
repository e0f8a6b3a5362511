// =============================================================================
// Defo Console - Composition Root
// =============================================================================
// Wires config, session, API client and project store for one signed-in
// browser session (or an injected transport off-browser).
// =============================================================================

use std::rc::Rc;

use crate::api::{self, ApiClient, Dataset, DatasetUpload, FetchTransport, ProjectId, Transport};
use crate::config::ConsoleConfig;
use crate::error::StoreResult;
use crate::session::{CredentialStore, LocalStorageCredentials, Session};
use crate::store::ProjectStore;

/// Everything a console view needs, shared by cheap clones.
#[derive(Clone, Debug)]
pub struct Console {
    pub config: ConsoleConfig,
    pub session: Session,
    pub client: ApiClient,
    pub store: ProjectStore,
}

impl Console {
    /// Browser wiring: localStorage credential and `fetch` transport.
    pub fn browser(config: ConsoleConfig) -> Self {
        let credentials = Rc::new(LocalStorageCredentials::new(config.token_key.clone()));
        Self::with_transport(config, Rc::new(FetchTransport), credentials)
    }

    pub fn with_transport(
        config: ConsoleConfig,
        transport: Rc<dyn Transport>,
        credentials: Rc<dyn CredentialStore>,
    ) -> Self {
        let session = Session::new(credentials);
        let client = ApiClient::from_config(&config, transport, session.credentials());
        let store = ProjectStore::new(client.clone(), session.clone());
        log::info!("Console ready against {}", config.api_url);

        Self {
            config,
            session,
            client,
            store,
        }
    }

    /// Kick off the store's first fetch on the browser's task queue.
    pub fn spawn_initialize(&self) {
        let store = self.store.clone();
        wasm_bindgen_futures::spawn_local(async move {
            // Failures are already recorded in the store state.
            let _ = store.initialize().await;
        });
    }

    /// Upload with the configured size and extension policy.
    pub async fn upload_dataset(
        &self,
        project_id: &ProjectId,
        upload: DatasetUpload,
    ) -> StoreResult<Dataset> {
        api::upload_dataset(&self.client, &self.config, project_id, upload).await
    }
}
