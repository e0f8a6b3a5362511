// =============================================================================
// Defo Console - Project Store
// =============================================================================
// Table of Contents:
// 1. Submodules
// 2. Store State
// 3. Project Store
// 4. Operations
// 5. Session Link
// =============================================================================
//
// Server-confirmed writes only: create/update/delete touch the cache after
// the server answers, never before. The cache holds at most one entry per id.

pub mod reactive;
pub mod subscribers;

pub use reactive::StoreSignal;
pub use subscribers::{Subscribers, Subscription};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::api::{self, ApiClient, Project, ProjectDraft, ProjectId, ProjectPatch, ProjectStatus};
use crate::error::{ApiError, ErrorKind, StoreError, StoreResult};
use crate::session::Session;
use crate::utils::is_valid_project_name;

// -----------------------------------------------------------------------------
// 2. Store State
// -----------------------------------------------------------------------------

/// Aggregate observed by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectsState {
    pub projects: Vec<Project>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ProjectsState {
    /// State of a store that has not settled its first fetch yet.
    pub fn pending() -> Self {
        Self {
            projects: Vec::new(),
            loading: true,
            error: None,
        }
    }

    /// State without a credential: nothing cached, nothing in flight.
    pub fn signed_out() -> Self {
        Self {
            projects: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn total_projects(&self) -> usize {
        self.projects.len()
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.get(id).is_some()
    }

    /// Per-status counts for dashboard cards.
    pub fn summary(&self) -> StatusSummary {
        self.projects
            .iter()
            .fold(StatusSummary::default(), |mut summary, project| {
                match project.status {
                    ProjectStatus::Active => summary.active += 1,
                    ProjectStatus::Paused => summary.paused += 1,
                    ProjectStatus::Completed => summary.completed += 1,
                }
                summary
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub active: usize,
    pub paused: usize,
    pub completed: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.active + self.paused + self.completed
    }
}

// -----------------------------------------------------------------------------
// 3. Project Store
// -----------------------------------------------------------------------------

struct StoreInner {
    client: ApiClient,
    session: Session,
    state: RefCell<ProjectsState>,
    subscribers: Subscribers<ProjectsState>,
    session_link: RefCell<Option<Subscription>>,
    // Bumped on every reset; responses from an older generation are dropped.
    generation: Cell<u64>,
}

/// Session-scoped, server-backed cache of projects.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct ProjectStore {
    inner: Rc<StoreInner>,
}

impl ProjectStore {
    /// Create a store bound to `session`; it resets whenever the session ends.
    pub fn new(client: ApiClient, session: Session) -> Self {
        let store = Self {
            inner: Rc::new(StoreInner {
                client,
                session,
                state: RefCell::new(ProjectsState::pending()),
                subscribers: Subscribers::new(),
                session_link: RefCell::new(None),
                generation: Cell::new(0),
            }),
        };
        store.link_session();
        store
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Snapshot of the current aggregate.
    pub fn state(&self) -> ProjectsState {
        self.inner.state.borrow().clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.inner.state.borrow().projects.clone()
    }

    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.inner.state.borrow().get(id).cloned()
    }

    /// Observe every state transition. No initial value is delivered.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&ProjectsState) + 'static) -> Subscription {
        self.inner.subscribers.subscribe(callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Apply `change` atomically, then broadcast the resulting aggregate.
    fn transition(&self, change: impl FnOnce(&mut ProjectsState)) {
        let snapshot = {
            let mut state = self.inner.state.borrow_mut();
            change(&mut state);
            state.clone()
        };
        self.inner.subscribers.publish(&snapshot);
    }

    fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Whether no reset happened since `generation` was read.
    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.get() == generation
    }

    /// Route an unauthorized failure into the session invalidation path.
    fn handle_failure(&self, generation: u64, err: &ApiError) {
        if err.kind() == ErrorKind::Unauthorized && self.is_current(generation) {
            self.inner.session.invalidate();
        }
    }
}

// -----------------------------------------------------------------------------
// 4. Operations
// -----------------------------------------------------------------------------

impl ProjectStore {
    /// First fetch for a mounted consumer.
    ///
    /// Without a credential the store settles to the signed-out state without
    /// touching the network.
    pub async fn initialize(&self) -> StoreResult<()> {
        if !self.inner.client.has_credential() {
            log::debug!("No credential held, skipping project fetch");
            self.transition(|state| *state = ProjectsState::signed_out());
            return Ok(());
        }
        self.list().await
    }

    /// Replace the cache with the server's collection.
    ///
    /// On failure the previous snapshot stays visible and `error` is set.
    /// Concurrent calls are not coalesced: each completion overwrites the
    /// cache, so the last response to arrive wins.
    pub async fn list(&self) -> StoreResult<()> {
        let generation = self.generation();
        self.transition(|state| {
            state.loading = true;
            state.error = None;
        });
        log::debug!("Fetching projects");

        match api::list_projects(&self.inner.client).await {
            Ok(_) if !self.is_current(generation) => {
                log::debug!("Discarding project list from an ended session");
                Ok(())
            }
            Ok(projects) => {
                log::info!("Loaded {} projects", projects.len());
                self.transition(|state| {
                    state.projects = dedup_by_id(projects);
                    state.error = None;
                    state.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                let err = StoreError::from_api("Failed to load projects", &e);
                log::error!("Error fetching projects: {}", e);
                if self.is_current(generation) {
                    let message = err.message.clone();
                    self.transition(|state| {
                        state.error = Some(message);
                        state.loading = false;
                    });
                }
                self.handle_failure(generation, &e);
                Err(err)
            }
        }
    }

    /// Alias of [`ProjectStore::list`] for "refresh" buttons.
    pub async fn refresh(&self) -> StoreResult<()> {
        self.list().await
    }

    /// Create a project and append the server's canonical copy.
    pub async fn create(&self, draft: ProjectDraft) -> StoreResult<Project> {
        if !is_valid_project_name(&draft.name) {
            return Err(StoreError::validation("Project name is required"));
        }
        log::debug!("Creating project {:?}", draft.name.trim());
        let generation = self.generation();

        match api::create_project(&self.inner.client, &draft).await {
            Ok(project) => {
                log::info!("Created project {}", project.id);
                if self.is_current(generation) {
                    let created = project.clone();
                    self.transition(move |state| upsert(&mut state.projects, created));
                }
                Ok(project)
            }
            Err(e) => {
                log::warn!("Error creating project: {}", e);
                self.handle_failure(generation, &e);
                Err(StoreError::from_api("Failed to create project", &e))
            }
        }
    }

    /// Update a cached project; the server's response replaces the entry.
    pub async fn update(&self, id: &ProjectId, patch: ProjectPatch) -> StoreResult<Project> {
        if !self.inner.state.borrow().contains(id) {
            return Err(StoreError::validation(format!("Project {} not found", id)));
        }
        if let Some(name) = &patch.name {
            if !is_valid_project_name(name) {
                return Err(StoreError::validation("Project name is required"));
            }
        }
        log::debug!("Updating project {}", id);
        let generation = self.generation();

        match api::update_project(&self.inner.client, id, &patch).await {
            Ok(project) => {
                log::info!("Updated project {}", project.id);
                if self.is_current(generation) {
                    let updated = project.clone();
                    self.transition(move |state| {
                        // Removed meanwhile by a delete or refresh: leave it gone.
                        if let Some(slot) =
                            state.projects.iter_mut().find(|p| p.id == updated.id)
                        {
                            *slot = updated;
                        }
                    });
                }
                Ok(project)
            }
            Err(e) => {
                log::warn!("Error updating project {}: {}", id, e);
                self.handle_failure(generation, &e);
                Err(StoreError::from_api("Failed to update project", &e))
            }
        }
    }

    /// Delete a project; the entry leaves the cache only once the server agrees.
    pub async fn delete(&self, id: &ProjectId) -> StoreResult<()> {
        log::debug!("Deleting project {}", id);
        let generation = self.generation();

        match api::delete_project(&self.inner.client, id).await {
            Ok(()) => {
                log::info!("Deleted project {}", id);
                if self.is_current(generation) {
                    self.transition(|state| state.projects.retain(|p| &p.id != id));
                }
                Ok(())
            }
            Err(e) => {
                log::warn!("Error deleting project {}: {}", id, e);
                self.handle_failure(generation, &e);
                Err(StoreError::from_api("Failed to delete project", &e))
            }
        }
    }

    /// Session invalidation hook: drop everything cached for this session.
    pub fn invalidate(&self) {
        log::debug!("Clearing project cache");
        self.inner.generation.set(self.inner.generation.get().wrapping_add(1));
        self.transition(|state| *state = ProjectsState::signed_out());
    }
}

fn upsert(projects: &mut Vec<Project>, project: Project) {
    match projects.iter_mut().find(|p| p.id == project.id) {
        Some(slot) => *slot = project,
        None => projects.push(project),
    }
}

/// Keep the first occurrence of each id, preserving server order.
fn dedup_by_id(projects: Vec<Project>) -> Vec<Project> {
    let mut seen = std::collections::HashSet::new();
    projects
        .into_iter()
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

// -----------------------------------------------------------------------------
// 5. Session Link
// -----------------------------------------------------------------------------

impl ProjectStore {
    fn link_session(&self) {
        let weak: Weak<StoreInner> = Rc::downgrade(&self.inner);
        let link = self.inner.session.subscribe(move |event| {
            if !event.ends_session() {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                ProjectStore { inner }.invalidate();
            }
        });
        *self.inner.session_link.borrow_mut() = Some(link);
    }
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ProjectStore")
            .field("projects", &state.projects.len())
            .field("loading", &state.loading)
            .field("error", &state.error)
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}
