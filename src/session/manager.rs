use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::gateway::{run_rpc, tables, CreateBusiness, CreateBusinessArgs, Gateway, GatewayError};
use crate::logic::{BindingError, BindingGraph, BoundViews, Mutation, PendingWrite};
use crate::model::{
    BusinessDetails, NewUserRecord, Profile, ProfileUpdate, Row, Session, SignUpAttributes,
    SocialLinks, WorkingTimeEntry,
};
use crate::session::state::{
    AuthStatus, SessionContext, SessionError, SessionSnapshot, SessionStatus,
};

type Resolution = Shared<BoxFuture<'static, Result<AuthStatus, SessionError>>>;

/// Owns the session, the profile and the bound views of the signed-in user.
///
/// Cheap to clone; clones share the same session. Nothing else mutates this
/// state, other components read it through the projection methods.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    graph: BindingGraph,
    ctx: RwLock<SessionContext>,
    /// The identity lookup every concurrent `initialize` caller awaits
    in_flight: Mutex<Option<Resolution>>,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn Gateway>, graph: BindingGraph) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                graph,
                ctx: RwLock::new(SessionContext::default()),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.inner.gateway
    }

    /// Resolves the provider's current session and, when there is one, loads the
    /// profile and builds the bound views.
    ///
    /// Callers arriving while a resolution is running share its result.
    pub async fn initialize(&self) -> Result<AuthStatus, SessionError> {
        let resolution = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(running) => running.clone(),
                None => {
                    let resolution = Inner::resolve(self.inner.clone()).boxed().shared();
                    *slot = Some(resolution.clone());
                    resolution
                }
            }
        };
        resolution.await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        self.tracked(self.login_inner(email, password)).await
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let session = self
            .inner
            .gateway
            .sign_in(email, password)
            .await
            .map_err(SessionError::auth)?;
        let user_id = session.user_id();
        log::info!("Signed in user {}", user_id);

        let epoch = self.inner.advance(|ctx| ctx.store_session(session));
        self.inner.load_profile(epoch, user_id).await;
        self.inner.rebuild_views(epoch, user_id).await;
        Ok(())
    }

    /// Signs up and creates the matching `users` row. A failed row insert is
    /// logged only; the auth identity already exists.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        attributes: SignUpAttributes,
    ) -> Result<(), SessionError> {
        self.tracked(self.register_inner(email, password, attributes))
            .await
    }

    async fn register_inner(
        &self,
        email: &str,
        password: &str,
        attributes: SignUpAttributes,
    ) -> Result<(), SessionError> {
        let outcome = self
            .inner
            .gateway
            .sign_up(email, password, &attributes)
            .await
            .map_err(SessionError::auth)?;
        let user_id = outcome.user_id();
        log::info!("Registered user {}", user_id);

        self.inner
            .advance(|ctx| ctx.store_session(outcome.into_session()));

        let record = NewUserRecord::from_sign_up(user_id, email, &attributes);
        if let Err(e) = tables::insert_user(&*self.inner.gateway, &record).await {
            log::warn!("Failed to create user record for {}: {}", user_id, e);
        }
        Ok(())
    }

    /// Signs out. On success the session, profile and bound views are dropped
    /// whatever else is in flight; on failure nothing changes.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.tracked(async {
            self.inner
                .gateway
                .sign_out()
                .await
                .map_err(SessionError::auth)?;
            self.inner.advance(|ctx| ctx.clear(SessionStatus::Anonymous));
            log::info!("Signed out");
            Ok::<_, SessionError>(())
        })
        .await
    }

    /// Reloads the profile of the current user; does nothing when signed out.
    pub async fn refresh_profile(&self) {
        let Some((epoch, user_id)) = self.inner.current_user() else {
            return;
        };
        self.inner.load_profile(epoch, user_id).await;
    }

    pub async fn update_profile(&self, updates: ProfileUpdate) -> Result<Profile, SessionError> {
        self.tracked(async {
            let (_, user_id) = self
                .inner
                .current_user()
                .ok_or(SessionError::NotAuthenticated)?;
            let profile = tables::update_profile(&*self.inner.gateway, user_id, &updates).await?;
            self.refresh_profile().await;
            Ok::<_, SessionError>(profile)
        })
        .await
    }

    /// Runs the business setup procedure, then reloads the profile and rebuilds
    /// the bound views so the new business shows up.
    pub async fn create_business(
        &self,
        details: BusinessDetails,
        links: SocialLinks,
        working_times: Vec<WorkingTimeEntry>,
    ) -> Result<Uuid, SessionError> {
        self.tracked(async {
            let (epoch, user_id) = self
                .inner
                .current_user()
                .ok_or(SessionError::NotAuthenticated)?;
            let args = CreateBusinessArgs::new(details, links, working_times);
            let business_id = run_rpc::<CreateBusiness>(&*self.inner.gateway, &args).await?;
            log::info!("Created business {} for user {}", business_id, user_id);

            self.inner.load_profile(epoch, user_id).await;
            self.inner.rebuild_views(epoch, user_id).await;
            Ok::<_, SessionError>(business_id)
        })
        .await
    }

    /// Discards the bound views and builds them again for the current user
    pub async fn reload_views(&self) -> Result<(), SessionError> {
        self.tracked(async {
            let (epoch, user_id) = self
                .inner
                .current_user()
                .ok_or(SessionError::NotAuthenticated)?;
            self.inner.rebuild_views(epoch, user_id).await;
            Ok::<_, SessionError>(())
        })
        .await
    }

    pub async fn insert_view_row(&self, binding: &str, row: Row) -> Result<Row, SessionError> {
        self.tracked(self.edit_views(|views| views.plan_insert(binding, row)))
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn update_view_row(
        &self,
        binding: &str,
        record_id: &str,
        patch: Row,
    ) -> Result<Row, SessionError> {
        self.tracked(self.edit_views(|views| views.plan_update(binding, record_id, patch)))
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn delete_view_row(&self, binding: &str, record_id: &str) -> Result<(), SessionError> {
        self.tracked(self.edit_views(|views| views.plan_delete(binding, record_id)))
            .await
            .map(|_| ())
    }

    /// Plans a write against the current views, sends it, then folds the result
    /// into whatever the views hold by then. Other edits that finished in the
    /// meantime are kept.
    async fn edit_views(
        &self,
        plan: impl FnOnce(&BoundViews) -> Result<PendingWrite, BindingError>,
    ) -> Result<Option<Row>, SessionError> {
        let (epoch, write) = {
            let ctx = self.inner.ctx.read();
            let views = ctx
                .views
                .as_ref()
                .filter(|_| ctx.session.is_some())
                .ok_or(SessionError::NotAuthenticated)?;
            (ctx.epoch, plan(views)?)
        };

        let stored = write.execute(&*self.inner.gateway).await?;

        let mut ctx = self.inner.ctx.write();
        if ctx.epoch != epoch {
            log::debug!("Session changed during {} on '{}'", write.mutation(), write.binding());
        } else if let Some(views) = ctx.views.as_mut() {
            return Ok(views.apply(&write, stored));
        }
        Ok(stored.or_else(|| (write.mutation() != Mutation::Delete).then(|| write.row().clone())))
    }

    /// Counts the operation as in flight and records its error, if any
    async fn tracked<T>(
        &self,
        operation: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        self.inner.start();
        let result = operation.await;
        self.inner.finish(&result);
        result
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.ctx.read().status
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.ctx.read().session.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.inner.ctx.read().profile.clone()
    }

    pub fn bound_views(&self) -> Option<BoundViews> {
        self.inner.ctx.read().views.clone()
    }

    /// Session present and its email confirmed
    pub fn is_authenticated(&self) -> bool {
        self.inner.ctx.read().is_authenticated()
    }

    pub fn is_email_verified(&self) -> bool {
        self.snapshot().is_email_verified
    }

    pub fn is_business_owner(&self) -> bool {
        self.snapshot().is_business_owner
    }

    pub fn user_email(&self) -> String {
        self.snapshot().user_email
    }

    /// "First Last" from the profile, empty without one
    pub fn user_name(&self) -> String {
        self.snapshot().user_name
    }

    pub fn is_loading(&self) -> bool {
        self.inner.ctx.read().pending > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.ctx.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.ctx.write().last_error = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.inner.ctx.read())
    }
}

impl Inner {
    async fn resolve(inner: Arc<Inner>) -> Result<AuthStatus, SessionError> {
        inner.start();
        let epoch = inner.ctx.read().epoch;
        inner.commit(epoch, |ctx| ctx.status = SessionStatus::Authenticating);

        let result = inner.resolve_session(epoch).await;
        inner.in_flight.lock().take();
        inner.finish(&result);
        result
    }

    async fn resolve_session(&self, epoch: u64) -> Result<AuthStatus, SessionError> {
        let user = match self.gateway.get_current_user().await {
            Ok(user) => user,
            Err(e) => {
                log::error!("Auth initialization error: {}", e);
                self.commit(epoch, |ctx| ctx.clear(SessionStatus::AuthError));
                return Err(SessionError::auth(e));
            }
        };

        let Some(user) = user else {
            self.commit(epoch, |ctx| ctx.clear(SessionStatus::Anonymous));
            return Ok(self.outcome(epoch, AuthStatus::NotAuthenticated));
        };

        let user_id = user.id;
        let session = match self.gateway.get_session().await {
            Ok(Some(mut session)) if session.user.id == user_id => {
                session.user = user;
                session
            }
            Ok(_) => Session::pending(user),
            Err(e) => {
                log::warn!("Could not read session tokens: {}", e);
                Session::pending(user)
            }
        };

        if !self.commit(epoch, |ctx| ctx.store_session(session)) {
            return Ok(self.outcome(epoch, AuthStatus::Authenticated));
        }
        self.load_profile(epoch, user_id).await;
        self.rebuild_views(epoch, user_id).await;
        Ok(AuthStatus::Authenticated)
    }

    /// Marks an operation as in flight and clears the previous error
    fn start(&self) {
        let mut ctx = self.ctx.write();
        ctx.pending += 1;
        ctx.last_error = None;
    }

    /// Starts a new logical session with `update`. Results still in flight
    /// from older epochs are discarded when they try to commit.
    fn advance(&self, update: impl FnOnce(&mut SessionContext)) -> u64 {
        let mut ctx = self.ctx.write();
        ctx.epoch += 1;
        update(&mut ctx);
        ctx.epoch
    }

    fn finish<T>(&self, result: &Result<T, SessionError>) {
        let mut ctx = self.ctx.write();
        ctx.pending = ctx.pending.saturating_sub(1);
        if let Err(e) = result {
            ctx.last_error = Some(e.to_string());
        }
    }

    /// Applies `update` only if the session has not changed hands since `epoch`
    fn commit(&self, epoch: u64, update: impl FnOnce(&mut SessionContext)) -> bool {
        let mut ctx = self.ctx.write();
        if ctx.epoch != epoch {
            log::debug!("Discarding stale result from epoch {} (now {})", epoch, ctx.epoch);
            return false;
        }
        update(&mut ctx);
        true
    }

    /// What a superseded resolution reports: whatever the newer state says
    fn outcome(&self, epoch: u64, own: AuthStatus) -> AuthStatus {
        let ctx = self.ctx.read();
        if ctx.epoch == epoch {
            own
        } else if ctx.status.has_session() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::NotAuthenticated
        }
    }

    fn current_user(&self) -> Option<(u64, Uuid)> {
        let ctx = self.ctx.read();
        ctx.session.as_ref().map(|s| (ctx.epoch, s.user_id()))
    }

    /// Profile load failures are not fatal: the row may not exist yet.
    async fn load_profile(&self, epoch: u64, user_id: Uuid) {
        if !self.commit(epoch, |ctx| ctx.status = SessionStatus::ProfileLoading) {
            return;
        }

        let profile = match tables::get_profile(&*self.gateway, user_id).await {
            Ok(profile) => Some(profile),
            Err(GatewayError::NoRows(_)) => {
                log::info!("No profile row yet for user {}", user_id);
                None
            }
            Err(e) => {
                log::error!("Error loading user profile: {}", e);
                None
            }
        };

        self.commit(epoch, |ctx| {
            ctx.status = if profile.is_some() {
                SessionStatus::ProfileReady
            } else {
                SessionStatus::ProfileAbsent
            };
            ctx.profile = profile;
        });
    }

    async fn rebuild_views(&self, epoch: u64, user_id: Uuid) {
        let views = self.graph.build(&*self.gateway, user_id).await;
        log::debug!("Bound views for {}: {:?}", user_id, views.ids());
        self.commit(epoch, |ctx| ctx.views = Some(views));
    }
}
