use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use crate::gateway::query::{Filter, ReadQuery};
use crate::gateway::rpc::{CreateBusiness, CreateBusinessArgs, RpcOperation};
use crate::gateway::traits::{
    AuthGateway, GatewayError, GatewayResult, RpcGateway, TableGateway,
};
use crate::model::{row_id, AuthUser, Row, Session, SignUpAttributes, SignUpOutcome, ID_FIELD};

#[derive(Debug, Clone)]
struct Account {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    current: Option<Session>,
    tables: HashMap<String, Vec<Row>>,
    /// view name -> backing table
    views: HashMap<String, String>,
    calls: Vec<String>,
    failures: HashSet<String>,
}

/// In-process backend used by tests and the offline demo.
///
/// Views are plain aliases onto tables. Every call is appended to a log
/// (`"read:users_view"`, `"get_current_user"`, ...) and any log key can be made to
/// fail with [`MemoryGateway::fail_on`].
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
    auto_confirm: bool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, so concurrent callers overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sign-ups are confirmed immediately and get a session
    pub fn with_auto_confirm(mut self) -> Self {
        self.auto_confirm = true;
        self
    }

    pub fn with_view(self, view: &str, table: &str) -> Self {
        self.state
            .lock()
            .views
            .insert(view.to_string(), table.to_string());
        self
    }

    pub fn add_account(&self, email: &str, password: &str, confirmed: bool) -> AuthUser {
        let mut user = AuthUser::new(Uuid::new_v4(), email);
        if confirmed {
            user = user.confirmed(Utc::now());
        }
        self.state.lock().accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Pretend the provider already holds a session for this account
    pub fn restore_session(&self, user: &AuthUser) {
        self.state.lock().current = Some(Session::new(user.clone(), Uuid::new_v4().to_string()));
    }

    pub fn seed_rows(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.state.lock();
        let stored = state.tables.entry(table.to_string()).or_default();
        stored.extend(rows.into_iter().filter_map(|v| v.as_object().cloned()));
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn fail_on(&self, call: &str) {
        self.state.lock().failures.insert(call.to_string());
    }

    pub fn clear_failure(&self, call: &str) {
        self.state.lock().failures.remove(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Records the call, waits out the latency and reports an injected failure
    async fn enter(&self, call: String) -> GatewayResult<()> {
        let fail = {
            let mut state = self.state.lock();
            let fail = state.failures.contains(&call);
            state.calls.push(call.clone());
            fail
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(GatewayError::rejected(500, format!("injected failure on {}", call)));
        }
        Ok(())
    }

    fn resolve_table(state: &MemoryState, source: &str) -> String {
        state
            .views
            .get(source)
            .cloned()
            .unwrap_or_else(|| source.to_string())
    }

    fn create_business(state: &mut MemoryState, args: CreateBusinessArgs) -> GatewayResult<Value> {
        let owner = state
            .current
            .as_ref()
            .map(|s| s.user.id)
            .ok_or_else(|| GatewayError::auth("Auth session missing!"))?;
        let business_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        let business = json!({
            "id": business_id.to_string(),
            "owner_id": owner.to_string(),
            "name": args.p_name,
            "category_id": args.p_category_id,
            "description": args.p_description,
            "bg_colour": args.p_bg_colour,
            "default_currency": args.p_default_currency,
            "address_line1": args.p_address_line1,
            "address_line2": args.p_address_line2,
            "city": args.p_city,
            "county": args.p_county,
            "postal_code": args.p_postal_code,
            "country": args.p_country,
            "is_active_provider": args.p_is_active_provider,
            "created_at": now,
        });
        let links = json!({
            "id": Uuid::new_v4().to_string(),
            "business_id": business_id.to_string(),
            "twitter_url": args.p_twitter_url,
            "instagram_url": args.p_instagram_url,
            "facebook_url": args.p_facebook_url,
            "other_url": args.p_other_url,
        });
        let participant = json!({
            "id": Uuid::new_v4().to_string(),
            "business_id": business_id.to_string(),
            "user_id": owner.to_string(),
            "role": "Owner",
            "created_at": now,
        });

        let push = |state: &mut MemoryState, table: &str, value: Value| {
            if let Some(row) = value.as_object().cloned() {
                state.tables.entry(table.to_string()).or_default().push(row);
            }
        };
        push(state, "businesses", business);
        push(state, "business_social_links", links);
        push(state, "business_participants", participant);
        for entry in args.p_working_times {
            let mut value = serde_json::to_value(&entry)?;
            value["id"] = json!(Uuid::new_v4().to_string());
            value["business_id"] = json!(business_id.to_string());
            push(state, "business_working_times", value);
        }

        if let Some(users) = state.tables.get_mut("users") {
            for user in users.iter_mut() {
                if row_id(user).as_deref() == Some(owner.to_string().as_str()) {
                    user.insert("business_id".to_string(), json!(business_id.to_string()));
                    user.insert("is_business_owner".to_string(), json!(true));
                }
            }
        }

        Ok(json!(business_id.to_string()))
    }
}

#[async_trait::async_trait]
impl AuthGateway for MemoryGateway {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _attributes: &SignUpAttributes,
    ) -> GatewayResult<SignUpOutcome> {
        self.enter("sign_up".to_string()).await?;
        let mut state = self.state.lock();
        if state.accounts.contains_key(email) {
            return Err(GatewayError::auth("User already registered"));
        }
        let mut user = AuthUser::new(Uuid::new_v4(), email);
        if self.auto_confirm {
            user = user.confirmed(Utc::now());
        }
        state.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );

        let session = self
            .auto_confirm
            .then(|| Session::new(user.clone(), Uuid::new_v4().to_string()));
        if session.is_some() {
            state.current = session.clone();
        }
        Ok(SignUpOutcome { user, session })
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Session> {
        self.enter("sign_in".to_string()).await?;
        let mut state = self.state.lock();
        let account = state
            .accounts
            .get(email)
            .filter(|a| a.password == password)
            .cloned()
            .ok_or_else(|| GatewayError::auth("Invalid login credentials"))?;
        if !account.user.is_email_confirmed() {
            return Err(GatewayError::auth("Email not confirmed"));
        }
        let session = Session::new(account.user, Uuid::new_v4().to_string());
        state.current = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.enter("sign_out".to_string()).await?;
        self.state.lock().current = None;
        Ok(())
    }

    async fn get_current_user(&self) -> GatewayResult<Option<AuthUser>> {
        self.enter("get_current_user".to_string()).await?;
        Ok(self.state.lock().current.as_ref().map(|s| s.user.clone()))
    }

    async fn get_session(&self) -> GatewayResult<Option<Session>> {
        self.enter("get_session".to_string()).await?;
        Ok(self.state.lock().current.clone())
    }
}

#[async_trait::async_trait]
impl TableGateway for MemoryGateway {
    async fn read(&self, query: &ReadQuery) -> GatewayResult<Vec<Row>> {
        self.enter(format!("read:{}", query.source)).await?;
        let state = self.state.lock();
        let table = Self::resolve_table(&state, &query.source);
        let rows = state.tables.get(&table).cloned().unwrap_or_default();
        Ok(query.apply(rows))
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> GatewayResult<Vec<Row>> {
        self.enter(format!("insert:{}", table)).await?;
        let mut state = self.state.lock();
        let stored = state.tables.entry(table.to_string()).or_default();
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            if !row.contains_key(ID_FIELD) {
                row.insert(ID_FIELD.to_string(), json!(Uuid::new_v4().to_string()));
            }
            if stored.iter().any(|r| row_id(r).is_some() && row_id(r) == row_id(&row)) {
                return Err(GatewayError::rejected(
                    409,
                    format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
                ));
            }
            stored.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn update(&self, table: &str, patch: Row, filters: &[Filter]) -> GatewayResult<Vec<Row>> {
        self.enter(format!("update:{}", table)).await?;
        let mut state = self.state.lock();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if filters.iter().all(|f| f.matches(row)) {
                    for (key, value) in &patch {
                        row.insert(key.clone(), value.clone());
                    }
                    updated.push(row.clone());
                }
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> GatewayResult<Vec<Row>> {
        self.enter(format!("delete:{}", table)).await?;
        let mut state = self.state.lock();
        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let (deleted, kept): (Vec<Row>, Vec<Row>) = rows
            .drain(..)
            .partition(|row| filters.iter().all(|f| f.matches(row)));
        *rows = kept;
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl RpcGateway for MemoryGateway {
    async fn invoke(&self, name: &str, args: Value) -> GatewayResult<Value> {
        self.enter(format!("rpc:{}", name)).await?;
        let mut state = self.state.lock();
        match name {
            CreateBusiness::NAME => {
                let args: CreateBusinessArgs = serde_json::from_value(args)?;
                Self::create_business(&mut state, args)
            }
            other => Err(GatewayError::rejected(
                404,
                format!("Could not find the function public.{}", other),
            )),
        }
    }
}
