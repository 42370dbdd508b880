use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::{Filter, GatewayError, SortSpec, TableGateway};
use crate::logic::binding::{BindingDefinition, Capabilities, Mutation};
use crate::model::{row_id, Row, ID_FIELD};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("binding '{0}' is not constructed")]
    NotConstructed(String),
    #[error("binding '{0}' failed to load")]
    Unavailable(String),
    #[error("binding '{binding}' does not allow {mutation}")]
    MutationNotAllowed { binding: String, mutation: Mutation },
    #[error("record '{record}' not found in binding '{binding}'")]
    RecordNotFound { binding: String, record: String },
    #[error("binding '{binding}' fetch failed: {source}")]
    Fetch {
        binding: String,
        #[source]
        source: GatewayError,
    },
    #[error("binding '{binding}' {mutation} failed: {source}")]
    Write {
        binding: String,
        mutation: Mutation,
        #[source]
        source: GatewayError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "lowercase")]
pub enum BindingStatus {
    Ready,
    Errored(String),
}

/// Materialized rows of one binding definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BindingInstance {
    pub id: String,
    pub status: BindingStatus,
    /// The filter actually applied (`child_field = master value`)
    pub filter: Filter,
    pub rows: Vec<Row>,
    #[serde(skip)]
    table: String,
    #[serde(skip)]
    capabilities: Capabilities,
    #[serde(skip)]
    sort: Option<SortSpec>,
}

impl BindingInstance {
    pub(crate) fn ready(definition: &BindingDefinition, filter: Filter, mut rows: Vec<Row>) -> Self {
        if let Some(limit) = definition.limit {
            rows.truncate(limit);
        }
        Self {
            id: definition.id.clone(),
            status: BindingStatus::Ready,
            filter,
            rows,
            table: definition.table.clone(),
            capabilities: definition.capabilities,
            sort: definition.sort.clone(),
        }
    }

    pub(crate) fn errored(definition: &BindingDefinition, filter: Filter, error: &BindingError) -> Self {
        Self {
            status: BindingStatus::Errored(error.to_string()),
            ..Self::ready(definition, filter, Vec::new())
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == BindingStatus::Ready
    }

    /// First row, the record children bind to
    pub fn current_record(&self) -> Option<&Row> {
        if self.is_ready() {
            self.rows.first()
        } else {
            None
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn check(&self, mutation: Mutation) -> Result<(), BindingError> {
        if !self.is_ready() {
            return Err(BindingError::Unavailable(self.id.clone()));
        }
        if !self.capabilities.allows(mutation) {
            return Err(BindingError::MutationNotAllowed {
                binding: self.id.clone(),
                mutation,
            });
        }
        Ok(())
    }

    fn position(&self, record_id: &str) -> Result<usize, BindingError> {
        self.rows
            .iter()
            .position(|row| row_id(row).as_deref() == Some(record_id))
            .ok_or_else(|| BindingError::RecordNotFound {
                binding: self.id.clone(),
                record: record_id.to_string(),
            })
    }

    fn resort(&mut self) {
        if let Some(sort) = &self.sort {
            self.rows.sort_by(|a, b| sort.compare(a, b));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The master binding was never constructed
    MasterMissing,
    /// The master binding loaded but has no current record, or lacks the join field
    MasterEmpty,
    MasterErrored,
    /// The gate over the master record said no
    Gated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedBinding {
    pub id: String,
    pub reason: SkipReason,
}

/// The bound views built for one user, in build order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundViews {
    pub user_id: Uuid,
    instances: Vec<BindingInstance>,
    skipped: Vec<SkippedBinding>,
}

impl BoundViews {
    pub(crate) fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            instances: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, instance: BindingInstance) {
        self.instances.push(instance);
    }

    pub(crate) fn skip(&mut self, id: &str, reason: SkipReason) {
        self.skipped.push(SkippedBinding {
            id: id.to_string(),
            reason,
        });
    }

    pub fn get(&self, id: &str) -> Option<&BindingInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn current_record(&self, id: &str) -> Option<&Row> {
        self.get(id).and_then(BindingInstance::current_record)
    }

    /// Ids of the constructed bindings, in build order
    pub fn ids(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.id.as_str()).collect()
    }

    pub fn instances(&self) -> &[BindingInstance] {
        &self.instances
    }

    pub fn skipped(&self) -> &[SkippedBinding] {
        &self.skipped
    }

    pub fn is_constructed(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn find(&self, id: &str) -> Result<&BindingInstance, BindingError> {
        self.get(id)
            .ok_or_else(|| BindingError::NotConstructed(id.to_string()))
    }

    /// Checks an insert through a child binding. The join field is filled from
    /// the binding's filter so the row lands under the current master.
    pub fn plan_insert(&self, id: &str, mut row: Row) -> Result<PendingWrite, BindingError> {
        let instance = self.find(id)?;
        instance.check(Mutation::Insert)?;
        row.insert(instance.filter.field.clone(), instance.filter.value.clone());
        Ok(PendingWrite::new(instance, Mutation::Insert, None, row))
    }

    pub fn plan_update(&self, id: &str, record_id: &str, patch: Row) -> Result<PendingWrite, BindingError> {
        let instance = self.find(id)?;
        instance.check(Mutation::Update)?;
        instance.position(record_id)?;
        Ok(PendingWrite::new(instance, Mutation::Update, Some(record_id), patch))
    }

    pub fn plan_delete(&self, id: &str, record_id: &str) -> Result<PendingWrite, BindingError> {
        let instance = self.find(id)?;
        instance.check(Mutation::Delete)?;
        instance.position(record_id)?;
        Ok(PendingWrite::new(instance, Mutation::Delete, Some(record_id), Row::new()))
    }

    /// Folds a completed write into the current rows and returns the row as the
    /// binding now holds it (`None` after a delete).
    ///
    /// Only the touched row changes, so writes finishing in any order all land.
    /// A record that is no longer bound is left alone.
    pub fn apply(&mut self, write: &PendingWrite, stored: Option<Row>) -> Option<Row> {
        let Some(instance) = self.instances.iter_mut().find(|i| i.id == write.binding) else {
            return stored;
        };
        match (write.mutation, write.record_id.as_deref()) {
            (Mutation::Insert, _) => {
                let row = stored?;
                let known = row_id(&row).is_some_and(|id| instance.position(&id).is_ok());
                if !known {
                    instance.rows.push(row.clone());
                    instance.resort();
                }
                Some(row)
            }
            (Mutation::Update, Some(record_id)) => {
                let Ok(index) = instance.position(record_id) else {
                    return stored;
                };
                let row = stored.unwrap_or_else(|| {
                    let mut merged = instance.rows[index].clone();
                    merged.extend(write.row.clone());
                    merged
                });
                instance.rows[index] = row.clone();
                instance.resort();
                Some(row)
            }
            (Mutation::Delete, Some(record_id)) => {
                if let Ok(index) = instance.position(record_id) {
                    instance.rows.remove(index);
                }
                None
            }
            _ => stored,
        }
    }

    pub async fn insert<G: TableGateway + ?Sized>(
        &mut self,
        gateway: &G,
        id: &str,
        row: Row,
    ) -> Result<Row, BindingError> {
        let write = self.plan_insert(id, row)?;
        let stored = write.execute(gateway).await?;
        Ok(self.apply(&write, stored).unwrap_or_else(|| write.row.clone()))
    }

    pub async fn update<G: TableGateway + ?Sized>(
        &mut self,
        gateway: &G,
        id: &str,
        record_id: &str,
        patch: Row,
    ) -> Result<Row, BindingError> {
        let write = self.plan_update(id, record_id, patch)?;
        let stored = write.execute(gateway).await?;
        Ok(self.apply(&write, stored).unwrap_or_else(|| write.row.clone()))
    }

    pub async fn delete<G: TableGateway + ?Sized>(
        &mut self,
        gateway: &G,
        id: &str,
        record_id: &str,
    ) -> Result<(), BindingError> {
        let write = self.plan_delete(id, record_id)?;
        let stored = write.execute(gateway).await?;
        self.apply(&write, stored);
        Ok(())
    }
}

/// A capability-checked write against one binding, not yet sent
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    binding: String,
    table: String,
    mutation: Mutation,
    record_id: Option<String>,
    row: Row,
}

impl PendingWrite {
    fn new(instance: &BindingInstance, mutation: Mutation, record_id: Option<&str>, row: Row) -> Self {
        Self {
            binding: instance.id.clone(),
            table: instance.table.clone(),
            mutation,
            record_id: record_id.map(str::to_string),
            row,
        }
    }

    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn mutation(&self) -> Mutation {
        self.mutation
    }

    /// The inserted row or the update patch
    pub fn row(&self) -> &Row {
        &self.row
    }

    /// Sends the write; inserts and updates return the stored row when the
    /// backend echoes one.
    pub async fn execute<G: TableGateway + ?Sized>(&self, gateway: &G) -> Result<Option<Row>, BindingError> {
        let by_id: Vec<Filter> = self
            .record_id
            .iter()
            .map(|id| Filter::eq(ID_FIELD, id.as_str()))
            .collect();
        let result = match self.mutation {
            Mutation::Insert => gateway
                .insert(&self.table, vec![self.row.clone()])
                .await
                .and_then(|mut rows| {
                    rows.pop()
                        .map(Some)
                        .ok_or_else(|| GatewayError::NoRows(self.table.clone()))
                }),
            Mutation::Update => gateway
                .update(&self.table, self.row.clone(), &by_id)
                .await
                .map(|rows| rows.into_iter().next()),
            Mutation::Delete => gateway.delete(&self.table, &by_id).await.map(|_| None),
        };
        result.map_err(|source| BindingError::Write {
            binding: self.binding.clone(),
            mutation: self.mutation,
            source,
        })
    }
}
