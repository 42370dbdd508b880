use itertools::Itertools;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::{Filter, ReadQuery, TableGateway};
use crate::logic::binding::{BindingDefinition, BindingSource};
use crate::logic::views::{BindingError, BindingInstance, BoundViews, SkipReason};
use crate::model::uuid_value;

/// Problems with a set of binding definitions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("binding graph has no definitions")]
    Empty,
    #[error("binding id '{0}' is declared more than once")]
    DuplicateId(String),
    #[error("binding graph needs exactly one root, found {0:?}")]
    RootCount(Vec<String>),
    #[error("root binding '{0}' cannot carry a gate")]
    GatedRoot(String),
    #[error("binding '{binding}' refers to unknown master '{master}'")]
    UnknownMaster { binding: String, master: String },
    #[error("binding graph has a cycle through {0:?}")]
    Cycle(Vec<String>),
}

/// A validated, rooted DAG of binding definitions.
///
/// Build order is derived from the master edges, so definitions may be declared
/// in any order. Ties keep declaration order.
#[derive(Debug, Clone)]
pub struct BindingGraph {
    definitions: Vec<BindingDefinition>,
    order: Vec<usize>,
}

impl BindingGraph {
    pub fn new(definitions: Vec<BindingDefinition>) -> Result<Self, GraphError> {
        if definitions.is_empty() {
            return Err(GraphError::Empty);
        }
        if let Some(duplicate) = definitions.iter().map(|d| &d.id).duplicates().next() {
            return Err(GraphError::DuplicateId(duplicate.clone()));
        }

        let roots: Vec<&BindingDefinition> = definitions.iter().filter(|d| d.is_root()).collect();
        if roots.len() != 1 {
            return Err(GraphError::RootCount(
                roots.iter().map(|d| d.id.clone()).collect(),
            ));
        }
        if roots[0].gate != Default::default() {
            return Err(GraphError::GatedRoot(roots[0].id.clone()));
        }

        let index: HashMap<&str, usize> = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.as_str(), i))
            .collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); definitions.len()];
        let mut pending_masters = vec![0usize; definitions.len()];
        for (i, definition) in definitions.iter().enumerate() {
            if let Some(master) = definition.master() {
                let m = *index.get(master.master.as_str()).ok_or_else(|| {
                    GraphError::UnknownMaster {
                        binding: definition.id.clone(),
                        master: master.master.clone(),
                    }
                })?;
                children[m].push(i);
                pending_masters[i] += 1;
            }
        }

        // Kahn's algorithm
        let mut ready: VecDeque<usize> = (0..definitions.len())
            .filter(|&i| pending_masters[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(definitions.len());
        while let Some(i) = ready.pop_front() {
            order.push(i);
            for &child in &children[i] {
                pending_masters[child] -= 1;
                if pending_masters[child] == 0 {
                    ready.push_back(child);
                }
            }
        }

        if order.len() != definitions.len() {
            let stuck = (0..definitions.len())
                .filter(|i| !order.contains(i))
                .map(|i| definitions[i].id.clone())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(Self { definitions, order })
    }

    pub fn get(&self, id: &str) -> Option<&BindingDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    /// Definitions in build order: every master before its children
    pub fn build_order(&self) -> impl Iterator<Item = &BindingDefinition> {
        self.order.iter().map(|&i| &self.definitions[i])
    }

    /// Resolves every binding for `user_id`, one fetch at a time in build order.
    ///
    /// Bindings whose master is absent, empty or errored, or whose gate rejects
    /// the master record, are left out entirely. A failed fetch marks that
    /// binding errored; its subtree is skipped and unrelated bindings continue.
    pub async fn build<G: TableGateway + ?Sized>(&self, gateway: &G, user_id: Uuid) -> BoundViews {
        let mut views = BoundViews::new(user_id);

        for definition in self.build_order() {
            let filter = match Self::resolve_filter(definition, &views, user_id) {
                Ok(filter) => filter,
                Err(reason) => {
                    log::debug!("Skipping binding '{}': {:?}", definition.id, reason);
                    views.skip(&definition.id, reason);
                    continue;
                }
            };

            let query = ReadQuery::new(definition.view.clone())
                .filter(filter.field.clone(), filter.value.clone())
                .sort(definition.sort.clone())
                .limit(definition.limit);

            match gateway.read(&query).await {
                Ok(rows) => {
                    log::debug!("Binding '{}' loaded {} row(s)", definition.id, rows.len());
                    views.push(BindingInstance::ready(definition, filter, rows));
                }
                Err(source) => {
                    let error = BindingError::Fetch {
                        binding: definition.id.clone(),
                        source,
                    };
                    log::error!("{}", error);
                    views.push(BindingInstance::errored(definition, filter, &error));
                }
            }
        }

        views
    }

    fn resolve_filter(
        definition: &BindingDefinition,
        views: &BoundViews,
        user_id: Uuid,
    ) -> Result<Filter, SkipReason> {
        match &definition.source {
            BindingSource::User { field } => Ok(Filter::eq(field.clone(), uuid_value(&user_id))),
            BindingSource::Master(master) => {
                let instance = views.get(&master.master).ok_or(SkipReason::MasterMissing)?;
                if !instance.is_ready() {
                    return Err(SkipReason::MasterErrored);
                }
                let record = instance.current_record().ok_or(SkipReason::MasterEmpty)?;
                if !definition.gate.allows(record) {
                    return Err(SkipReason::Gated);
                }
                match record.get(&master.master_field) {
                    None | Some(Value::Null) => Err(SkipReason::MasterEmpty),
                    Some(value) => Ok(Filter::eq(master.child_field.clone(), value.clone())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::logic::binding::{Gate, MasterBinding};
    use serde_json::json;

    fn child(id: &str, master: &str) -> BindingDefinition {
        BindingDefinition::child(id, id, id, MasterBinding::new(master, "id", "parent_id"))
    }

    #[test]
    fn test_build_order_ignores_declaration_order() {
        let graph = BindingGraph::new(vec![
            child("grandchild", "child"),
            child("child", "root"),
            BindingDefinition::root("root", "root", "root", "id"),
        ])
        .unwrap();
        let order: Vec<_> = graph.build_order().map(|d| d.id.as_str()).collect();
        assert_eq!(order, vec!["root", "child", "grandchild"]);
    }

    #[test]
    fn test_invalid_graphs_are_rejected() {
        let root = BindingDefinition::root("root", "root", "root", "id");

        assert_eq!(BindingGraph::new(vec![]).unwrap_err(), GraphError::Empty);
        assert_eq!(
            BindingGraph::new(vec![root.clone(), root.clone()]).unwrap_err(),
            GraphError::DuplicateId("root".to_string())
        );
        assert!(matches!(
            BindingGraph::new(vec![child("a", "b"), child("b", "a")]).unwrap_err(),
            GraphError::RootCount(roots) if roots.is_empty()
        ));
        assert_eq!(
            BindingGraph::new(vec![root.clone(), child("a", "nope")]).unwrap_err(),
            GraphError::UnknownMaster {
                binding: "a".to_string(),
                master: "nope".to_string()
            }
        );
        assert_eq!(
            BindingGraph::new(vec![root.clone(), child("a", "b"), child("b", "a")]).unwrap_err(),
            GraphError::Cycle(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            BindingGraph::new(vec![root.gated(Gate::field_present("x"))]).unwrap_err(),
            GraphError::GatedRoot("root".to_string())
        );
    }

    #[tokio::test]
    async fn test_errored_master_prunes_subtree_only() {
        let graph = BindingGraph::new(vec![
            BindingDefinition::root("root", "root", "root", "id"),
            child("left", "root"),
            child("left_leaf", "left"),
            child("right", "root"),
        ])
        .unwrap();

        let user = Uuid::new_v4();
        let gateway = MemoryGateway::new();
        gateway.seed_rows("root", vec![json!({"id": user.to_string()})]);
        gateway.seed_rows("left", vec![json!({"id": "l1", "parent_id": user.to_string()})]);
        gateway.seed_rows("right", vec![json!({"id": "r1", "parent_id": user.to_string()})]);
        gateway.fail_on("read:left");

        let views = graph.build(&gateway, user).await;
        assert_eq!(views.ids(), vec!["root", "left", "right"]);
        assert!(!views.get("left").unwrap().is_ready());
        assert_eq!(views.current_record("right").unwrap()["id"], json!("r1"));
        assert_eq!(views.skipped()[0].id, "left_leaf");
        assert_eq!(views.skipped()[0].reason, SkipReason::MasterErrored);
        assert!(!gateway.calls().contains(&"read:left_leaf".to_string()));
    }

    #[tokio::test]
    async fn test_empty_master_skips_children() {
        let graph = BindingGraph::new(vec![
            BindingDefinition::root("root", "root", "root", "id"),
            child("child", "root"),
        ])
        .unwrap();
        let gateway = MemoryGateway::new();

        let views = graph.build(&gateway, Uuid::new_v4()).await;
        assert_eq!(views.ids(), vec!["root"]);
        assert_eq!(views.skipped()[0].reason, SkipReason::MasterEmpty);
        assert_eq!(gateway.calls(), vec!["read:root".to_string()]);
    }
}
