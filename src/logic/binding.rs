use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gateway::SortSpec;
use crate::model::{field_is_present, Row};

/// Which writes a bound view accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl Capabilities {
    pub const READ_ONLY: Self = Self {
        insert: false,
        update: false,
        delete: false,
    };
    pub const UPDATE_ONLY: Self = Self {
        insert: false,
        update: true,
        delete: false,
    };
    pub const FULL: Self = Self {
        insert: true,
        update: true,
        delete: true,
    };

    pub fn allows(&self, mutation: Mutation) -> bool {
        match mutation {
            Mutation::Insert => self.insert,
            Mutation::Update => self.update,
            Mutation::Delete => self.delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutation {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mutation::Insert => "insert",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Join from a master binding's current record to this binding's rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterBinding {
    pub master: String,
    /// Field read from the master's current record
    pub master_field: String,
    /// Field on this binding's rows that must equal it
    pub child_field: String,
}

impl MasterBinding {
    pub fn new(master: &str, master_field: &str, child_field: &str) -> Self {
        Self {
            master: master.to_string(),
            master_field: master_field.to_string(),
            child_field: child_field.to_string(),
        }
    }
}

/// Where a binding gets its filter value from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    /// The graph root, filtered on the signed-in user's id
    User { field: String },
    Master(MasterBinding),
}

/// Predicate over the master's current record deciding whether a child exists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    #[default]
    Always,
    /// The master record carries a non-empty value in this field
    FieldPresent(String),
}

impl Gate {
    pub fn field_present(field: &str) -> Self {
        Gate::FieldPresent(field.to_string())
    }

    pub fn allows(&self, master: &Row) -> bool {
        match self {
            Gate::Always => true,
            Gate::FieldPresent(field) => field_is_present(master, field),
        }
    }
}

/// Static configuration of one bound view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingDefinition {
    pub id: String,
    /// View read from
    pub view: String,
    /// Table written to
    pub table: String,
    pub capabilities: Capabilities,
    pub source: BindingSource,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
    pub gate: Gate,
}

impl BindingDefinition {
    pub fn root(id: &str, view: &str, table: &str, user_field: &str) -> Self {
        Self {
            id: id.to_string(),
            view: view.to_string(),
            table: table.to_string(),
            capabilities: Capabilities::READ_ONLY,
            source: BindingSource::User {
                field: user_field.to_string(),
            },
            sort: None,
            limit: None,
            gate: Gate::Always,
        }
    }

    pub fn child(id: &str, view: &str, table: &str, master: MasterBinding) -> Self {
        Self {
            source: BindingSource::Master(master),
            ..Self::root(id, view, table, "")
        }
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn gated(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    pub fn master(&self) -> Option<&MasterBinding> {
        match &self.source {
            BindingSource::Master(master) => Some(master),
            BindingSource::User { .. } => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.master().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gate_on_linking_field() {
        let gate = Gate::field_present("business_id");
        let with = json!({"id": "u1", "business_id": "b1"});
        let without = json!({"id": "u1", "business_id": null});
        assert!(gate.allows(with.as_object().unwrap()));
        assert!(!gate.allows(without.as_object().unwrap()));
        assert!(Gate::Always.allows(without.as_object().unwrap()));
    }

    #[test]
    fn test_capabilities() {
        assert!(Capabilities::UPDATE_ONLY.allows(Mutation::Update));
        assert!(!Capabilities::UPDATE_ONLY.allows(Mutation::Insert));
        assert!(Capabilities::FULL.allows(Mutation::Delete));
        assert!(!Capabilities::READ_ONLY.allows(Mutation::Update));
    }

    #[test]
    fn test_child_definition() {
        let def = BindingDefinition::child(
            "business",
            "businesses_view",
            "businesses",
            MasterBinding::new("user", "id", "owner_id"),
        )
        .limit(1);
        assert!(!def.is_root());
        assert_eq!(def.master().unwrap().child_field, "owner_id");
        assert_eq!(def.limit, Some(1));
    }
}
