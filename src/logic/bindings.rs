//! The bound views of the booking app: the signed-in user and, when they own
//! one, their business with its links, weekly hours and participants.

use crate::gateway::SortSpec;
use crate::logic::binding::{BindingDefinition, Capabilities, Gate, MasterBinding};
use crate::logic::graph::{BindingGraph, GraphError};

pub const USER: &str = "user";
pub const BUSINESS: &str = "business";
pub const BUSINESS_SOCIAL_LINKS: &str = "business_social_links";
pub const BUSINESS_WORKING_TIMES: &str = "business_working_times";
pub const BUSINESS_PARTICIPANTS: &str = "business_participants";

/// One row per weekday
pub const MAX_WORKING_DAYS: usize = 7;

pub fn business_bindings() -> Vec<BindingDefinition> {
    let business_master = || MasterBinding::new(BUSINESS, "id", "business_id");

    vec![
        BindingDefinition::root(USER, "users_view", "users", "id")
            .capabilities(Capabilities::UPDATE_ONLY)
            .limit(1),
        BindingDefinition::child(
            BUSINESS,
            "businesses_view",
            "businesses",
            MasterBinding::new(USER, "id", "owner_id"),
        )
        .capabilities(Capabilities::UPDATE_ONLY)
        .gated(Gate::field_present("business_id"))
        .limit(1),
        BindingDefinition::child(
            BUSINESS_SOCIAL_LINKS,
            "business_social_links",
            "business_social_links",
            business_master(),
        )
        .capabilities(Capabilities::UPDATE_ONLY)
        .limit(1),
        BindingDefinition::child(
            BUSINESS_WORKING_TIMES,
            "business_working_times_view",
            "business_working_times",
            business_master(),
        )
        .capabilities(Capabilities::FULL)
        .sort(SortSpec::asc("day_of_week"))
        .limit(MAX_WORKING_DAYS),
        BindingDefinition::child(
            BUSINESS_PARTICIPANTS,
            "business_participants_view",
            "business_participants",
            business_master(),
        )
        .capabilities(Capabilities::FULL)
        .sort(SortSpec::asc("created_at")),
    ]
}

pub fn business_graph() -> Result<BindingGraph, GraphError> {
    BindingGraph::new(business_bindings())
}
