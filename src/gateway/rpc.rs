use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::gateway::traits::{GatewayError, RpcGateway};
use crate::model::{BusinessDetails, SocialLinks, WorkingTimeEntry};

/// A remote procedure with a fixed argument and return shape.
///
/// Every procedure the backend exposes gets one implementor; callers go through
/// [`run_rpc`] so the payload is checked at compile time.
pub trait RpcOperation {
    const NAME: &'static str;
    type Args: Serialize + Send + Sync;
    type Returns: DeserializeOwned;
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("RPC {operation} failed: {source}")]
pub struct RpcError {
    pub operation: &'static str,
    #[source]
    pub source: GatewayError,
}

pub async fn run_rpc<Op: RpcOperation>(
    gateway: &(impl RpcGateway + ?Sized),
    args: &Op::Args,
) -> Result<Op::Returns, RpcError> {
    let wrap = |source: GatewayError| RpcError {
        operation: Op::NAME,
        source,
    };

    let payload = serde_json::to_value(args).map_err(|e| wrap(e.into()))?;
    log::debug!("Invoking RPC {}", Op::NAME);
    let result = gateway.invoke(Op::NAME, payload).await.map_err(wrap)?;
    serde_json::from_value(result).map_err(|e| wrap(e.into()))
}

/// `create_business`: creates the business, its social links and weekly hours in
/// one transaction and returns the new business id.
pub struct CreateBusiness;

impl RpcOperation for CreateBusiness {
    const NAME: &'static str = "create_business";
    type Args = CreateBusinessArgs;
    type Returns = Uuid;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBusinessArgs {
    pub p_name: String,
    pub p_category_id: Option<Uuid>,
    pub p_description: Option<String>,
    pub p_bg_colour: Option<String>,
    pub p_default_currency: Option<String>,
    pub p_address_line1: String,
    pub p_address_line2: Option<String>,
    pub p_city: String,
    pub p_county: Option<String>,
    pub p_postal_code: String,
    pub p_country: String,
    pub p_twitter_url: Option<String>,
    pub p_instagram_url: Option<String>,
    pub p_facebook_url: Option<String>,
    pub p_other_url: Option<String>,
    pub p_is_active_provider: bool,
    pub p_working_times: Vec<WorkingTimeEntry>,
}

impl CreateBusinessArgs {
    pub fn new(
        details: BusinessDetails,
        links: SocialLinks,
        working_times: Vec<WorkingTimeEntry>,
    ) -> Self {
        Self {
            p_name: details.name,
            p_category_id: details.category_id,
            p_description: details.description,
            p_bg_colour: details.bg_colour,
            p_default_currency: details.default_currency,
            p_address_line1: details.address_line1,
            p_address_line2: details.address_line2,
            p_city: details.city,
            p_county: details.county,
            p_postal_code: details.postal_code,
            p_country: details.country,
            p_twitter_url: links.twitter_url,
            p_instagram_url: links.instagram_url,
            p_facebook_url: links.facebook_url,
            p_other_url: links.other_url,
            p_is_active_provider: details.is_active_provider,
            p_working_times: working_times,
        }
    }
}
