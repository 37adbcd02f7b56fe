use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::repo_types::Business;

/// Body of `saveOrUpdateBusiness`. With an `id` the owned row is updated.
#[derive(Debug, Default, Deserialize)]
pub struct SaveBusinessRequest {
    pub id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(alias = "jobPosition")]
    pub job_position: Option<String>,
    #[serde(alias = "teamSize")]
    pub team_size: Option<String>,
    pub location: Option<String>,
}

/// Business profile as shown to its owner; every field empty before onboarding.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BusinessDetails {
    pub id: Option<Uuid>,
    pub name: String,
    pub job_position: String,
    pub team_size: Option<String>,
    pub location: Option<String>,
}

impl From<Business> for BusinessDetails {
    fn from(b: Business) -> Self {
        Self {
            id: Some(b.id),
            name: b.name,
            job_position: b.job_position,
            team_size: b.team_size,
            location: b.location,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BusinessResponse {
    pub business: BusinessDetails,
}

#[derive(Debug, Serialize)]
pub struct SaveBusinessResponse {
    pub message: &'static str,
    pub business: BusinessDetails,
}
