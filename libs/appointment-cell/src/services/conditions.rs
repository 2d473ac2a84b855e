use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AppointmentError, AppointmentReason, HealthCondition, ReasonType};

const MENTAL_HEALTH_CATEGORY: &str = "Mental Health";

/// Reason derivation: the first selected condition names the visit; its
/// category decides physical vs. mental. No conditions means the blank
/// physical default.
pub fn derive_reason(conditions: &[HealthCondition]) -> AppointmentReason {
    match conditions.first() {
        Some(condition) => AppointmentReason {
            name: condition.name.clone(),
            reason_type: if condition.category == MENTAL_HEALTH_CATEGORY {
                ReasonType::Mental
            } else {
                ReasonType::Physical
            },
        },
        None => AppointmentReason::default(),
    }
}

pub struct HealthConditionService {
    supabase: SupabaseClient,
}

impl HealthConditionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Distinct condition categories, sorted by name.
    pub async fn categories(&self) -> Result<Vec<String>, AppointmentError> {
        #[derive(Deserialize)]
        struct CategoryRow {
            category: String,
        }

        let rows: Vec<CategoryRow> = self
            .supabase
            .select("health_conditions?select=category", None)
            .await?;

        let distinct: BTreeSet<String> = rows.into_iter().map(|r| r.category).collect();
        Ok(distinct.into_iter().collect())
    }

    pub async fn conditions(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<HealthCondition>, AppointmentError> {
        let path = match category {
            Some(category) => category_filter_path(category),
            None => "health_conditions?order=name.asc".to_string(),
        };

        let conditions = self.supabase.select(&path, None).await?;
        Ok(conditions)
    }

    pub async fn conditions_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<HealthCondition>, AppointmentError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Resolving {} health conditions", ids.len());
        let conditions = self.supabase.select(&ids_filter_path(ids), None).await?;
        Ok(conditions)
    }
}

fn category_filter_path(category: &str) -> String {
    format!(
        "health_conditions?category=eq.{}&order=name.asc",
        urlencoding::encode(category)
    )
}

// Ids are caller input; encoding keeps `,` and `)` from rewriting the
// in.(...) filter expression.
fn ids_filter_path(ids: &[String]) -> String {
    let encoded: Vec<String> = ids
        .iter()
        .map(|id| urlencoding::encode(id).into_owned())
        .collect();
    format!("health_conditions?id=in.({})", encoded.join(","))
}
