//! Valuation simulator function

use axum::{extract::rejection::JsonRejection, Json};
use bizval_common::simulation::{self, SimulationRequest, SimulationResult};

use super::json_body;
use crate::ApiResult;

/// POST /functions/simulate-valuation
///
/// Pure computation; authentication only gates access.
pub async fn simulate_valuation(
    payload: Result<Json<SimulationRequest>, JsonRejection>,
) -> ApiResult<Json<SimulationResult>> {
    let request = json_body(payload)?;
    Ok(Json(simulation::simulate(&request)?))
}
