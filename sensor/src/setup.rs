use std::time::Duration;

use plexrec_core::{HealthInfo, RecommendationsClient};
use tracing::{error, info};

use crate::error::SetupError;
use crate::transport::Transport;

/// Timeout of the `/health` request made during setup.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Check the base URL and API key against `/health`.
///
/// A 401 is reported as [`SetupError::InvalidAuth`]; any other non-200
/// status or connection failure as [`SetupError::CannotConnect`].
pub async fn validate_api(
    transport: &dyn Transport,
    client: &RecommendationsClient,
) -> Result<HealthInfo, SetupError> {
    let response = transport
        .execute(client.build_health(), HEALTH_TIMEOUT)
        .await
        .map_err(|e| {
            error!(url = %client.base_url(), error = %e, "Error connecting to API");
            SetupError::CannotConnect(e.to_string())
        })?;

    let info = client.parse_health(response).map_err(|e| {
        error!(url = %client.base_url(), error = %e, "API validation failed");
        SetupError::from(e)
    })?;

    info!(url = %client.base_url(), status = ?info.status, "API validated");
    Ok(info)
}
