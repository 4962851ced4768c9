//! Startup health probe.
//!
//! One GET against the mode's models endpoint, run through the response
//! checks. A failure here means the operator's endpoint, key or mode is
//! wrong; it is logged with full context and propagated so startup aborts
//! instead of failing on the first real call.

use tracing::{error, info};

use crate::client::config::ClientConfig;
use crate::endpoint::models_url;
use crate::transport::HttpTransport;
use crate::Result;

pub async fn preflight(config: &ClientConfig) -> Result<()> {
    config.validate()?;
    let url = models_url(config.mode, &config.base_url)?;
    info!(mode = %config.mode, %url, "LLM preflight");

    let transport = HttpTransport::new(config.timeout)?;
    match transport
        .get_json(&url, &config.auth_headers(), "preflight")
        .await
    {
        Ok(_) => {
            info!(mode = %config.mode, "LLM preflight ok");
            Ok(())
        }
        Err(e) => {
            error!(mode = %config.mode, %url, error = %e, "LLM preflight failed");
            Err(e)
        }
    }
}
