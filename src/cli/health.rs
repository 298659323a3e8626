//! Health command implementation

use crate::cli::output::format_health_table;
use crate::cli::HealthArgs;
use crate::device::{DeviceApi, DispenserClient};
use std::fmt::Write;

/// Handle health command
///
/// Queries the device once. A failed query is returned as an error so the
/// process exits non-zero.
pub async fn handle_health(args: &HealthArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = args.device.load_config()?;
    let client = DispenserClient::new(&config.device);

    let outcome = client.query_health().await;
    let health = outcome.result()?;

    if args.json {
        return Ok(serde_json::to_string_pretty(health)?);
    }

    let mut output = String::new();
    writeln!(output, "Device: {}", client.base_url())?;
    writeln!(
        output,
        "Latency: {}ms",
        outcome.latency.as_millis()
    )?;
    write!(output, "{}", format_health_table(health))?;
    Ok(output)
}
