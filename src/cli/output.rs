//! Output formatting helpers for CLI commands

use crate::console::ConsoleSnapshot;
use crate::device::HealthSnapshot;
use crate::dispense::{DispenseRecord, DispenseState};
use crate::history::{LatencyStats, LogEntry};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

/// Format duration in a human-readable way
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// One request log line: time, method, path, status, latency, detail.
pub fn format_log_entry(entry: &LogEntry) -> String {
    let status = if entry.status == 0 {
        "---".to_string()
    } else {
        entry.status.to_string()
    };
    let status = if entry.is_error {
        status.red().to_string()
    } else {
        status.green().to_string()
    };

    format!(
        "{} {:<4} {:<20} {} {:>5}ms {}",
        entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
        entry.method,
        entry.path,
        status,
        entry.latency_ms,
        entry.detail
    )
}

/// Colored dispense state label.
pub fn state_label(state: DispenseState) -> String {
    match state {
        DispenseState::Idle => "idle".normal().to_string(),
        DispenseState::Dispensing => "dispensing".yellow().to_string(),
        DispenseState::Done => "done".green().to_string(),
        DispenseState::Error => "error".red().to_string(),
    }
}

fn format_record(record: &DispenseRecord) -> String {
    let mut text = format!(
        "{} {} {}/{}",
        record.tx_id,
        state_label(record.state),
        record.dispensed,
        record.quantity
    );
    if let Some(error) = &record.error {
        text.push_str(&format!(" ({})", error));
    }
    text
}

fn format_latency(stats: Option<LatencyStats>) -> String {
    match stats {
        Some(s) => format!(
            "min {:.0}ms / avg {:.0}ms / max {:.0}ms ({} samples)",
            s.min_ms, s.avg_ms, s.max_ms, s.samples
        ),
        None => "no samples".to_string(),
    }
}

fn health_rows(table: &mut Table, health: &HealthSnapshot) {
    let status = if health.status == "ok" {
        health.status.green().to_string()
    } else {
        health.status.yellow().to_string()
    };
    table.add_row(vec![Cell::new("Status"), Cell::new(status)]);
    table.add_row(vec![Cell::new("Firmware"), Cell::new(&health.firmware)]);
    table.add_row(vec![
        Cell::new("Uptime"),
        Cell::new(format_duration(health.uptime)),
    ]);
    table.add_row(vec![Cell::new("Dispenser"), Cell::new(&health.dispenser)]);

    if let Some(low) = health.hopper_low {
        let hopper = if low {
            "LOW".red().to_string()
        } else {
            "ok".green().to_string()
        };
        table.add_row(vec![Cell::new("Hopper"), Cell::new(hopper)]);
    }
    if let Some(wifi) = &health.wifi {
        table.add_row(vec![
            Cell::new("Wi-Fi"),
            Cell::new(format!("{} {} ({} dBm)", wifi.ssid, wifi.ip, wifi.rssi)),
        ]);
    }
    if let Some(gpio) = &health.gpio {
        table.add_row(vec![
            Cell::new("GPIO"),
            Cell::new(format!(
                "coin={} error={} hopper_low={}",
                gpio.coin_pulse.raw, gpio.error_signal.raw, gpio.hopper_low.raw
            )),
        ]);
    }

    let metrics = &health.metrics;
    let rate = health
        .success_rate()
        .map(|r| format!("{:.1}%", r))
        .unwrap_or_else(|| "n/a".to_string());
    table.add_row(vec![
        Cell::new("Dispenses"),
        Cell::new(format!(
            "{} total, {} ok ({}), {} jams, {} partial, {} failed",
            metrics.total_dispenses,
            metrics.successful,
            rate,
            metrics.jams,
            metrics.partial,
            metrics.failures
        )),
    ]);
    if !metrics.last_error.is_empty() {
        table.add_row(vec![
            Cell::new("Last error"),
            Cell::new(format!("{} ({})", metrics.last_error, metrics.last_error_type)),
        ]);
    }
    if let Some(active) = &health.active_tx {
        table.add_row(vec![
            Cell::new("Active tx"),
            Cell::new(format!(
                "{} {}/{}",
                active.tx_id, active.dispensed, active.quantity
            )),
        ]);
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format a device health snapshot as a table
pub fn format_health_table(health: &HealthSnapshot) -> String {
    let mut table = new_table();
    table.set_header(vec!["Device", "Value"]);
    health_rows(&mut table, health);
    table.to_string()
}

/// Format the whole console state as a table
pub fn format_status_table(snapshot: &ConsoleSnapshot) -> String {
    let mut table = new_table();
    table.set_header(vec!["Console", "Value"]);

    let link = if snapshot.connected {
        "connected".green().to_string()
    } else {
        "disconnected".red().to_string()
    };
    table.add_row(vec![Cell::new("Link"), Cell::new(link)]);
    if let Some(error) = &snapshot.health_error {
        table.add_row(vec![Cell::new("Health error"), Cell::new(error.red())]);
    }
    if let Some(health) = &snapshot.health {
        health_rows(&mut table, health);
    }

    let transaction = match (&snapshot.dispense, &snapshot.pending) {
        (_, Some(pending)) => format!("{} starting ({} tokens)", pending.tx_id, pending.quantity),
        (Some(record), None) => format_record(record),
        (None, None) => "none".to_string(),
    };
    table.add_row(vec![Cell::new("Transaction"), Cell::new(transaction)]);
    table.add_row(vec![
        Cell::new("Quantity"),
        Cell::new(snapshot.manual_quantity),
    ]);

    let cycle = &snapshot.test_cycle;
    let mut cycle_text = format!("{} ({} tokens)", cycle.preset, cycle.quantity());
    if cycle.running {
        cycle_text.push_str(" running");
    } else if let Some(result) = &cycle.last_result {
        let message = if result.passed {
            result.message.green()
        } else {
            result.message.red()
        };
        cycle_text.push_str(&format!(" - {}", message));
    }
    table.add_row(vec![Cell::new("Test cycle"), Cell::new(cycle_text)]);

    let burst = &snapshot.burst;
    let mut burst_text = format!(
        "{}x{} tokens, {}/{} done, {} ok, {} failed",
        burst.total, burst.quantity, burst.completed, burst.total, burst.succeeded, burst.failed
    );
    if burst.running {
        burst_text.push_str(" (running)");
    } else if let Some(rate) = burst.success_rate() {
        burst_text.push_str(&format!(" ({:.0}%)", rate));
    }
    table.add_row(vec![Cell::new("Burst"), Cell::new(burst_text)]);

    table.add_row(vec![
        Cell::new("Latency"),
        Cell::new(format_latency(snapshot.latency_stats)),
    ]);
    table.add_row(vec![
        Cell::new("In flight"),
        Cell::new(snapshot.in_flight),
    ]);

    table.to_string()
}
