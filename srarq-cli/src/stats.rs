//! Statistics display and formatting

use srarq::TransferStats;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth in human-readable form
pub fn format_bandwidth(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;

    if bps >= MBPS {
        format!("{:.2} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Format an elapsed transfer time
pub fn format_elapsed(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Print the end-of-transfer summary
pub fn display_transfer_stats(stats: &TransferStats) {
    println!("┌──────────────────────────────────────────────┐");
    println!("│ TRANSFER SUMMARY                             │");
    println!("├──────────────────────────────────────────────┤");
    println!(
        "│ Payload:      {} in {} segments",
        format_bytes(stats.payload_bytes),
        stats.segments
    );
    println!(
        "│ Sent:         {} datagrams ({})",
        stats.datagrams_sent,
        format_bytes(stats.bytes_sent)
    );
    println!(
        "│ Retransmits:  {} ({:.1}%)",
        stats.retransmissions,
        stats.retransmission_ratio() * 100.0
    );
    println!(
        "│ Acks:         {} received, {} ignored",
        stats.acks_received, stats.stale_acks
    );
    if stats.transmit_failures > 0 {
        println!("│ Send errors:  {}", stats.transmit_failures);
    }
    println!(
        "│ Elapsed:      {} ({})",
        format_elapsed(stats.elapsed),
        format_bandwidth(stats.goodput_bps())
    );
    println!("└──────────────────────────────────────────────┘");
}
