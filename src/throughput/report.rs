//! Throughput evaluation and formatting against a Gigabit Ethernet reference.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Direction, TransferResult, BYTES_PER_MIB};

/// Byte rate of a 1000 Mbps link in MB/s.
pub const GIGABIT_REFERENCE_MBPS: f64 = 125.0;

/// Lowest speed rated [`RatingTier::Excellent`].
pub const EXCELLENT_THRESHOLD_MBPS: f64 = 100.0;

const GOOD_THRESHOLD_MBPS: f64 = 80.0;
const FAIR_THRESHOLD_MBPS: f64 = 50.0;
const SLOW_THRESHOLD_MBPS: f64 = 10.0;

/// Troubleshooting tips attached to every sub-excellent result, in order.
pub const ADVISORY: [&str; 5] = [
    "Use Cat5e or better Ethernet cabling",
    "Check that the network switch supports Gigabit",
    "Make sure the network adapter negotiates 1000 Mbps full duplex",
    "Close unnecessary network programs and services",
    "Look for network bottlenecks or interference",
];

// ---------------------------------------------------------------------------
// RatingTier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingTier {
    Excellent,
    Good,
    Fair,
    Slow,
    VerySlow,
}

impl RatingTier {
    /// Thresholds are inclusive lower bounds, checked high to low.
    pub fn classify(speed_mbps: f64) -> Self {
        if speed_mbps >= EXCELLENT_THRESHOLD_MBPS {
            Self::Excellent
        } else if speed_mbps >= GOOD_THRESHOLD_MBPS {
            Self::Good
        } else if speed_mbps >= FAIR_THRESHOLD_MBPS {
            Self::Fair
        } else if speed_mbps >= SLOW_THRESHOLD_MBPS {
            Self::Slow
        } else {
            Self::VerySlow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Slow => "Slow",
            Self::VerySlow => "Very slow",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Excellent => "✅",
            Self::Good => "⚡",
            Self::Fair => "⚠️",
            Self::Slow => "🐌",
            Self::VerySlow => "🚫",
        }
    }

    /// One-line assessment shown under the rating.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Excellent => "Congratulations! Your network delivers Gigabit-class performance",
            Self::Good => "Close to Gigabit performance, with room for improvement",
            Self::Fair => "Average speed; check your network equipment and connection quality",
            Self::Slow => "Slow; the path may not be using Gigabit equipment",
            Self::VerySlow => "Very slow; check the network connection for problems",
        }
    }
}

impl std::fmt::Display for RatingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Rated throughput of a transfer with a measurable duration.
#[derive(Debug, Clone, Serialize)]
pub struct ThroughputReport {
    pub direction: Direction,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub finished_at: DateTime<Utc>,
    pub speed_mbps: f64,
    pub percent_of_gigabit: f64,
    pub rating: RatingTier,
    /// Empty exactly when `rating` is [`RatingTier::Excellent`].
    pub advisory: Vec<String>,
}

/// Result of evaluating one transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Measured(ThroughputReport),
    /// Elapsed time was zero or negative, so no rate can be computed.
    Undeterminable {
        direction: Direction,
        total_bytes: u64,
        elapsed_secs: f64,
        finished_at: DateTime<Utc>,
    },
}

impl Evaluation {
    pub fn report(&self) -> Option<&ThroughputReport> {
        match self {
            Self::Measured(report) => Some(report),
            Self::Undeterminable { .. } => None,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        match self {
            Self::Measured(report) => report.total_bytes,
            Self::Undeterminable { total_bytes, .. } => *total_bytes,
        }
    }
}

/// Turn a finished transfer into a rated report.
pub fn evaluate(result: TransferResult) -> Evaluation {
    let direction = result.direction();
    let total_bytes = result.total_bytes();
    let elapsed_secs = result.elapsed_secs();
    let finished_at = result.finished_at();

    if !(elapsed_secs.is_finite() && elapsed_secs > 0.0) {
        return Evaluation::Undeterminable {
            direction,
            total_bytes,
            elapsed_secs,
            finished_at,
        };
    }

    let speed_mbps = total_bytes as f64 / BYTES_PER_MIB as f64 / elapsed_secs;
    let percent_of_gigabit = speed_mbps / GIGABIT_REFERENCE_MBPS * 100.0;
    let rating = RatingTier::classify(speed_mbps);
    let advisory = if rating == RatingTier::Excellent {
        Vec::new()
    } else {
        ADVISORY.iter().map(|s| s.to_string()).collect()
    };

    Evaluation::Measured(ThroughputReport {
        direction,
        total_bytes,
        elapsed_secs,
        finished_at,
        speed_mbps,
        percent_of_gigabit,
        rating,
        advisory,
    })
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format an evaluation as the console report.
pub fn format_report(evaluation: &Evaluation) -> String {
    let (direction, total_bytes, elapsed_secs) = match evaluation {
        Evaluation::Measured(r) => (r.direction, r.total_bytes, r.elapsed_secs),
        Evaluation::Undeterminable {
            direction,
            total_bytes,
            elapsed_secs,
            ..
        } => (*direction, *total_bytes, *elapsed_secs),
    };

    let mut out = String::new();
    let _ = writeln!(out, "--- Test Results ---");
    let _ = writeln!(
        out,
        "Total {}: {:.2} MB ({} bytes)",
        direction.verb(),
        total_bytes as f64 / BYTES_PER_MIB as f64,
        total_bytes
    );
    let _ = writeln!(out, "Elapsed: {:.2} s", elapsed_secs);

    let report = match evaluation {
        Evaluation::Measured(report) => report,
        Evaluation::Undeterminable { .. } => {
            let _ = writeln!(out, "Transfer was too short to determine speed.");
            return out;
        }
    };

    let _ = writeln!(out, "Average speed: {:.2} MB/s", report.speed_mbps);
    let _ = writeln!(out);
    let _ = writeln!(out, "--- Gigabit Ethernet Evaluation ---");
    let _ = writeln!(
        out,
        "Theoretical Gigabit speed: {:.0} MB/s",
        GIGABIT_REFERENCE_MBPS
    );
    let _ = writeln!(out, "Measured speed: {:.2} MB/s", report.speed_mbps);
    let _ = writeln!(
        out,
        "Share of theoretical speed: {:.1}%",
        report.percent_of_gigabit
    );
    let _ = writeln!(
        out,
        "Rating: {} {}",
        report.rating.label(),
        report.rating.emoji()
    );
    let _ = writeln!(out, "Assessment: {}", report.rating.message());

    if !report.advisory.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Suggestions ---");
        for tip in &report.advisory {
            let _ = writeln!(out, "• {}", tip);
        }
    }

    out
}
