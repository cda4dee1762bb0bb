//! Terminal rendering. Every function returns a `String`; `main` decides where it goes.

use crate::analytic::AnalyticResult;
use crate::engine::Evaluation;
use crate::feeling::FeelingMatch;
use crate::sim::SimulationSummary;
use crate::stats::{HistogramBin, REPORTED_PERCENTILES};
use colored::*;
use std::fmt::Write;

const BAR_WIDTH: usize = 40;

/// `1234567.0` -> `"1,234,567"`. Rounds to the nearest unit.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn rate_colored(percent: f64) -> ColoredString {
    let text = format!("{:.2}%", percent);
    if percent >= 90.0 {
        text.green()
    } else if percent >= 50.0 {
        text.yellow()
    } else {
        text.red()
    }
}

pub fn format_planned_line(planned_pulls: f64, success_rate: f64) -> String {
    format!(
        "Chance of success within {} pulls: {}",
        planned_pulls.floor(),
        rate_colored(success_rate)
    )
}

pub fn format_evaluation(pool_name: &str, planned_pulls: f64, eval: &Evaluation) -> String {
    let stats = eval.stats();
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("=== {} ===", pool_name).bold());
    if eval.acquisition.completed_cycles > 0 {
        let _ = writeln!(out, "Completed pity cycles: {}", eval.acquisition.completed_cycles);
    }
    let _ = writeln!(
        out,
        "Expected pulls: {:.2} (std dev {:.2})",
        stats.mean, stats.std_dev
    );
    let _ = writeln!(out, "Support: {} .. {} pulls", stats.min, stats.max);
    let percentiles: Vec<String> = REPORTED_PERCENTILES
        .iter()
        .map(|&p| format!("p{}={}", p, stats.percentile(p)))
        .collect();
    let _ = writeln!(out, "Percentiles: {}", percentiles.join(" | "));
    let _ = writeln!(out, "{}", format_planned_line(planned_pulls, eval.planned_success_rate));
    let _ = writeln!(
        out,
        "Cost: mean {} | median {} | p90 {} | p99 {}",
        format_amount(eval.costs.mean),
        format_amount(eval.costs.p50),
        format_amount(eval.costs.p90),
        format_amount(eval.costs.p99)
    );
    if eval.acquisition.approximate {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "Approximate: {:.4}% of outcomes lie past the computed range",
                eval.acquisition.omitted_mass * 100.0
            )
            .yellow()
        );
    }
    out.push_str(&format_histogram(&stats.histogram));
    out
}

/// One bar per bin, scaled so the tallest bin spans the full width.
pub fn format_histogram(bins: &[HistogramBin]) -> String {
    let peak = bins.iter().map(|b| b.percent).fold(0.0, f64::max);
    let mut out = String::new();
    for bin in bins {
        let len = if peak > 0.0 {
            ((bin.percent / peak) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let label = format!("{:>6}-{:<6}", bin.start, bin.end.saturating_sub(1));
        let _ = writeln!(out, "{} {:>6.2}% {}", label, bin.percent, "#".repeat(len).cyan());
    }
    out
}

pub fn format_analytic(result: &AnalyticResult, planned_pulls: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=== Closed-form estimate ===".bold());
    let _ = writeln!(out, "Effective rate: {:.4}% per pull", result.effective_rate_percent);
    if let Some(remaining) = result.remaining_pity {
        let _ = writeln!(
            out,
            "Pity: {} pulls remaining ({} cycles completed)",
            remaining, result.completed_cycles
        );
    }
    let _ = writeln!(out, "Expected pulls: {:.2}", result.expected);
    let _ = writeln!(
        out,
        "Median {} | p90 {} | p99 {}",
        result.median, result.p90, result.p99
    );
    if let (Some(first), Some(cycle)) = (result.first_cycle_success_rate, result.cycle_success_rate) {
        let _ = writeln!(
            out,
            "Success within current cycle: {:.2}% | per full cycle: {:.2}%",
            first, cycle
        );
    }
    let _ = writeln!(out, "{}", format_planned_line(planned_pulls, result.planned_success_rate));
    let _ = writeln!(
        out,
        "Cost: median {} | p90 {} | p99 {}",
        format_amount(result.costs.median),
        format_amount(result.costs.p90),
        format_amount(result.costs.p99)
    );
    out
}

pub fn format_feeling_line(target: f64, matched: Option<&FeelingMatch<'_>>) -> String {
    match matched {
        Some(FeelingMatch::Certain) => format!("{:.2}%: a sure thing.", target),
        Some(FeelingMatch::Closest(entry)) => format!(
            "{:.2}% feels like {} ({}%): {}",
            target,
            entry.event.italic(),
            entry.rate,
            entry.feeling
        ),
        None => format!("{:.2}%: no comparison available.", target),
    }
}

pub fn format_simulation_line(sim: &SimulationSummary, exact: &Evaluation) -> String {
    let stats = exact.stats();
    let mut out = format!(
        "Monte Carlo ({} runs): mean {:.2} vs exact {:.2} (diff {:+.2}) | planned {:.2}% vs exact {:.2}%",
        sim.runs,
        sim.mean,
        stats.mean,
        sim.mean - stats.mean,
        sim.planned_success_rate,
        exact.planned_success_rate
    );
    if sim.capped_runs > 0 {
        let _ = write!(out, " | {} runs hit the pull cap", sim.capped_runs);
    }
    out
}
