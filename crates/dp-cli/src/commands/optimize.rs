//! Implementation of the `dp optimize` command.
//!
//! Inspects cache usage, per-session spend, and the project long tail and
//! prints actionable recommendations.

use anyhow::Result;

use dp_core::cache_hit_ratio;
use dp_db::Database;

use super::util::{format_cost, project_label};

/// Cache ratio below which we nudge toward longer-lived sessions.
const CACHE_RATIO_TARGET: f64 = 80.0;

/// Cost per session above which usage looks heavyweight.
const COST_PER_SESSION_TARGET: f64 = 1.0;

/// Projects at or under this session count count as long-tail.
const LONG_TAIL_SESSIONS: i64 = 2;

#[allow(clippy::cast_precision_loss)]
pub fn run(db: &Database) -> Result<()> {
    let totals = db.totals()?;
    if totals.sessions == 0 {
        println!("Nothing to analyze yet. Run 'dp sync' first.");
        return Ok(());
    }

    println!("OPTIMIZATION REPORT");
    println!();

    let mut recommendations = 0;

    match cache_hit_ratio(totals.cache_read_tokens, totals.cache_creation_tokens) {
        Some(ratio) if ratio < CACHE_RATIO_TARGET => {
            recommendations += 1;
            println!(
                "  • Cache hit ratio is {ratio:.1}% (target {CACHE_RATIO_TARGET:.0}%). Longer \
                 sessions in the same project reuse cached context and cut input cost."
            );
        }
        Some(ratio) => {
            println!("  ✓ Cache hit ratio is {ratio:.1}% — cache use looks healthy.");
        }
        None => {
            println!("  • No cache traffic recorded yet.");
        }
    }

    let cost_per_session = totals.total_cost / totals.sessions as f64;
    if cost_per_session > COST_PER_SESSION_TARGET {
        recommendations += 1;
        println!(
            "  • Average cost per session is {} (target under {}). Consider smaller, more \
             focused prompts.",
            format_cost(cost_per_session),
            format_cost(COST_PER_SESSION_TARGET)
        );
    } else {
        println!(
            "  ✓ Average cost per session is {}.",
            format_cost(cost_per_session)
        );
    }

    let long_tail: Vec<_> = db
        .list_projects()?
        .into_iter()
        .filter(|p| p.session_count <= LONG_TAIL_SESSIONS && p.total_cost > 0.0)
        .collect();
    if long_tail.is_empty() {
        println!("  ✓ No long-tail project spend.");
    } else {
        recommendations += 1;
        let tail_cost: f64 = long_tail.iter().map(|p| p.total_cost).sum();
        let names: Vec<&str> = long_tail
            .iter()
            .take(5)
            .map(|p| project_label(&p.path))
            .collect();
        println!(
            "  • {} briefly-touched projects account for {} ({}). One-off experiments add up.",
            long_tail.len(),
            format_cost(tail_cost),
            names.join(", ")
        );
    }

    println!();
    if recommendations == 0 {
        println!("No changes recommended.");
    } else {
        println!("{recommendations} recommendation(s).");
    }

    Ok(())
}
