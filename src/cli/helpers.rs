//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use std::sync::Arc;

use clap::ValueEnum;
use console::style;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analysis::SourceBudget;
use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::core::config::Config;
use crate::core::error::ModelError;
use crate::core::param::EvalMode;
use crate::core::trace::{NoopTrace, TraceSink};
use crate::model::tree::PowerTree;

/// Format a current with an auto-selected scale.
///
/// Values at or above 1 A stay in amps; smaller values drop to mA or uA so
/// table columns stay readable.
pub fn format_current(amps: f64) -> String {
    let magnitude = amps.abs();
    if magnitude >= 1.0 {
        format!("{:.3} A", amps)
    } else if magnitude >= 1.0e-3 {
        format!("{:.3} mA", amps * 1.0e3)
    } else {
        format!("{:.1} uA", amps * 1.0e6)
    }
}

/// Format a power with an auto-selected scale
pub fn format_power(watts: f64) -> String {
    let magnitude = watts.abs();
    if magnitude >= 1.0 {
        format!("{:.3} W", watts)
    } else if magnitude >= 1.0e-3 {
        format!("{:.3} mW", watts * 1.0e3)
    } else {
        format!("{:.1} uW", watts * 1.0e6)
    }
}

/// Format an efficiency fraction as a percentage, or "n/a" when undefined
pub fn format_efficiency(efficiency: Option<f64>) -> String {
    match efficiency {
        Some(value) => format!("{:.2}%", value * 100.0),
        None => "n/a".to_string(),
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Pick the trace sink for a command invocation.
///
/// Verbose runs stream structural and pass events to stderr; everything else
/// gets the silent default.
pub fn trace_sink(global: &GlobalOpts) -> Arc<dyn TraceSink> {
    if global.verbose {
        Arc::new(ConsoleTrace)
    } else {
        Arc::new(NoopTrace)
    }
}

/// Resolve the output format, falling back to the configured default when
/// the command line left it on auto
pub fn effective_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    if global.format != OutputFormat::Auto {
        return global.format;
    }
    config
        .default_format
        .as_deref()
        .and_then(|name| OutputFormat::from_str(name, true).ok())
        .unwrap_or(OutputFormat::Auto)
}

/// Resolve which sources a command should evaluate.
///
/// With an explicit id the id must exist; without one every root in the tree
/// is evaluated, in insertion order.
pub fn select_sources(tree: &PowerTree, requested: Option<u32>) -> miette::Result<Vec<u32>> {
    match requested {
        Some(id) => {
            if tree.source(id).is_none() {
                return Err(miette::miette!("No source with id {} in the netlist", id));
            }
            Ok(vec![id])
        }
        None => {
            let ids = tree.source_ids().to_vec();
            if ids.is_empty() {
                return Err(miette::miette!("The netlist contains no sources"));
            }
            Ok(ids)
        }
    }
}

/// Run one budget pass per source, sharing a single RNG across the run so a
/// seeded invocation is reproducible end to end.
///
/// Without an explicit mode each source is evaluated under the mode it was
/// declared with.
pub fn evaluate_budgets(
    tree: &PowerTree,
    source_ids: &[u32],
    mode: Option<EvalMode>,
    seed: Option<u64>,
) -> Result<Vec<SourceBudget>, ModelError> {
    fn collect<R: Rng>(
        tree: &PowerTree,
        source_ids: &[u32],
        mode: Option<EvalMode>,
        rng: &mut R,
    ) -> Result<Vec<SourceBudget>, ModelError> {
        source_ids
            .iter()
            .map(|id| {
                let mode = mode.unwrap_or_else(|| tree.declared_mode(*id));
                tree.budget(*id, mode, rng)
            })
            .collect()
    }

    match seed {
        Some(seed) => collect(tree, source_ids, mode, &mut StdRng::seed_from_u64(seed)),
        None => collect(tree, source_ids, mode, &mut rand::rng()),
    }
}

/// Trace sink that narrates events to stderr
pub struct ConsoleTrace;

impl TraceSink for ConsoleTrace {
    fn source_added(&self, id: u32, name: &str) {
        eprintln!("{} source {} (id {})", style("+").green(), name, id);
    }

    fn load_added(&self, parent_id: u32, id: u32, name: &str) {
        eprintln!(
            "{} {} (id {}) under {}",
            style("+").green(),
            name,
            id,
            parent_id
        );
    }

    fn pass_completed(&self, source_id: u32, mode: EvalMode, total_current: f64) {
        eprintln!(
            "{} pass for source {} ({}): {}",
            style("·").dim(),
            source_id,
            mode,
            format_current(total_current)
        );
    }
}
