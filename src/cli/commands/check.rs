//! Rating check with a pass/fail exit status

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::args::GlobalOpts;
use crate::cli::helpers::{format_current, select_sources, trace_sink};
use crate::cli::netlist::NetlistDoc;

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Netlist file describing the power tree
    pub netlist: PathBuf,

    /// Check a single source instead of every root
    #[arg(long, short = 's')]
    pub source: Option<u32>,
}

pub fn run(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let doc = NetlistDoc::from_path(&args.netlist)?;
    let tree = doc.build(trace_sink(global)).into_diagnostic()?;
    let source_ids = select_sources(&tree, args.source)?;

    let mut overloaded = 0_usize;
    for id in &source_ids {
        let budget = tree.nominal_budget(*id).into_diagnostic()?;
        match &budget.overload {
            Some(overload) => {
                overloaded += 1;
                println!(
                    "{} {} (id {}): {}",
                    style("✗").red(),
                    style(&budget.source_name).cyan(),
                    budget.source_id,
                    overload
                );
            }
            None => {
                if !global.quiet {
                    println!(
                        "{} {} (id {}): {} demanded, within rating",
                        style("✓").green(),
                        style(&budget.source_name).cyan(),
                        budget.source_id,
                        format_current(budget.total_current)
                    );
                }
            }
        }
    }

    if overloaded > 0 {
        if overloaded == 1 {
            Err(miette::miette!("Check failed: 1 source is overloaded"))
        } else {
            Err(miette::miette!(
                "Check failed: {} sources are overloaded",
                overloaded
            ))
        }
    } else {
        if !global.quiet {
            println!();
        }
        println!(
            "{} All sources within rating",
            style("✓").green().bold()
        );
        Ok(())
    }
}
