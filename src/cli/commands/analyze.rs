//! Budget evaluation over a netlist

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::analysis::SourceBudget;
use crate::cli::args::{GlobalOpts, ModeArg, OutputFormat};
use crate::cli::helpers::{
    effective_format, escape_csv, evaluate_budgets, format_current, format_efficiency,
    format_power, select_sources, trace_sink,
};
use crate::cli::netlist::NetlistDoc;
use crate::core::config::Config;
use crate::core::param::EvalMode;

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Netlist file describing the power tree
    pub netlist: PathBuf,

    /// Analyze a single source instead of every root
    #[arg(long, short = 's')]
    pub source: Option<u32>,

    /// Evaluation mode, overriding each source's declared mode
    #[arg(long, short = 'm', value_enum)]
    pub mode: Option<ModeArg>,

    /// RNG seed for a reproducible sampled pass
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: AnalyzeArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let doc = NetlistDoc::from_path(&args.netlist)?;
    let tree = doc.build(trace_sink(global)).into_diagnostic()?;
    let source_ids = select_sources(&tree, args.source)?;

    let mode = args.mode.map(EvalMode::from);
    let seed = args.seed.or(config.seed);
    let budgets = evaluate_budgets(&tree, &source_ids, mode, seed).into_diagnostic()?;

    match effective_format(global, &config) {
        OutputFormat::Auto => print_human(&budgets, global),
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&budgets).into_diagnostic()?);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&budgets).into_diagnostic()?);
        }
        OutputFormat::Csv => print_csv(&budgets),
        OutputFormat::Tsv => print_tsv(&budgets),
        OutputFormat::Md => print_md(&budgets),
    }

    Ok(())
}

fn print_human(budgets: &[SourceBudget], global: &GlobalOpts) {
    for budget in budgets {
        let marker = if budget.overload.is_some() {
            style("⚠").red().bold()
        } else {
            style("✓").green()
        };
        println!(
            "{} {} (id {}) at {:.3} V [{}]",
            marker,
            style(&budget.source_name).cyan(),
            budget.source_id,
            budget.vout,
            budget.mode
        );
        println!(
            "   Total Current: {}",
            format_current(budget.total_current)
        );
        println!(
            "   Efficiency: {}",
            format_efficiency(budget.efficiency)
        );
        println!("   Dissipation: {}", format_power(budget.power_dissipation));
        println!("   Output Power: {}", format_power(budget.output_power));
        println!("   Input Power: {}", format_power(budget.input_power));
        if let Some(overload) = &budget.overload {
            println!("   {} {}", style("Overload:").red().bold(), overload);
        }

        if !budget.branches.is_empty() && !global.quiet {
            println!();
            println!("   {}:", style("Branches").bold());
            for reading in &budget.branches {
                println!(
                    "     {} (id {}): {} at {:.3} V",
                    reading.name,
                    reading.id,
                    format_current(reading.current),
                    reading.node_voltage
                );
            }
        }
        println!();
    }
}

fn print_csv(budgets: &[SourceBudget]) {
    println!(
        "source_id,source_name,mode,vout_v,total_current_a,efficiency,dissipation_w,output_power_w,input_power_w,overload"
    );
    for budget in budgets {
        println!(
            "{},{},{},{:.6},{:.6},{},{:.6},{:.6},{:.6},{}",
            budget.source_id,
            escape_csv(&budget.source_name),
            budget.mode,
            budget.vout,
            budget.total_current,
            budget
                .efficiency
                .map(|e| format!("{:.6}", e))
                .unwrap_or_default(),
            budget.power_dissipation,
            budget.output_power,
            budget.input_power,
            if budget.overload.is_some() { "yes" } else { "no" }
        );
    }
}

fn print_tsv(budgets: &[SourceBudget]) {
    for budget in budgets {
        println!(
            "{}\t{}\t{}\t{:.6}\t{:.6}\t{}\t{:.6}\t{}",
            budget.source_id,
            budget.source_name,
            budget.mode,
            budget.vout,
            budget.total_current,
            budget
                .efficiency
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "-".to_string()),
            budget.power_dissipation,
            if budget.overload.is_some() {
                "overload"
            } else {
                "ok"
            }
        );
    }
}

fn print_md(budgets: &[SourceBudget]) {
    let mut builder = Builder::default();
    builder.push_record([
        "ID",
        "Source",
        "Mode",
        "Vout (V)",
        "Total (A)",
        "Efficiency",
        "Dissipation (W)",
        "Status",
    ]);

    for budget in budgets {
        builder.push_record([
            budget.source_id.to_string(),
            budget.source_name.clone(),
            budget.mode.to_string(),
            format!("{:.3}", budget.vout),
            format!("{:.6}", budget.total_current),
            budget
                .efficiency
                .map(|e| format!("{:.4}", e))
                .unwrap_or_else(|| "-".to_string()),
            format!("{:.6}", budget.power_dissipation),
            if budget.overload.is_some() {
                "overload".to_string()
            } else {
                "ok".to_string()
            },
        ]);
    }

    let table = builder.build().with(Style::markdown()).to_string();
    println!("{}", table);
}
