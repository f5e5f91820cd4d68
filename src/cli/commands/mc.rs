//! Monte Carlo analysis over a netlist

use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::analysis::{MonteCarlo, MonteCarloSummary, SampleStats};
use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::cli::helpers::{
    effective_format, escape_csv, format_current, format_power, select_sources, trace_sink,
};
use crate::cli::netlist::NetlistDoc;
use crate::core::config::Config;

#[derive(clap::Args, Debug)]
pub struct McArgs {
    /// Netlist file describing the power tree
    pub netlist: PathBuf,

    /// Analyze a single source instead of every root
    #[arg(long, short = 's')]
    pub source: Option<u32>,

    /// Number of passes per source
    #[arg(long, short = 'n')]
    pub iterations: Option<u32>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: McArgs, global: &GlobalOpts) -> Result<()> {
    let config = Config::load();
    let doc = NetlistDoc::from_path(&args.netlist)?;
    let tree = doc.build(trace_sink(global)).into_diagnostic()?;
    let source_ids = select_sources(&tree, args.source)?;

    let iterations = args.iterations.unwrap_or_else(|| config.iterations());
    let mut mc = MonteCarlo::new(iterations);
    if let Some(seed) = args.seed.or(config.seed) {
        mc = mc.with_seed(seed);
    }

    let format = effective_format(global, &config);
    if format == OutputFormat::Auto && !global.quiet {
        println!(
            "{} Running {} passes per source over {} source(s)...",
            style("⚙").cyan(),
            iterations,
            source_ids.len()
        );
        println!();
    }

    let mut summaries = Vec::with_capacity(source_ids.len());
    for id in &source_ids {
        summaries.push(mc.run(&tree, *id).into_diagnostic()?);
    }

    match format {
        OutputFormat::Auto => print_human(&summaries),
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&summaries).into_diagnostic()?);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&summaries).into_diagnostic()?
            );
        }
        OutputFormat::Csv => print_csv(&summaries),
        OutputFormat::Tsv => print_tsv(&summaries),
        OutputFormat::Md => print_md(&summaries),
    }

    Ok(())
}

fn print_human(summaries: &[MonteCarloSummary]) {
    for summary in summaries {
        let marker = if summary.within_rating_percent >= 100.0 {
            style("✓").green()
        } else if summary.within_rating_percent >= 95.0 {
            style("⚠").yellow()
        } else {
            style("⚠").red()
        };
        println!(
            "{} {} (id {}): {} iterations",
            marker,
            style(&summary.source_name).cyan(),
            summary.source_id,
            summary.iterations
        );
        println!();
        println!("   {}:", style("Total Current").bold());
        print_stats(&summary.total_current, format_current);
        println!();
        println!("   {}:", style("Dissipation").bold());
        print_stats(&summary.power_dissipation, format_power);
        println!();
        println!("   Within Rating: {:.2}%", summary.within_rating_percent);
        println!();
    }
}

fn print_stats(stats: &SampleStats, unit: fn(f64) -> String) {
    println!("     Mean: {}", unit(stats.mean));
    println!("     Std Dev: {}", unit(stats.std_dev));
    println!("     Range: {} to {}", unit(stats.min), unit(stats.max));
    println!(
        "     95% CI: {} to {}",
        unit(stats.percentile_2_5),
        unit(stats.percentile_97_5)
    );
}

fn print_csv(summaries: &[MonteCarloSummary]) {
    println!(
        "source_id,source_name,iterations,current_mean_a,current_std_a,current_min_a,current_max_a,current_p2_5_a,current_p97_5_a,dissipation_mean_w,dissipation_std_w,within_rating_pct"
    );
    for summary in summaries {
        let current = &summary.total_current;
        let dissipation = &summary.power_dissipation;
        println!(
            "{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.2}",
            summary.source_id,
            escape_csv(&summary.source_name),
            summary.iterations,
            current.mean,
            current.std_dev,
            current.min,
            current.max,
            current.percentile_2_5,
            current.percentile_97_5,
            dissipation.mean,
            dissipation.std_dev,
            summary.within_rating_percent
        );
    }
}

fn print_tsv(summaries: &[MonteCarloSummary]) {
    for summary in summaries {
        let current = &summary.total_current;
        println!(
            "{}\t{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.2}",
            summary.source_id,
            summary.source_name,
            summary.iterations,
            current.mean,
            current.std_dev,
            current.percentile_2_5,
            current.percentile_97_5,
            summary.within_rating_percent
        );
    }
}

fn print_md(summaries: &[MonteCarloSummary]) {
    let mut builder = Builder::default();
    builder.push_record([
        "ID",
        "Source",
        "Iterations",
        "Mean (A)",
        "Std Dev (A)",
        "95% CI (A)",
        "Within Rating",
    ]);

    for summary in summaries {
        let current = &summary.total_current;
        builder.push_record([
            summary.source_id.to_string(),
            summary.source_name.clone(),
            summary.iterations.to_string(),
            format!("{:.6}", current.mean),
            format!("{:.6}", current.std_dev),
            format!("{:.6} to {:.6}", current.percentile_2_5, current.percentile_97_5),
            format!("{:.2}%", summary.within_rating_percent),
        ]);
    }

    let table = builder.build().with(Style::markdown()).to_string();
    println!("{}", table);
}
