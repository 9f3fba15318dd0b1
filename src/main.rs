use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cointax::asset::import_registry;
use cointax::config::Config;
use cointax::consolidate::consolidate;
use cointax::engine::execute_orderbook;
use cointax::ingest::read_orderbook;
use cointax::registry::LotRegistry;
use cointax::report::{write_pool_registry, write_report, ReportKind};
use cointax::wash::execute_washes;

/// Computes capital-gains tax lots for a crypto orderbook, with U.S. wash-sale
/// adjustments, and writes sales-report / Form 8949 / pool-registry CSVs.
#[derive(Debug, Parser)]
#[command(name = "cointax", version, about)]
struct Cli {
    /// Path to the orderbook CSV.
    #[arg(long)]
    orderbook: PathBuf,

    /// Path to the asset-registry YAML document.
    #[arg(long)]
    assets: PathBuf,

    /// Path to the configuration YAML document.
    #[arg(long)]
    config: PathBuf,

    /// Directory reports are written into (created if missing).
    #[arg(long, default_value = "reports")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let config_yaml = fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config {}", cli.config.display()))?;
    let config = Config::from_yaml(&config_yaml).context("parsing config")?;

    let assets_yaml = fs::read_to_string(&cli.assets)
        .with_context(|| format!("reading asset registry {}", cli.assets.display()))?;
    let asset_registry = import_registry(&assets_yaml).context("parsing asset registry")?;

    let orderbook_file = fs::File::open(&cli.orderbook)
        .with_context(|| format!("opening orderbook {}", cli.orderbook.display()))?;
    let mut orders = read_orderbook(orderbook_file, &asset_registry, &config.default_fiat)
        .context("reading orderbook")?;

    orders.sort_by_key(|order| order.date);
    orders.retain(|order| config.in_range(order.date));

    let mut registry = LotRegistry::new();
    execute_orderbook(&orders, &mut registry, config.ordering_strategy)
        .context("executing orderbook")?;

    if config.wash_rule {
        execute_washes(&mut registry).context("resolving wash sales")?;
    }

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("creating output directory {}", cli.output_dir.display()))?;

    // C8/C9: reports are projected from the consolidated registry (one
    // synthetic lot per asset/sale-day/wash/term group), not the raw closed
    // lots, per §2's "C8/C9 project for export" data flow. The pool-registry
    // export below stays un-consolidated so a later run can resume from it.
    let consolidated = consolidate(&registry).context("consolidating lots for export")?;

    let years: Vec<Option<i32>> = if config.filing_years.is_empty() {
        vec![None]
    } else {
        config.filing_years.iter().map(|&year| Some(year)).collect()
    };

    for year in years {
        let year_closed = match year {
            Some(year) => consolidated.closed().by_year(year, true),
            None => consolidated.closed(),
        };
        let rows: Vec<_> = year_closed.iter().cloned().collect();
        let suffix = year.map(|year| format!("_{year}")).unwrap_or_default();

        let sales_report_path = cli.output_dir.join(format!("sales_report{suffix}.csv"));
        write_report(
            &rows,
            ReportKind::SalesReport,
            fs::File::create(&sales_report_path)
                .with_context(|| format!("creating {}", sales_report_path.display()))?,
        )
        .context("writing sales report")?;

        let form_8949_path = cli.output_dir.join(format!("form_8949{suffix}.csv"));
        write_report(
            &rows,
            ReportKind::Form8949,
            fs::File::create(&form_8949_path)
                .with_context(|| format!("creating {}", form_8949_path.display()))?,
        )
        .context("writing form 8949")?;
    }

    let pool_registry_path = cli.output_dir.join("pool_registry.csv");
    let all_lots: Vec<_> = registry.iter().cloned().collect();
    write_pool_registry(
        &all_lots,
        fs::File::create(&pool_registry_path)
            .with_context(|| format!("creating {}", pool_registry_path.display()))?,
    )
    .context("writing pool registry")?;

    println!(
        "processed {} orders -> {} lots ({} closed), net gain {}",
        orders.len(),
        registry.len(),
        registry.closed().len(),
        registry.closed().net_gain()
    );
    println!("reports written to {}", cli.output_dir.display());

    Ok(())
}
