use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use hl7issues::enrich::{self, SpecRegistry, WorkgroupRegistry};
use hl7issues::report;
use hl7issues::staff::DEFAULT_STAFF_CONFIG;
use hl7issues::RealmStore;

#[derive(Parser)]
#[command(
    name = "hl7issues",
    about = "Resolution metrics and backlog reports for HL7 JIRA exports"
)]
struct Cli {
    /// Realm store path (default: ~/.hl7issues/realms.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the issue resolution summary report
    Analyze {
        /// Issue export (CSV)
        #[arg(short, long)]
        input: PathBuf,
        /// Report destination (Markdown)
        #[arg(short, long)]
        output: PathBuf,
        /// Analysis periods (e.g. 2024, 2024T1, 2024-2025); the first is primary
        #[arg(short, long, required = true, num_args = 1..)]
        periods: Vec<String>,
        /// Staff roster excluded from reporter leaderboards (YAML)
        #[arg(short, long, default_value = DEFAULT_STAFF_CONFIG)]
        staff_config: PathBuf,
    },
    /// Render the backlog age report for unresolved issues
    Backlog {
        /// Issue export (CSV)
        #[arg(short, long)]
        input: PathBuf,
        /// Report destination (Markdown)
        #[arg(short, long)]
        output: PathBuf,
        /// Measure ages as of this date (YYYY-MM-DD); defaults to the newest date in the data
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Add display names, realms, and derived columns to an issue export
    Enhance {
        /// Issue export (CSV)
        #[arg(short, long)]
        input: PathBuf,
        /// Destination (default: <input>-enhanced.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Local copy of SPECS.json
        #[arg(long)]
        specs: PathBuf,
        /// Local copy of workgroups.json
        #[arg(long)]
        workgroups: Option<PathBuf>,
    },
    /// Inspect and maintain stored realm mappings
    Realms {
        #[command(subcommand)]
        action: RealmsAction,
    },
}

#[derive(Subcommand)]
enum RealmsAction {
    /// List all stored mappings
    List,
    /// Show the realm stored for a specification key
    Get { key: String },
    /// Store a realm for a specification key
    Set {
        key: String,
        realm: String,
        /// Specification URL to store alongside (also mapped to the realm)
        #[arg(long)]
        url: Option<String>,
    },
    /// Import a legacy key,url,realm CSV file
    Import { csv: PathBuf },
    /// Export all mappings as a key,url,realm CSV file
    Export { csv: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            periods,
            staff_config,
        } => handle_analyze(&input, &output, &periods, &staff_config)?,
        Commands::Backlog {
            input,
            output,
            as_of,
        } => handle_backlog(&input, &output, as_of.as_deref())?,
        Commands::Enhance {
            input,
            output,
            specs,
            workgroups,
        } => {
            let mut store = open_store(cli.db.as_deref())?;
            handle_enhance(&input, output, &specs, workgroups.as_deref(), &mut store)?;
        }
        Commands::Realms { action } => {
            let mut store = open_store(cli.db.as_deref())?;
            handle_realms(&mut store, action)?;
        }
    }

    Ok(())
}

fn open_store(path: Option<&Path>) -> anyhow::Result<RealmStore> {
    let store = match path {
        Some(path) => RealmStore::open_at(path)?,
        None => RealmStore::open()?,
    };
    Ok(store)
}

fn handle_analyze(
    input: &Path,
    output: &Path,
    periods: &[String],
    staff_config: &Path,
) -> anyhow::Result<()> {
    let summary = report::analyze_file(input, output, periods, staff_config)?;

    println!(
        "Analyzed {} issues for {}",
        summary.issues,
        summary.periods.join(", ")
    );
    if summary.date_errors > 0 {
        println!("  {} issues with unparseable dates", summary.date_errors);
    }
    println!("Report written to {}", output.display());
    Ok(())
}

fn handle_backlog(input: &Path, output: &Path, as_of: Option<&str>) -> anyhow::Result<()> {
    let aging = report::backlog_file(input, output, as_of)?;

    println!("Backlog: {} unresolved issues", aging.backlog_count());
    if let Some(stats) = &aging.overall {
        println!(
            "  Median age: {:.1} days, staleness {:.1} ({})",
            stats.median_age,
            stats.staleness_index,
            stats.category()
        );
    }
    println!("Report written to {}", output.display());
    Ok(())
}

fn handle_enhance(
    input: &Path,
    output: Option<PathBuf>,
    specs: &Path,
    workgroups: Option<&Path>,
    store: &mut RealmStore,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| enrich::default_output_path(input));
    let specs = SpecRegistry::load(specs)?;
    let workgroups = workgroups.map(WorkgroupRegistry::load).transpose()?;

    let summary = enrich::enhance_file(input, &output, &specs, workgroups.as_ref(), store)?;

    println!("Enhanced {} issues", summary.rows);
    println!("  Corrections:   {}", summary.corrections);
    println!("  Display names: {}", summary.display_names);
    println!("  Realms:        {}", summary.realms);
    println!("  WG names:      {}", summary.wg_names);
    println!("  New mappings:  {}", summary.mappings_saved);
    if !summary.unresolved_specs.is_empty() {
        println!(
            "  No realm for {} specification(s): {}",
            summary.unresolved_specs.len(),
            summary.unresolved_specs.join(", ")
        );
    }
    println!("Written to {}", output.display());
    Ok(())
}

fn handle_realms(store: &mut RealmStore, action: RealmsAction) -> anyhow::Result<()> {
    match action {
        RealmsAction::List => {
            let specs = store.spec_mappings();
            let urls = store.url_mappings();
            if specs.is_empty() && urls.is_empty() {
                println!("No realm mappings stored.");
                return Ok(());
            }
            for m in specs {
                match &m.url {
                    Some(url) => println!("{} = {} ({url})", m.spec_key, m.realm),
                    None => println!("{} = {}", m.spec_key, m.realm),
                }
            }
            for (url, realm) in urls {
                println!("{url} = {realm}");
            }
        }
        RealmsAction::Get { key } => match store.lookup_spec(&key) {
            Some(realm) => println!("{key} = {realm}"),
            None => println!("{key} has no stored realm"),
        },
        RealmsAction::Set { key, realm, url } => {
            store.record_spec(&key, url.as_deref(), &realm);
            if let Some(url) = &url {
                store.record_url(url, &realm);
            }
            store.flush()?;
            println!("Stored: {key} = {realm}");
        }
        RealmsAction::Import { csv } => {
            let n = store
                .import_csv(&csv)
                .with_context(|| format!("importing {}", csv.display()))?;
            println!("Imported {n} mapping(s).");
        }
        RealmsAction::Export { csv } => {
            let n = store.export_csv(&csv)?;
            println!("Exported {n} mapping(s) to {}", csv.display());
        }
    }
    Ok(())
}
