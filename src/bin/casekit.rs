//! Command-line front end for case directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casekit::{
    compute_layout, Case, CaseConfig, ComponentClass, ConfigureRequest, FileBackend,
    FileBackendConfig, FileLock, LayoutRequest, MachineSpec, SizeSpec, StaticDefaults,
    StaticTemplates, TemplateQuery,
};

#[derive(Parser, Debug)]
#[command(name = "casekit")]
#[command(about = "Inspect and configure case directories")]
struct Cli {
    /// Machine description (JSON); a generic 32-core machine if omitted
    #[arg(long, global = true)]
    machine: Option<PathBuf>,

    /// PE layout templates (JSON)
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a layout without touching any case
    Layout {
        /// Comma-separated component classes, e.g. CPL,ATM,OCN
        #[arg(long)]
        classes: String,
        /// Size specification: 64x2, 128, M, Mx2
        #[arg(long)]
        spec: Option<String>,
        #[arg(long, default_value = "")]
        grid: String,
        #[arg(long, default_value = "")]
        compset: String,
    },
    /// Create and configure a new case directory
    Create {
        root: PathBuf,
        #[arg(long)]
        compset: String,
        #[arg(long)]
        grid: String,
        #[arg(long)]
        classes: String,
        #[arg(long)]
        spec: Option<String>,
        /// Extra defaults merged over the built-in ones (JSON)
        #[arg(long)]
        defaults: Option<PathBuf>,
    },
    /// Print resolved values
    Query {
        root: PathBuf,
        /// Ids to print; every typed entry if empty
        ids: Vec<String>,
        /// Print unresolved text
        #[arg(long)]
        raw: bool,
    },
    /// Set values, as ID=VALUE pairs
    Set {
        root: PathBuf,
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Recompute the resource plan from stored layout keys
    Plan { root: PathBuf },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casekit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let machine = load_machine(cli.machine.as_deref())?;
    let templates = load_templates(cli.templates.as_deref())?;

    match cli.command {
        Commands::Layout {
            classes,
            spec,
            grid,
            compset,
        } => {
            let mut request = LayoutRequest::new(
                ComponentClass::parse_list(&classes)?,
                SizeSpec::parse(spec.as_deref())?,
            );
            request.query = TemplateQuery {
                grid,
                compset,
                machine: machine.name.clone(),
                compiler: machine.compiler.clone(),
                mpilib: machine.mpilib.clone(),
                mnemonic: None,
            };
            let plan = compute_layout(&request, &templates, &machine)?;
            print!("{}", plan.summary());
        }
        Commands::Create {
            root,
            compset,
            grid,
            classes,
            spec,
            defaults,
        } => {
            let mut stock = StaticDefaults::standard();
            if let Some(path) = defaults {
                let extra = StaticDefaults::from_json(&read(&path)?)?;
                for (kind, entries) in extra.stores {
                    for entry in entries {
                        stock.insert(kind, entry);
                    }
                }
            }

            let backend = Arc::new(FileBackend::new(FileBackendConfig::default())?);
            if backend_has_case(&root) {
                bail!("{} already holds a case", root.display());
            }
            fs::create_dir_all(&root).with_context(|| format!("create {}", root.display()))?;
            let _lock = FileLock::acquire(&root)?;

            let mut case = Case::create(&root, backend, CaseConfig::default())?;
            let mut txn = case.begin()?;
            let mut request = ConfigureRequest::new(compset, grid, ComponentClass::parse_list(&classes)?);
            request.size_spec = spec;
            let plan = txn.configure(&request, &stock, &templates, &machine)?;
            let written = txn.commit()?;
            println!("created {} ({written} stores)", root.display());
            print!("{}", plan.summary());
        }
        Commands::Query { root, ids, raw } => {
            let case = open(&root, CaseConfig::read_only())?;
            if ids.is_empty() {
                for (id, value) in case.iter() {
                    println!("{id} = {value}");
                }
            }
            for id in ids {
                let value = if raw {
                    case.get_raw(&id)
                } else {
                    case.get_string(&id)?
                };
                match value {
                    Some(v) => println!("{id} = {v}"),
                    None => println!("{id} is not defined"),
                }
            }
        }
        Commands::Set { root, pairs } => {
            let _lock = FileLock::acquire(&root)?;
            let mut case = open(&root, CaseConfig::default())?;
            let mut txn = case.begin()?;
            for pair in &pairs {
                let Some((id, value)) = pair.split_once('=') else {
                    bail!("expected ID=VALUE, got '{pair}'");
                };
                txn.set(id.trim(), value.trim())
                    .with_context(|| format!("setting {}", id.trim()))?;
            }
            let written = txn.commit()?;
            println!("updated {written} stores");
        }
        Commands::Plan { root } => {
            let case = open(&root, CaseConfig::read_only())?;
            let plan = case.resource_plan(&machine)?;
            print!("{}", plan.summary());
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn load_machine(path: Option<&Path>) -> Result<MachineSpec> {
    match path {
        Some(p) => Ok(MachineSpec::from_json(&read(p)?)?),
        None => Ok(MachineSpec::default()),
    }
}

fn load_templates(path: Option<&Path>) -> Result<StaticTemplates> {
    match path {
        Some(p) => Ok(StaticTemplates::from_json(&read(p)?)?),
        None => Ok(StaticTemplates::default()),
    }
}

fn backend_has_case(root: &Path) -> bool {
    root.join(casekit::StoreKind::Case.file_name()).exists()
}

fn open(root: &Path, config: CaseConfig) -> Result<Case> {
    let backend = Arc::new(FileBackend::new(FileBackendConfig::default())?);
    Case::open(root, backend, config).with_context(|| format!("open case {}", root.display()))
}
