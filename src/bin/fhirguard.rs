use clap::{Parser, Subcommand};
use octofhir_fhirguard::*;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fhirguard")]
#[command(about = "Compile FHIR terminology definitions and validate codes against them")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding extracted packages (overrides the configuration)
    #[arg(long, global = true)]
    package_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Terminology definition commands
    Metadata {
        #[command(subcommand)]
        command: MetadataCommands,
    },
    /// Local package commands
    Package {
        #[command(subcommand)]
        command: PackageCommands,
    },
}

#[derive(Subcommand)]
enum MetadataCommands {
    /// Resolve and compile the definitions of the given packages
    Generate {
        /// Packages to compile (directory names under the package directory)
        #[arg(required = true)]
        packages: Vec<String>,
        /// Packages used only to resolve references
        #[arg(short, long, num_args = 1..)]
        reference: Vec<String>,
        /// Output directory, replaced on every run
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum PackageCommands {
    /// List locally available packages
    List {
        /// Load each package and show its resource counts
        #[arg(short, long)]
        summary: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => GuardConfig::from_file(path)?,
        None => GuardConfig::default(),
    };
    if let Some(dir) = cli.package_dir {
        config = config.with_package_dir(dir);
    }

    match cli.command {
        Commands::Metadata {
            command:
                MetadataCommands::Generate {
                    packages,
                    reference,
                    output,
                },
        } => generate(config, &packages, &reference, &output),
        Commands::Package {
            command: PackageCommands::List { summary },
        } => list_packages(&config, summary),
    }
}

fn generate(
    config: GuardConfig,
    packages: &[String],
    references: &[String],
    output: &PathBuf,
) -> Result<()> {
    let mut resources = AvailableResources::new();
    let mut load = |names: &[String]| -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let package = PackageLoader::load(config.package_path(name))?;
            ids.push(package.id.clone());
            resources.add_package(package);
        }
        Ok(ids)
    };
    let targets = load(packages)?;
    let references = load(references)?;

    let manifest = DefinitionFactory::new(&resources, &targets, &references)
        .generate()?
        .write(output)?;

    println!(
        "✅ Wrote {} ValueSet and {} CodeSystem definitions to {}",
        manifest.valuesets.id.len(),
        manifest.codesystems.id.len(),
        output.display()
    );
    Ok(())
}

fn list_packages(config: &GuardConfig, summary: bool) -> Result<()> {
    if !config.package_dir.is_dir() {
        println!("No packages found in {}", config.package_dir.display());
        return Ok(());
    }

    let mut names: Vec<String> = fs::read_dir(&config.package_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join("package").join("package.json").exists())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    println!("📦 Packages in {}:", config.package_dir.display());
    if summary {
        for (name, package) in PackageLoader::new(config.clone()).summarize(&names)? {
            println!(
                "  - {name} ({}): {} CodeSystems, {} ValueSets",
                package.package_id, package.code_systems, package.value_sets
            );
        }
    } else {
        for name in &names {
            println!("  - {name}");
        }
    }
    println!("\nTotal: {} packages", names.len());
    Ok(())
}
