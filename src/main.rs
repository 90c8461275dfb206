use anyhow::{anyhow, bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vatio::backend::{self, BackendKind};
use vatio::cli::{BadgeArgs, Cli, Commands, CompareArgs, ProfileArgs};
use vatio::config::Settings;
use vatio::results::ProfileResults;
use vatio::tracer::{EnergyTracer, Granularity};
use vatio::{badge, compare, report, runner};

/// Initialize tracing subscriber; diagnostics always go to stderr
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn profile(args: ProfileArgs) -> Result<i32> {
    let settings = Settings::load()?;
    settings
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let kind = match args.backend {
        Some(kind) => kind,
        None => settings.backend.parse::<BackendKind>()?,
    };
    let energy_backend = backend::select(kind.as_str(), &settings.backend_settings())?;
    if !energy_backend.is_available() {
        bail!("Backend '{}' is not available on this system", kind);
    }

    let granularity = if args.line {
        Granularity::Line
    } else {
        Granularity::Function
    };
    let tracer = EnergyTracer::new(energy_backend)
        .with_filter(settings.ignore_filter()?)
        .with_granularity(granularity);

    let outcome = runner::run_command(tracer, &args.command)?;
    let results = &outcome.results;

    if !args.quiet {
        print!("{}", report::render_table(results));
    }

    if let Some(path) = &args.output {
        results.save(path)?;
        if !args.quiet {
            println!("Results saved to: {}", path.display());
        }
    }

    if !outcome.status.success() {
        eprintln!("Command exited with {}", outcome.status);
        return Ok(1);
    }

    if results.exceeds_budget(settings.energy_budget_mj) {
        if !args.quiet {
            eprintln!(
                "Energy budget exceeded: {:.1} mJ > {} mJ",
                results.summary.total_energy_mj, settings.energy_budget_mj
            );
        }
        return Ok(1);
    }

    Ok(0)
}

fn compare_runs(args: CompareArgs) -> Result<i32> {
    if !args.threshold.is_finite() || args.threshold < 0.0 {
        bail!(
            "Invalid value for --threshold: {} (must be >= 0)",
            args.threshold
        );
    }

    let old = ProfileResults::load(&args.old)?;
    let new = ProfileResults::load(&args.new)?;
    let comparison = compare::compare_with_threshold(&old, &new, args.threshold);

    print!("{}", report::render_comparison(&comparison));

    Ok(if comparison.has_regressions() { 1 } else { 0 })
}

fn make_badge(args: BadgeArgs) -> Result<i32> {
    let results = ProfileResults::load(&args.results)?;

    match &args.output {
        Some(path) => {
            badge::write_badge(&results, args.target, path, args.status_only)?;
            println!("Badge saved to: {}", path.display());
        }
        None if args.status_only => print!("{}", badge::status_badge(&results, args.target)),
        None => print!("{}", badge::energy_badge(&results, args.target)),
    }

    Ok(if results.exceeds_budget(args.target) { 1 } else { 0 })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.debug);

    let exit_code = match cli.command {
        Commands::Profile(args) => profile(args)?,
        Commands::Compare(args) => compare_runs(args)?,
        Commands::Badge(args) => make_badge(args)?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}
