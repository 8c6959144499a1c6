use clap::{Args, Parser, Subcommand};
use lentil::common::*;
use lentil::simulate::{simulate_reference, SimRefArgs};
use lentil::{build_training_set, TrainingSetArgs};
use matrix_util::common_io::write_types;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Latent-space ENsemble Training sets for cell-state deconvoLution\n\
		  Synthesize bulk expression profiles from a single-cell reference\n\
		  by weighting cells with random Gaussian mixtures over the latent space."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Simulate a reference dataset and build a training set from it",
        long_about = "Build a synthetic training set in four stages: \n\
		      (1) Measure distances between cells in the latent space\n\
		      (2) Calibrate kernel bandwidths by nearest neighbours\n\
		      (3) Sample random Gaussian mixtures over the cells\n\
		      (4) Aggregate sampled cells into CPM bulk profiles.\n"
    )]
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    reference: SimRefArgs,

    #[command(flatten)]
    training: TrainingSetArgs,

    /// output header
    #[arg(long, short, required = true)]
    out: Box<str>,
}

fn run_simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    let sim = simulate_reference(&args.reference)?;

    let training_set = build_training_set(&sim.counts, &sim.latent, &args.training)?;
    let sigma = training_set.sigma_bounds();
    info!(
        "{} examples over {} cells and {} genes, sigma in [{:.4}, {:.4}]",
        training_set.num_examples(),
        training_set.num_cells(),
        training_set.num_genes(),
        sigma.min,
        sigma.max
    );

    training_set.write_tsv(&args.out)?;

    let cell_type_file = format!("{}.cell_types.gz", args.out);
    write_types(&sim.cell_types, &cell_type_file)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match &cli.commands {
        Commands::Simulate(args) => {
            run_simulate(args)?;
        }
    }

    info!("Done");
    Ok(())
}
