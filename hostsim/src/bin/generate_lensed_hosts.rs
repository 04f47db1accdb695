//! Render lensed host-galaxy stamps for every system in a lens catalog
//!
//! Reads `<datadir>/<type>_lens.csv` and `<datadir>/<type>_hosts.csv`, renders
//! the lensed bulge and disk of each system and writes one FITS stamp per
//! component under `<outdir>/<type>_lensed_{bulges,disks}/`.
//!
//! Systems that fail (bad catalog values, zero flux, lens model errors) are
//! logged and skipped; the exit status only reflects fatal configuration or
//! catalog I/O errors.
//!
//! Usage:
//! ```text
//! cargo run --release --bin generate_lensed_hosts -- sne --datadir truth_tables --outdir outputs
//! ```

use anyhow::Context;
use clap::Parser;
use hostsim::catalog::{HostCatalog, ObjectType};
use hostsim::render::LensedImageSynthesizer;
use hostsim::shared_args::SharedSimulationArgs;
use hostsim::sims::{run_batch, BatchConfig, OffsetPolicy};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate lensed host-galaxy FITS stamps")]
struct GenerateArgs {
    /// Transient class whose hosts are rendered
    #[arg(value_enum)]
    object_type: ObjectType,

    /// Directory holding the lens and host CSV tables
    #[arg(long, default_value = "truth_tables")]
    datadir: PathBuf,

    /// Output directory for the stamps
    #[arg(long, default_value = "outputs")]
    outdir: PathBuf,

    /// Random seed for host offsets
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// When to offset hosts from their catalog position (auto: supernova hosts only)
    #[arg(long, value_enum, default_value_t = OffsetPolicy::Auto)]
    offset_policy: OffsetPolicy,

    /// Process systems serially instead of in parallel
    #[arg(long, default_value_t = false)]
    serial: bool,

    #[command(flatten)]
    shared: SharedSimulationArgs,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = GenerateArgs::parse();

    let grid = args.shared.build_grid()?;
    let oracle = args.shared.build_oracle()?;
    let config = BatchConfig {
        object_type: args.object_type,
        output_dir: args.outdir.clone(),
        seed: args.seed,
        offset_policy: args.offset_policy,
        serial: args.serial,
    };

    let catalog = HostCatalog::load(&args.datadir, args.object_type).with_context(|| {
        format!(
            "loading {} catalog from {}",
            args.object_type,
            args.datadir.display()
        )
    })?;
    info!(
        "Loaded {} systems ({} rejected) on a {}x{} grid at {}\"/pix",
        catalog.len(),
        catalog.rejected().len(),
        grid.side(),
        grid.side(),
        grid.pixel_size()
    );

    let pb = ProgressBar::new(catalog.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ETA: {eta}")?
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );
    pb.set_message(format!("Rendering {} hosts", args.object_type));

    let start = Instant::now();
    let synth = LensedImageSynthesizer::new(&grid, &oracle);
    let summary = run_batch(&catalog, &synth, &config, &pb);
    pb.finish_with_message("Rendering complete");

    println!(
        "{} systems written to {} in {:.1}s ({} skipped, {} rejected at load)",
        summary.processed(),
        args.outdir.display(),
        start.elapsed().as_secs_f64(),
        summary.skipped(),
        summary.rejected_at_load
    );

    Ok(())
}
