use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{info, LevelFilter};
use serde::Serialize;
use simple_logger::SimpleLogger;

use halogrid::geometry::Background;
use halogrid::index_space::IndexSpace;
use halogrid::kernel::{KernelConfig, ProblemData};
use halogrid::mask::MaskSolid;
use halogrid::{launch, Config, Context, Error, Grid, Topology, Vector};

/// Computes the real-space height of every cell of a terrain-following
/// grid whose layers thicken upward, over a domain whose surface is a
/// tilted plane, and writes each rank's result to a CBOR file.
#[derive(Debug, Parser)]
#[clap(version = "0.1")]
struct Opts {
    /// Number of ranks, laid out along x
    #[clap(short = 'n', long, default_value = "2")]
    ranks: usize,

    #[clap(long, default_value = "16")]
    nx: i64,

    #[clap(long, default_value = "8")]
    ny: i64,

    #[clap(long, default_value = "10")]
    nz: i64,

    /// Vertical refinement ratio (a power of two)
    #[clap(long, default_value = "1")]
    refine_z: u32,

    /// Output file prefix; rank r writes <prefix>.<r>.cbor
    #[clap(short, long, default_value = "real_space_z")]
    output: PathBuf,
}

#[derive(Serialize)]
struct Output {
    rank: usize,
    subgrids: Vec<((i64, i64, i64), (i64, i64, i64))>,
    num_ghost: i64,
    data: Vec<f64>,
}

fn run(context: Arc<Context>, opts: &Opts) -> Result<(), Error> {
    let config = Config {
        background: Background {
            origin: (0.0, 0.0, -50.0),
            spacing: (10.0, 10.0, 5.0),
            extent: (opts.nx, opts.ny, opts.nz),
        },
        topology: Topology::new(opts.ranks, 1, 1),
        blocks: (1, 1, 1),
        refinement: (1, 1, opts.refine_z),
    };
    let grid = Grid::new(context.clone(), &config)?;
    let kernel_config = KernelConfig::RealSpaceZ;
    let mut kernel = kernel_config.configure(&grid)?;

    let mut z_mult = Vector::new(&grid, 1, 1)?;
    z_mult.fill_constant(1.0);

    for (s, data) in z_mult.subvectors_mut() {
        for index in s.interior().iter() {
            data[s.view().offset(index)] = 1.0 + index.2 as f64 / opts.nz as f64;
        }
    }

    let (nx, nz) = (opts.nx, opts.nz);
    let surface = IndexSpace::from_origin((0, 0, 0), config.background.extent);
    let domain = MaskSolid::from_fn(surface, |(i, _, k)| k < nz - i * nz / (2 * nx));

    let problem = ProblemData {
        z_mult,
        domain: Box::new(domain),
    };
    let mut rsz = Vector::new(&grid, 1, 1)?;

    kernel.init_instance(&grid)?;
    info!("rank {}: {} needs {} scratch values", context.rank(), kernel.name(), kernel.scratch_size());
    kernel.step(&problem, &mut rsz)?;
    kernel.free_instance();

    let output = Output {
        rank: context.rank(),
        subgrids: grid.local_subgrids().map(|s| (s.origin(), s.extent())).collect(),
        num_ghost: rsz.num_ghost(),
        data: rsz.data().to_vec(),
    };
    let path = opts.output.with_extension(format!("{}.cbor", context.rank()));
    let file = BufWriter::new(File::create(&path)?);
    ciborium::ser::into_writer(&output, file).map_err(|e| Error::Codec(format!("{:?}", e)))?;

    info!("rank {} wrote {}", context.rank(), path.display());
    context.report_max_memory()?;
    Ok(())
}

fn main() -> Result<(), Error> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let opts = Opts::parse();

    launch(opts.ranks, |context| run(context, &opts))
        .into_iter()
        .collect()
}
