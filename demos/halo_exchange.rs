use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use halogrid::geometry::Background;
use halogrid::message::TcpCommunicator;
use halogrid::{launch, Config, Context, Error, Grid, Topology, UpdateMode, Vector};

/// Times repeated halo exchanges of a linear ramp field and checks every
/// ghost cell against the ramp afterwards. Ranks run as threads of this
/// process, or, when --rank and --peers are given, as separate processes
/// connected over TCP.
#[derive(Debug, Parser)]
#[clap(version = "0.1")]
struct Opts {
    /// Number of in-process ranks
    #[clap(short = 'n', long, default_value = "4")]
    ranks: usize,

    /// This process's rank, for a multi-process run
    #[clap(long)]
    rank: Option<usize>,

    /// Listening addresses of every rank, in rank order
    #[clap(long, value_delimiter = ',')]
    peers: Vec<SocketAddr>,

    /// Read the grid configuration from a CBOR file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Write the grid configuration to a CBOR file and exit
    #[clap(long)]
    write_config: Option<PathBuf>,

    /// Number of cells on each axis, when no configuration file is given
    #[clap(short = 'e', long, default_value = "48")]
    extent: i64,

    #[clap(short = 'g', long, default_value = "1")]
    ghost: i64,

    #[clap(short = 'c', long, default_value = "1")]
    components: usize,

    #[clap(short = 'i', long, default_value = "20")]
    iterations: usize,
}

/// Factor `n` into three factors, as close to each other as possible, with
/// the largest on the x axis.
fn factor(n: usize) -> Topology {
    let mut best = (n, 1, 1);

    for r in 1..=n {
        for q in r..=n / r {
            if n % (q * r) == 0 {
                let p = n / (q * r);

                if p >= q && p.max(q).max(r) - r < best.0 - best.2 {
                    best = (p, q, r);
                }
            }
        }
    }
    Topology::new(best.0, best.1, best.2)
}

fn run(context: Arc<Context>, config: &Config, opts: &Opts) -> Result<(), Error> {
    let grid = Grid::new(context.clone(), config)?;

    if context.rank() == 0 {
        grid.log_layout();
    }

    let mut v = Vector::new(&grid, opts.components, opts.ghost)?;
    v.fill_constant(f64::NAN);
    v.fill_linear_ramp(0.0, 1.0);

    context.comm().barrier()?;
    let start = Instant::now();

    for _ in 0..opts.iterations {
        v.update(UpdateMode::All)?;
    }
    let seconds = start.elapsed().as_secs_f64();

    let mut mismatched = 0;

    for (n, s) in v.subvectors().iter().enumerate() {
        let data = v.subvector_data(n);

        for index in s.data_space().iter().filter(|&i| grid.domain().contains(i)) {
            let expected = (index.0 + index.1 + index.2) as f64;
            let offset = s.view().offset(index);

            if data[offset..offset + opts.components].iter().any(|&x| x != expected) {
                mismatched += 1;
            }
        }
    }
    info!(
        "rank {}: {} exchanges in {:.4}s ({:.1} us each), {} mismatched cells",
        context.rank(),
        opts.iterations,
        seconds,
        1e6 * seconds / opts.iterations.max(1) as f64,
        mismatched
    );
    context.report_max_memory()?;

    if mismatched > 0 {
        return Err(Error::Protocol(format!(
            "{} ghost cells disagree with their owners",
            mismatched
        )));
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let opts = Opts::parse();
    let size = if opts.rank.is_some() {
        opts.peers.len()
    } else {
        opts.ranks
    };

    let config = match &opts.config {
        Some(path) => Config::read_cbor(BufReader::new(File::open(path)?))?,
        None => Config {
            background: Background {
                extent: (opts.extent, opts.extent, opts.extent),
                ..Background::default()
            },
            topology: factor(size),
            ..Config::default()
        },
    };

    if let Some(path) = &opts.write_config {
        return config.write_cbor(BufWriter::new(File::create(path)?));
    }

    match opts.rank {
        Some(rank) => {
            let comm = TcpCommunicator::new(rank, opts.peers.clone())?;
            run(Context::new(Box::new(comm)), &config, &opts)
        }
        None => launch(opts.ranks, |context| run(context, &config, &opts))
            .into_iter()
            .collect(),
    }
}
