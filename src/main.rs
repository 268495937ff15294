// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use aniso_fmm::io;
use aniso_fmm::{
    tensor_power_field, ConnectivityMapper, ConnectivityMaps, Grid3, MagnitudeNorm, TensorMetric,
};

#[derive(Parser)]
#[command(
    name = "aniso-fmm",
    about = "Anisotropic fast-marching connectivity from a tensor field"
)]
struct Cli {
    /// Tensor volume (.npy or .mat), shaped [6,nx,ny,nz] or [nx,ny,nz,6]
    #[arg(long)]
    tensor: PathBuf,

    /// MAT variable holding the tensor
    #[arg(long, default_value = "tensor")]
    tensor_var: String,

    /// Mask volume; voxels with value 0 are excluded
    #[arg(long)]
    mask: Option<PathBuf>,

    /// MAT variable holding the mask
    #[arg(long, default_value = "mask")]
    mask_var: String,

    /// Seed voxel, comma-separated (e.g., 10,12,7)
    #[arg(long, conflicts_with = "roi", required_unless_present = "roi")]
    seed: Option<String>,

    /// Region-of-interest volume; every voxel > 0 is seeded and the maps are summed
    #[arg(long)]
    roi: Option<PathBuf>,

    /// MAT variable holding the region of interest
    #[arg(long, default_value = "roi")]
    roi_var: String,

    /// Confidence exponent: 0 (Euclidean), -1 or > 0 (tensor power)
    #[arg(short = 'a', long, default_value = "0", allow_negative_numbers = true)]
    alpha: f64,

    /// Voxel spacing, comma-separated
    #[arg(long, default_value = "1,1,1")]
    spacing: String,

    /// Stop each march once the front reaches this distance
    #[arg(long)]
    limit: Option<f64>,

    /// Margin by which sector dynamics must point inward
    #[arg(long, default_value = "0")]
    tolerance: f64,

    /// Also evaluate voxels on the volume faces
    #[arg(long)]
    boundary: bool,

    /// Number of Rayon worker threads for region sweeps
    #[arg(long)]
    threads: Option<usize>,

    /// Distance output path (.npy or .mat)
    #[arg(short = 'o', long, default_value = "distance.npy")]
    output: PathBuf,

    /// Optimal dynamics output path, saved as [3,nx,ny,nz]
    #[arg(long)]
    dynamics: Option<PathBuf>,

    /// Confidence mean output path
    #[arg(long)]
    mean: Option<PathBuf>,

    /// Confidence standard deviation output path
    #[arg(long)]
    std: Option<PathBuf>,

    /// Confidence minimum output path
    #[arg(long)]
    min: Option<PathBuf>,
}

fn parse_seed(s: &str, shape: [usize; 3]) -> Result<[usize; 3]> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("invalid --seed: expected comma-separated integers")?;
    if parts.len() != 3 {
        bail!("--seed has {} components, expected 3", parts.len());
    }
    let seed = [parts[0], parts[1], parts[2]];
    if seed.iter().zip(shape).any(|(&c, n)| c >= n) {
        bail!("--seed {:?} is outside the volume {:?}", seed, shape);
    }
    Ok(seed)
}

fn parse_spacing(s: &str) -> Result<[f64; 3]> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("invalid --spacing: expected comma-separated floats")?;
    match parts.as_slice() {
        [h] => Ok([*h; 3]),
        [dx, dy, dz] => Ok([*dx, *dy, *dz]),
        _ => bail!("--spacing has {} components, expected 1 or 3", parts.len()),
    }
}

fn save(path: &Path, dims: &[usize], data: &[f64], var: &str) -> Result<()> {
    io::save_volume(path, dims, data, var)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn save_outputs(cli: &Cli, shape: [usize; 3], maps: &ConnectivityMaps) -> Result<()> {
    save(&cli.output, &shape, &maps.distance, "distance")?;
    if let Some(path) = &cli.dynamics {
        save(path, &[3, shape[0], shape[1], shape[2]], &maps.dynamics, "dynamics")?;
    }
    if let Some(path) = &cli.mean {
        save(path, &shape, &maps.mean, "mean")?;
    }
    if let Some(path) = &cli.std {
        save(path, &shape, &maps.std, "std")?;
    }
    if let Some(path) = &cli.min {
        save(path, &shape, &maps.min, "min")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // Reject a bad exponent before any heavy lifting.
    let needs_power =
        MagnitudeNorm::uses_tensor(cli.alpha).map_err(|e| anyhow::anyhow!("{}", e))?;
    let spacing = parse_spacing(&cli.spacing)?;

    let (shape, tensor) = io::load_tensor_field(&cli.tensor, &cli.tensor_var)
        .with_context(|| format!("failed to load tensor field {}", cli.tensor.display()))?;
    log::info!("tensor field {:?} from {}", shape, cli.tensor.display());

    let mask = match &cli.mask {
        Some(path) => Some(
            io::load_scalar_field(path, &cli.mask_var, shape)
                .with_context(|| format!("failed to load mask {}", path.display()))?,
        ),
        None => None,
    };

    let grid = Grid3::new(shape, spacing).map_err(|e| anyhow::anyhow!("{}", e))?;
    let n = grid.num_nodes();
    let metric = TensorMetric::new(grid, &tensor, mask.as_deref())
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_tolerance(cli.tolerance);
    if metric.num_excluded() > 0 {
        log::info!("{} of {} voxels excluded", metric.num_excluded(), n);
    }

    let power = if needs_power {
        Some(tensor_power_field(&tensor, n, cli.alpha).map_err(|e| anyhow::anyhow!("{}", e))?)
    } else {
        None
    };
    let norm =
        MagnitudeNorm::from_exponent(cli.alpha, power).map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut mapper = ConnectivityMapper::new(metric, norm)
        .map_err(|e| anyhow::anyhow!("{}", e))?
        .with_boundary_evaluation(cli.boundary);
    if let Some(threads) = cli.threads {
        mapper = mapper.with_threads(threads);
    }
    if let Some(limit) = cli.limit {
        mapper = mapper.with_limit(limit);
    }

    let start = std::time::Instant::now();
    let maps = match (&cli.seed, &cli.roi) {
        (Some(seed), _) => {
            let seed = parse_seed(seed, shape)?;
            mapper.map_seed(seed).map_err(|e| anyhow::anyhow!("{}", e))?
        }
        (None, Some(path)) => {
            let roi = io::load_scalar_field(path, &cli.roi_var, shape)
                .with_context(|| format!("failed to load region {}", path.display()))?;
            mapper.map_region(&roi).map_err(|e| anyhow::anyhow!("{}", e))?
        }
        (None, None) => bail!("one of --seed or --roi must be specified"),
    };
    log::info!("marching took {:.2}s", start.elapsed().as_secs_f64());

    save_outputs(&cli, shape, &maps)
}
