// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use ndarray::Array3;

use eikonal_sweep::core::{CartesianGrid, NDIM};
use eikonal_sweep::io;
use eikonal_sweep::source::InitialField;
use eikonal_sweep::sweep::{FastSweepSolver, ProgressInfo, DEFAULT_MAX_CYCLES};
use eikonal_sweep::EikonalOp;

#[derive(Parser)]
#[command(
    name = "eikonal-sweep",
    about = "Fast sweeping eikonal solver with adjoint slowness gradients"
)]
struct Cli {
    /// Grid size, comma-separated (e.g., 64,64,32)
    #[arg(short = 's', long)]
    size: String,

    /// Source coordinates, comma-separated (repeatable for multiple sources)
    #[arg(long, num_args = 1)]
    source: Vec<String>,

    /// Grid spacing
    #[arg(long, default_value = "1.0")]
    spacing: f64,

    /// Slowness field: "uniform:<val>", "gradient:<v0>,<g>",
    /// "slowness-file:<path>", or "velocity-file:<path>"
    #[arg(long, default_value = "uniform:1.0")]
    slowness: String,

    /// Early-exit tolerance on the max change over one sweep cycle
    #[arg(short = 't', long, default_value = "1e-8")]
    tolerance: f64,

    /// Maximum number of eight-sweep cycles
    #[arg(long, default_value_t = DEFAULT_MAX_CYCLES)]
    max_cycles: usize,

    /// Output file path (.npy or .mat)
    #[arg(short = 'o', long, default_value = "output.npy")]
    output: PathBuf,

    /// Receiver coordinates (repeatable). The slowness gradient of the summed
    /// receiver travel times is written to --gradient-output.
    #[arg(long, num_args = 1)]
    receiver: Vec<String>,

    /// Output path for the slowness gradient (.npy or .mat)
    #[arg(long, default_value = "grad_slowness.npy")]
    gradient_output: PathBuf,

    /// Print the residual of every sweep cycle to stderr
    #[arg(long)]
    progress: bool,
}

fn parse_size(s: &str) -> Result<[usize; NDIM]> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("invalid --size: expected comma-separated integers")?;
    if parts.len() != NDIM {
        bail!("--size has {} components, expected {}", parts.len(), NDIM);
    }
    Ok([parts[0], parts[1], parts[2]])
}

fn parse_point(s: &str, flag: &str) -> Result<[f64; NDIM]> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{}: expected comma-separated floats", flag))?;
    if parts.len() != NDIM {
        bail!(
            "--{} has {} components, expected {}",
            flag,
            parts.len(),
            NDIM
        );
    }
    Ok([parts[0], parts[1], parts[2]])
}

fn build_slowness_field(mode: &str, shape: [usize; NDIM], h: f64) -> Result<Array3<f64>> {
    let dims = (shape[0], shape[1], shape[2]);

    if let Some(val_str) = mode.strip_prefix("uniform:") {
        let val: f64 = val_str.parse().context("invalid uniform slowness value")?;
        if !val.is_finite() || val <= 0.0 {
            bail!("uniform slowness must be positive and finite, got {}", val);
        }
        return Ok(Array3::from_elem(dims, val));
    }

    if let Some(params) = mode.strip_prefix("gradient:") {
        let parts: Vec<&str> = params.split(',').collect();
        if parts.len() != 2 {
            bail!("gradient mode expects 'gradient:<v0>,<g>', got '{}'", mode);
        }
        let v0: f64 = parts[0].parse().context("invalid v0 in gradient")?;
        let g: f64 = parts[1].parse().context("invalid g in gradient")?;

        // velocity grows linearly with depth along the last axis
        let z_max = shape[NDIM - 1].saturating_sub(1) as f64 * h;
        let v_max = v0 + g * z_max;
        if !v0.is_finite() || v0 <= 0.0 {
            bail!("gradient: v0={} must be positive and finite", v0);
        }
        if !v_max.is_finite() || v_max <= 0.0 {
            bail!(
                "gradient: v(z_max) = {} must be positive and finite (v0={}, g={}, z_max={})",
                v_max,
                v0,
                g,
                z_max
            );
        }
        return Ok(Array3::from_shape_fn(dims, |(_, _, k)| {
            1.0 / (v0 + g * k as f64 * h)
        }));
    }

    if let Some(path_str) = mode.strip_prefix("slowness-file:") {
        return io::load_slowness(Path::new(path_str), shape)
            .with_context(|| format!("failed to load slowness from {}", path_str));
    }

    if let Some(path_str) = mode.strip_prefix("velocity-file:") {
        return io::load_velocity_as_slowness(Path::new(path_str), shape)
            .with_context(|| format!("failed to load velocity from {}", path_str));
    }

    bail!(
        "unknown --slowness mode: '{}'. Expected 'uniform:<val>', 'gradient:<v0>,<g>', \
         'slowness-file:<path>', or 'velocity-file:<path>'",
        mode
    );
}

fn build_solver(cli: &Cli) -> Result<FastSweepSolver> {
    let mut solver = FastSweepSolver::new()
        .with_tolerance(cli.tolerance)?
        .with_max_cycles(cli.max_cycles);
    if cli.progress {
        solver = solver.with_progress(Box::new(|info: ProgressInfo| {
            eprintln!(
                "[{:.1}s] cycle={} residual={:e}",
                info.elapsed.as_secs_f64(),
                info.cycle,
                info.residual,
            );
        }));
    }
    Ok(solver)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.source.is_empty() {
        bail!("at least one --source must be specified");
    }

    let shape = parse_size(&cli.size)?;
    let grid = CartesianGrid::new(shape, cli.spacing)?;
    let slowness = build_slowness_field(&cli.slowness, shape, cli.spacing)?;
    let f = slowness
        .as_slice()
        .context("slowness field is not contiguous")?;

    let mut initial = InitialField::new(grid);
    for src_str in &cli.source {
        initial.add_point_source(parse_point(src_str, "source")?, f)?;
    }
    let receivers = cli
        .receiver
        .iter()
        .map(|r| -> Result<[usize; NDIM]> {
            Ok(grid.nearest_node(parse_point(r, "receiver")?)?)
        })
        .collect::<Result<Vec<_>>>()?;

    let op = EikonalOp::new(build_solver(&cli)?);
    let tape = op.record(initial.into_array(), slowness, cli.spacing)?;
    let report = tape.report();
    if !report.converged {
        eprintln!(
            "warning: not converged after {} cycles (residual {:e})",
            report.cycles, report.residual
        );
    }

    io::save_field(tape.travel_time(), &cli.output, "traveltime")
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    if !receivers.is_empty() {
        // loss = sum of travel times at the receivers
        let mut grad_u = Array3::zeros(tape.travel_time().raw_dim());
        for idx in &receivers {
            grad_u[*idx] += 1.0;
        }
        let (_, grad_f) = tape.backward(&grad_u)?;
        io::save_field(&grad_f, &cli.gradient_output, "grad_slowness")
            .with_context(|| format!("failed to write {}", cli.gradient_output.display()))?;
    }

    Ok(())
}
