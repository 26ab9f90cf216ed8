//! `ttenv` CLI: random-policy evaluation runs and initial pose set generation.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use sim::{
    load_config, load_pose_set, save_pose_set, EmptyMap, EnvConfig, GridMap, InitPose,
    InitPoseSampler, ModelBackend, ObstacleMap, PoseSet, ResetOptions, TargetTrackingEnv,
    TrackingBackend,
};
use std::path::{Path, PathBuf};
use tracker_core::metrics::EpisodeMetrics;

#[derive(Parser)]
#[command(name = "ttenv", about = "Target-tracking environment CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes with a uniform-random policy and report metrics.
    Run {
        /// Number of episodes
        #[arg(long, default_value_t = 10)]
        episodes: usize,
        /// Steps per episode
        #[arg(long, default_value_t = 100)]
        steps: usize,
        /// Base random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Evaluation mode (reports the test reward)
        #[arg(long)]
        eval: bool,
        /// JSON environment configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Replay initial poses from a pose set file
        #[arg(long)]
        pose_set: Option<PathBuf>,
        /// Worker threads (0 = all cores)
        #[arg(long, default_value_t = 0)]
        jobs: usize,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        map: MapArgs,
    },
    /// Sample initial poses and write them as a pose set.
    GenInitPose {
        /// Output pose set JSON file
        output: PathBuf,
        /// Number of records
        #[arg(long, default_value_t = 100)]
        count: usize,
        #[arg(long, default_value_t = 1)]
        num_targets: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// JSON environment configuration
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        options: ResetArgs,
        #[command(flatten)]
        map: MapArgs,
    },
}

/// Reset option overrides.
#[derive(Args, Clone, Debug, Default)]
struct ResetArgs {
    #[arg(long)]
    init_distance_min: Option<f64>,
    #[arg(long)]
    init_distance_max: Option<f64>,
    /// Spawn targets in any direction from the agent
    #[arg(long)]
    target_direction: Option<bool>,
    /// Spawn belief priors in any direction from the target
    #[arg(long)]
    belief_direction: Option<bool>,
    /// Require (true) or forbid (false) an obstacle between agent and target
    #[arg(long)]
    blocked: Option<bool>,
}

impl From<ResetArgs> for ResetOptions {
    fn from(a: ResetArgs) -> Self {
        ResetOptions {
            init_distance_min: a.init_distance_min,
            init_distance_max: a.init_distance_max,
            target_direction: a.target_direction,
            belief_direction: a.belief_direction,
            blocked: a.blocked,
        }
    }
}

/// Rectangular obstacles on a bounded grid. Without obstacles the plane is
/// unbounded and empty.
#[derive(Args, Clone, Debug)]
struct MapArgs {
    /// Obstacle rectangle `xmin,ymin,xmax,ymax` (repeatable)
    #[arg(long = "obstacle", value_parser = parse_rect)]
    obstacles: Vec<[f64; 4]>,
    /// Half extent of the bounded map when obstacles are given (meters)
    #[arg(long, default_value_t = 20.0)]
    map_half_size: f64,
    /// Grid cell size (meters)
    #[arg(long, default_value_t = 0.5)]
    map_resolution: f64,
}

impl MapArgs {
    fn grid(&self) -> Result<Option<GridMap>> {
        if self.obstacles.is_empty() {
            return Ok(None);
        }
        let h = self.map_half_size;
        let grid = self
            .obstacles
            .iter()
            .fold(GridMap::new([-h, -h], [h, h], self.map_resolution)?, |g, r| {
                g.with_rect([r[0], r[1]], [r[2], r[3]])
            });
        Ok(Some(grid))
    }
}

fn parse_rect(s: &str) -> std::result::Result<[f64; 4], String> {
    let v: Vec<f64> = s
        .split(',')
        .map(|x| x.trim().parse::<f64>().map_err(|e| format!("{x:?}: {e}")))
        .collect::<std::result::Result<_, _>>()?;
    match v.as_slice() {
        &[x0, y0, x1, y1] if x0 <= x1 && y0 <= y1 => Ok([x0, y0, x1, y1]),
        _ => Err(format!("expected xmin,ymin,xmax,ymax, got {s:?}")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            episodes,
            steps,
            seed,
            eval,
            config,
            pose_set,
            jobs,
            output,
            map,
        } => {
            let mut cfg = base_config(config.as_deref())?;
            cfg.seed = seed;
            cfg.is_training = !eval;
            let poses = match pose_set {
                Some(path) => Some(load_pose_set(&path)?.poses),
                None => None,
            };
            let run = RunSpec {
                config: cfg,
                episodes,
                steps,
                poses,
            };
            let results = match map.grid()? {
                Some(grid) => run_episodes(&run, &grid, jobs)?,
                None => run_episodes(&run, &EmptyMap, jobs)?,
            };
            report(&run, &results, output.as_deref())?;
        }
        Commands::GenInitPose {
            output,
            count,
            num_targets,
            seed,
            config,
            options,
            map,
        } => {
            let mut cfg = base_config(config.as_deref())?;
            cfg.num_targets = num_targets;
            cfg.seed = seed;
            let options = ResetOptions::from(options);
            let set = match map.grid()? {
                Some(grid) => generate_pose_set(&cfg, &options, count, &grid)?,
                None => generate_pose_set(&cfg, &options, count, &EmptyMap)?,
            };
            save_pose_set(&set, &output)?;
            println!("{} initial poses saved to {}", set.poses.len(), output.display());
        }
    }

    Ok(())
}

fn base_config(path: Option<&Path>) -> Result<EnvConfig> {
    let cfg = match path {
        Some(p) => load_config(p)?,
        None => EnvConfig::default(),
    };
    Ok(cfg)
}

struct RunSpec {
    config: EnvConfig,
    episodes: usize,
    steps: usize,
    poses: Option<Vec<InitPose>>,
}

#[derive(Serialize)]
struct EpisodeReport {
    episode: usize,
    seed: u64,
    mean_reward: f64,
    mean_test_reward: Option<f64>,
    observed_ratio: f64,
    vetoes: u64,
    rmse_position: f64,
}

/// Each episode owns a fresh environment; only the config and map are shared.
fn run_episodes<M>(run: &RunSpec, map: &M, jobs: usize) -> Result<Vec<EpisodeMetrics>>
where
    M: ObstacleMap + Clone + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("building worker pool")?;

    println!(
        "Running {} episode(s) x {} steps (seed={}, eval={})...",
        run.episodes, run.steps, run.config.seed, !run.config.is_training
    );
    let start = std::time::Instant::now();
    let results = pool.install(|| {
        (0..run.episodes)
            .into_par_iter()
            .map(|ep| run_episode(run, map.clone(), ep))
            .collect::<Result<Vec<_>>>()
    })?;
    println!("Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(results)
}

fn episode_seed(base: u64, episode: usize) -> u64 {
    base.wrapping_add(16 * episode as u64)
}

fn run_episode<M: ObstacleMap>(run: &RunSpec, map: M, episode: usize) -> Result<EpisodeMetrics> {
    let mut cfg = run.config.clone();
    cfg.seed = episode_seed(run.config.seed, episode);
    let mut env: TargetTrackingEnv<ModelBackend, M> = TargetTrackingEnv::with_map(cfg.clone(), map)?;
    let mut policy = ChaCha8Rng::seed_from_u64(cfg.seed.wrapping_add(3));

    if let Some(poses) = run.poses.as_ref().filter(|p| !p.is_empty()) {
        env.set_pose_set(vec![poses[episode % poses.len()].clone()])
            .with_context(|| format!("episode {episode}: pose set record"))?;
    }
    env.reset(&ResetOptions::default())
        .with_context(|| format!("episode {episode}: reset"))?;

    let mut metrics = EpisodeMetrics::default();
    let n_actions = env.num_actions();
    for _ in 0..run.steps {
        let action = policy.gen_range(0..n_actions);
        let out = env.step(action)?;
        metrics.accumulate(
            out.reward,
            out.test_reward,
            &out.observed,
            out.vetoed,
            &env.estimator().target_states(),
            &env.backend().target_states(),
        );
    }
    tracing::debug!(episode, mean_reward = metrics.mean_reward(), "episode finished");
    Ok(metrics)
}

fn report(run: &RunSpec, results: &[EpisodeMetrics], output: Option<&Path>) -> Result<()> {
    let mut total = EpisodeMetrics::default();
    for m in results {
        total.merge(m);
    }
    println!(
        "mean reward {:.4}, observed {:.1}%, vetoes {}, position RMSE {:.3} m",
        total.mean_reward(),
        100.0 * total.observed_ratio(),
        total.n_vetoes,
        total.rmse_position(),
    );
    if let Some(tr) = total.mean_test_reward() {
        println!("mean test reward {tr:.4}");
    }

    if let Some(opath) = output {
        let episodes: Vec<EpisodeReport> = results
            .iter()
            .enumerate()
            .map(|(i, m)| EpisodeReport {
                episode: i,
                seed: episode_seed(run.config.seed, i),
                mean_reward: m.mean_reward(),
                mean_test_reward: m.mean_test_reward(),
                observed_ratio: m.observed_ratio(),
                vetoes: m.n_vetoes,
                rmse_position: m.rmse_position(),
            })
            .collect();
        let json = serde_json::json!({
            "seed": run.config.seed,
            "steps": run.steps,
            "num_targets": run.config.num_targets,
            "totals": total,
            "mean_reward": total.mean_reward(),
            "mean_test_reward": total.mean_test_reward(),
            "episodes": episodes,
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", opath.display());
    }
    Ok(())
}

fn generate_pose_set<M: ObstacleMap>(
    cfg: &EnvConfig,
    options: &ResetOptions,
    count: usize,
    map: &M,
) -> Result<PoseSet> {
    cfg.validate()?;
    let init_cfg = options.apply(&cfg.init)?;
    let mut sampler = InitPoseSampler::new(cfg.num_targets, cfg.sensor.fov_half(), cfg.seed);
    let poses = (0..count)
        .map(|i| {
            sampler
                .sample(&init_cfg, map)
                .with_context(|| format!("sampling record {i}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(PoseSet {
        seed: cfg.seed,
        num_targets: cfg.num_targets,
        options: options.clone(),
        poses,
    })
}
