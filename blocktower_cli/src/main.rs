// Command-line front end for blocktower_core (`towergen`).
//
// Subcommands:
// - `generate <count> <blocks>`: sample towers and write each as node-link
//   JSON (`blocks_<n>_tower_<i>_base_<name>.json`) into `--out`, or print
//   them to stdout. `--base` extends an existing tower file instead of an
//   empty platform; `--configurations` also writes the material variants of
//   every tower.
// - `inspect <file>`: summary of a tower file (height, levels, supports).
// - `candidates <file> --dims l w h`: how many valid placements a block has
//   on the tower, per level.
// - `config`: print the effective configuration as JSON.
//
// `--config <file>` loads a `TowerConfig`; `-v` raises log verbosity (warn,
// info, debug, trace). This binary is the only place in the workspace that
// touches the filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use blocktower_core::block::{BlockGeometry, Cuboid, cardinal_rotations};
use blocktower_core::config::TowerConfig;
use blocktower_core::placement::find_placements;
use blocktower_core::substance::Substance;
use blocktower_core::tower::Tower;
use blocktower_prng::TowerRng;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "towergen",
    version,
    about = "Generate and inspect procedural block towers"
)]
struct Opts {
    /// TowerConfig JSON file; defaults are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample towers and write them as JSON
    Generate {
        /// Number of towers
        count: usize,
        /// Blocks per tower
        blocks: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Output directory; towers go to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Existing tower JSON to build on
        #[arg(long)]
        base: Option<PathBuf>,
        /// Also write congruent/incongruent material variants
        #[arg(long)]
        configurations: bool,
    },
    /// Summarize a tower file
    Inspect { tower: PathBuf },
    /// Count valid placements of a block on a tower
    Candidates {
        tower: PathBuf,
        /// Block dimensions: length width height
        #[arg(long, num_args = 3, required = true)]
        dims: Vec<f64>,
        /// Try identity plus quarter turns about each axis
        #[arg(long)]
        cardinal: bool,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(opts.verbose);
    if let Err(e) = run(opts) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(opts: Opts) -> Result<()> {
    let config = load_config(opts.config.as_deref())?;
    match opts.command {
        Command::Generate {
            count,
            blocks,
            seed,
            out,
            base,
            configurations,
        } => generate(&config, count, blocks, seed, out, base, configurations),
        Command::Inspect { tower } => inspect(&load_tower(&tower)?),
        Command::Candidates {
            tower,
            dims,
            cardinal,
        } => candidates(&config, &load_tower(&tower)?, &dims, cardinal),
        Command::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<TowerConfig> {
    let Some(path) = path else {
        return Ok(TowerConfig::default());
    };
    let json = read(path)?;
    TowerConfig::from_json(&json)
        .with_context(|| format!("loading config {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))
}

fn load_tower(path: &Path) -> Result<Tower> {
    let json = read(path)?;
    Tower::from_json(&json)
        .with_context(|| format!("loading tower {}", path.display()))
}

/// Write `tower` to `<out>/<name>.json`, or print it as one JSON line.
fn emit(out: Option<&Path>, name: &str, tower: &Tower) -> Result<()> {
    let Some(dir) = out else {
        println!("{}", tower.to_json()?);
        return Ok(());
    };
    let path = dir.join(format!("{name}.json"));
    let json = tower.to_document().to_json_pretty()?;
    fs::write(&path, json)
        .with_context(|| format!("writing {}", path.display()))
}

fn generate(
    config: &TowerConfig,
    count: usize,
    blocks: usize,
    seed: u64,
    out: Option<PathBuf>,
    base: Option<PathBuf>,
    configurations: bool,
) -> Result<()> {
    let mut config = config.clone();
    config.generator.n_blocks = blocks;
    let generator = config.generator()?;

    let (base_tower, base_name) = match &base {
        Some(path) => {
            let stem = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().into_owned(),
                None => "tower".to_string(),
            };
            (load_tower(path)?, stem)
        }
        None => {
            let dims = &config.generator.base_dims;
            let name = format!("{}x{}", dims[0], dims[1]);
            (generator.base().clone(), name)
        }
    };

    let rng = TowerRng::new(seed);
    let outcomes = generator.generate_on(&base_tower, count, &rng)?;
    log::info!("generated {} towers", outcomes.len());

    let out = out.as_deref();
    if let Some(dir) = out {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    for (i, outcome) in outcomes.iter().enumerate() {
        let placed = outcome.placed;
        if outcome.status.is_stalled() {
            log::warn!("tower {i} stalled after {placed} of {blocks} blocks");
        }
        let stem = format!("blocks_{}_tower_{i}_base_{base_name}", outcome.tower.len());
        emit(out, &stem, &outcome.tower)?;

        if configurations {
            let mut variant_rng = rng.fork((count + i) as u64);
            for cfg in generator.configurations(&outcome.tower, &mut variant_rng)? {
                for (label, tower) in cfg.variants() {
                    emit(out, &format!("{stem}_{label}"), tower)?;
                }
            }
        }
    }
    Ok(())
}

fn inspect(tower: &Tower) -> Result<()> {
    println!("blocks: {}", tower.len());
    println!("height: {:.4}", tower.height());
    for level in tower.levels(None)? {
        let ids: Vec<String> = level.members.iter().map(|id| id.to_string()).collect();
        println!("level z={:.4}: {}", level.z, ids.join(", "));
    }
    for node in tower.nodes().skip(1) {
        let parents: Vec<String> = node.parents.iter().map(|id| id.to_string()).collect();
        let substance = match &node.substance {
            Some(Substance {
                name,
                density,
                friction,
            }) => format!("{name} (density {density}, friction {friction})"),
            None => "-".to_string(),
        };
        let dims = node.placed.block.dims_vec();
        let position = node.placed.position.to_array();
        let parents = parents.join(", ");
        println!(
            "{}: dims {dims:?} at {position:?} on [{parents}], substance {substance}",
            node.id
        );
    }
    Ok(())
}

fn candidates(config: &TowerConfig, tower: &Tower, dims: &[f64], cardinal: bool) -> Result<()> {
    let block = Cuboid::new(dims)?;
    let rotations = if cardinal {
        cardinal_rotations()
    } else {
        Vec::new()
    };
    let found = find_placements(tower, &block, &rotations, &config.search);
    println!("{} candidate placements", found.len());
    let tolerance = config.search.level_tolerance;
    for level in tower.levels_within(None, tolerance)? {
        let z = level.z;
        let on_level = found
            .iter()
            .filter(|p| {
                let half = block.clone().with_quat(p.orientation).half_height();
                (p.position.z - half - z).abs() <= tolerance
            })
            .count();
        println!("  level z={z:.4}: {on_level}");
    }
    Ok(())
}
