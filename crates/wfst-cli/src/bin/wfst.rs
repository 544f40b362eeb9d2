// wfst: apply transducer algorithms to binary FST files.
//
// Every algorithm subcommand reads its operands from binary files, runs
// once and writes the result as a binary vector transducer. `compile` and
// `print` convert between AT&T text and the binary format.
//
// The arc type is taken from the header of the first binary operand;
// `--arc-type` overrides it and selects the semiring for `compile`.
//
// Usage:
//   wfst [-v] [--arc-type standard|log] <COMMAND> [ARGS]
//
// Examples:
//   wfst compile lexicon.txt lexicon.fst
//   wfst determinize --det-type disambiguate in.fst out.fst
//   wfst compose --filter match a.fst b.fst out.fst
//   wfst shortest-path --nshortest 5 --unique in.fst best.fst
//   wfst info --json out.fst

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use wfst::prelude::*;
use wfst_cli::{FstInfo, init_logging, peek_arc_type, read_fst, read_text_fst, write_fst};

#[derive(Parser)]
#[command(name = "wfst", version, about = "Weighted finite state transducer tools")]
struct Cli {
    /// Print debug logging from the algorithms.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Semiring of the transducers. Defaults to the arc type of the first
    /// binary input, or `standard` when there is none.
    #[arg(long, global = true, value_enum)]
    arc_type: Option<ArcType>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ArcType {
    /// Tropical semiring.
    Standard,
    /// Log semiring.
    Log,
}

#[derive(Args)]
struct Unary {
    /// Input binary transducer.
    input: PathBuf,
    /// Output binary transducer.
    output: PathBuf,
}

#[derive(Args)]
struct Binary {
    /// First operand.
    input1: PathBuf,
    /// Second operand.
    input2: PathBuf,
    /// Output binary transducer.
    output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum DetType {
    Functional,
    Nonfunctional,
    Disambiguate,
}

impl From<DetType> for DeterminizeType {
    fn from(t: DetType) -> Self {
        match t {
            DetType::Functional => DeterminizeType::Functional,
            DetType::Nonfunctional => DeterminizeType::NonFunctional,
            DetType::Disambiguate => DeterminizeType::Disambiguate,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    Auto,
    Null,
    Trivial,
    Sequence,
    AltSequence,
    Match,
    NoMatch,
}

impl From<Filter> for ComposeFilter {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Auto => ComposeFilter::Auto,
            Filter::Null => ComposeFilter::Null,
            Filter::Trivial => ComposeFilter::Trivial,
            Filter::Sequence => ComposeFilter::Sequence,
            Filter::AltSequence => ComposeFilter::AltSequence,
            Filter::Match => ComposeFilter::Match,
            Filter::NoMatch => ComposeFilter::NoMatch,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortType {
    Ilabel,
    Olabel,
}

#[derive(Subcommand)]
enum Command {
    /// Remove states that are not both accessible and coaccessible.
    Connect(Unary),
    /// Determinize on the input side.
    Determinize {
        #[command(flatten)]
        io: Unary,
        #[arg(long, value_enum, default_value = "functional")]
        det_type: DetType,
    },
    /// Minimize a deterministic transducer.
    Minimize {
        #[command(flatten)]
        io: Unary,
        /// Accept non-deterministic input.
        #[arg(long)]
        allow_nondet: bool,
    },
    /// Remove epsilons, determinize and minimize.
    Optimize(Unary),
    /// Remove epsilon transitions.
    #[command(name = "rmepsilon")]
    RmEpsilon(Unary),
    /// Swap input and output labels.
    Invert(Unary),
    /// Copy one side's labels onto the other.
    Project {
        #[command(flatten)]
        io: Unary,
        /// Keep output labels instead of input labels.
        #[arg(long)]
        project_output: bool,
    },
    /// Reverse every path.
    Reverse(Unary),
    /// Renumber states in topological order.
    Topsort(Unary),
    /// Sort each state's transitions.
    TrSort {
        #[command(flatten)]
        io: Unary,
        #[arg(long, value_enum, default_value = "ilabel")]
        sort_type: SortType,
    },
    /// Remove duplicate transitions.
    TrUnique(Unary),
    /// Push weights and/or labels. Pushes weights when neither is asked for.
    Push {
        #[command(flatten)]
        io: Unary,
        #[arg(long)]
        to_final: bool,
        #[arg(long)]
        push_weights: bool,
        #[arg(long)]
        push_labels: bool,
        #[arg(long)]
        remove_total_weight: bool,
    },
    /// Keep the n best paths.
    ShortestPath {
        #[command(flatten)]
        io: Unary,
        #[arg(long, default_value_t = 1)]
        nshortest: usize,
        /// At most one path per label sequence.
        #[arg(long)]
        unique: bool,
    },
    /// Compose two transducers.
    Compose {
        #[command(flatten)]
        io: Binary,
        #[arg(long, value_enum, default_value = "auto")]
        filter: Filter,
    },
    /// Union of two transducers.
    Union(Binary),
    /// Concatenation of two transducers.
    Concat(Binary),
    /// Sample random paths.
    Randgen {
        #[command(flatten)]
        io: Unary,
        #[arg(long, default_value_t = 1)]
        npath: usize,
        /// `0` seeds from the operating system.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        max_length: Option<usize>,
        /// Merge samples into a tree weighted by frequency.
        #[arg(long)]
        weighted: bool,
    },
    /// Compile AT&T text into a binary transducer.
    Compile {
        /// Input text file.
        input: PathBuf,
        /// Output binary transducer.
        output: PathBuf,
    },
    /// Print a binary transducer as AT&T text.
    Print {
        input: PathBuf,
        /// Write to this file instead of stdout.
        output: Option<PathBuf>,
    },
    /// Print statistics and properties.
    Info {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    /// First binary operand, used to detect the arc type.
    fn binary_input(&self) -> Option<&Path> {
        match self {
            Command::Compile { .. } => None,
            Command::Connect(io)
            | Command::Optimize(io)
            | Command::RmEpsilon(io)
            | Command::Invert(io)
            | Command::Reverse(io)
            | Command::Topsort(io)
            | Command::TrUnique(io)
            | Command::Determinize { io, .. }
            | Command::Minimize { io, .. }
            | Command::Project { io, .. }
            | Command::TrSort { io, .. }
            | Command::Push { io, .. }
            | Command::ShortestPath { io, .. }
            | Command::Randgen { io, .. } => Some(io.input.as_path()),
            Command::Compose { io, .. } | Command::Union(io) | Command::Concat(io) => {
                Some(io.input1.as_path())
            }
            Command::Print { input, .. } | Command::Info { input, .. } => Some(input.as_path()),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let arc_type = match (cli.arc_type, cli.command.binary_input()) {
        (Some(t), _) => t,
        (None, Some(path)) => match peek_arc_type(path)?.as_str() {
            "standard" => ArcType::Standard,
            "log" => ArcType::Log,
            other => bail!("unsupported arc type {other:?} in {}", path.display()),
        },
        (None, None) => ArcType::Standard,
    };
    match arc_type {
        ArcType::Standard => run::<TropicalWeight>(cli.command),
        ArcType::Log => run::<LogWeight>(cli.command),
    }
}

fn run<W: Semiring>(command: Command) -> Result<()> {
    match command {
        Command::Connect(io) => unary::<W>(&io, "connect", connect),
        Command::Determinize { io, det_type } => {
            let config = DeterminizeConfig::new(det_type.into(), KDELTA);
            debug!("determinize config: {}", serde_json::to_string(&config)?);
            unary::<W>(&io, "determinize", |fst| {
                *fst = determinize_with_config(&*fst, config)?;
                Ok(())
            })
        }
        Command::Minimize { io, allow_nondet } => {
            let config = MinimizeConfig::new(KDELTA, allow_nondet);
            unary::<W>(&io, "minimize", |fst| minimize_with_config(fst, config))
        }
        Command::Optimize(io) => unary::<W>(&io, "optimize", optimize),
        Command::RmEpsilon(io) => unary::<W>(&io, "rmepsilon", rm_epsilon),
        Command::Invert(io) => unary::<W>(&io, "invert", |fst| {
            invert(fst);
            Ok(())
        }),
        Command::Project { io, project_output } => {
            let project_type = if project_output {
                ProjectType::Output
            } else {
                ProjectType::Input
            };
            unary::<W>(&io, "project", |fst| {
                project(fst, project_type);
                Ok(())
            })
        }
        Command::Reverse(io) => unary::<W>(&io, "reverse", |fst| {
            *fst = reverse(&*fst)?;
            Ok(())
        }),
        Command::Topsort(io) => unary::<W>(&io, "topsort", top_sort),
        Command::TrSort { io, sort_type } => unary::<W>(&io, "tr-sort", |fst| {
            tr_sort(fst, matches!(sort_type, SortType::Ilabel));
            Ok(())
        }),
        Command::TrUnique(io) => unary::<W>(&io, "tr-unique", |fst| {
            tr_unique(fst);
            Ok(())
        }),
        Command::Push {
            io,
            to_final,
            push_weights,
            push_labels,
            remove_total_weight,
        } => {
            let config = PushConfig {
                to_final,
                push_weights: push_weights || !push_labels,
                push_labels,
                remove_total_weight,
                ..PushConfig::default()
            };
            debug!("push config: {}", serde_json::to_string(&config)?);
            unary::<W>(&io, "push", |fst| push(fst, config))
        }
        Command::ShortestPath {
            io,
            nshortest,
            unique,
        } => {
            let config = ShortestPathConfig::new(nshortest, unique, KDELTA);
            unary::<W>(&io, "shortest-path", |fst| {
                *fst = shortest_path_with_config(&*fst, config)?;
                Ok(())
            })
        }
        Command::Compose { io, filter } => {
            let config = ComposeConfig::new(filter.into(), true);
            debug!("compose config: {}", serde_json::to_string(&config)?);
            binary::<W>(&io, "compose", |a, b| {
                *a = compose_with_config(&*a, b, config)?;
                Ok(())
            })
        }
        Command::Union(io) => binary::<W>(&io, "union", |a, b| union(a, b)),
        Command::Concat(io) => binary::<W>(&io, "concat", |a, b| concat(a, b)),
        Command::Randgen {
            io,
            npath,
            seed,
            max_length,
            weighted,
        } => {
            let config = RandGenConfig {
                max_length: max_length.unwrap_or(usize::MAX),
                weighted,
                ..RandGenConfig::new(npath, seed)
            };
            debug!("randgen config: {}", serde_json::to_string(&config)?);
            unary::<W>(&io, "randgen", |fst| {
                *fst = randgen(&*fst, &config)?;
                Ok(())
            })
        }
        Command::Compile { input, output } => {
            let fst = read_text_fst::<W>(&input)?;
            info!(
                "compiled {}: {} states, {} transitions",
                input.display(),
                fst.num_states(),
                fst.num_trs_total()
            );
            write_fst(&fst, &output)
        }
        Command::Print { input, output } => {
            let fst = read_fst::<W>(&input)?;
            match output {
                Some(path) => fst
                    .write_text(&path)
                    .with_context(|| format!("failed to write {}", path.display())),
                None => {
                    print!("{}", fst.text());
                    Ok(())
                }
            }
        }
        Command::Info { input, json } => {
            let data =
                std::fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
            let header = wfst::format::read_header(&data)?;
            let fst = VectorFst::<W>::load(&data)?;
            let summary = FstInfo::new(&fst, &header.fst_type)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(())
        }
    }
}

/// Read one operand, apply `op` in place and write the result.
fn unary<W: Semiring>(
    io: &Unary,
    name: &str,
    op: impl FnOnce(&mut VectorFst<W>) -> wfst::Result<()>,
) -> Result<()> {
    let mut fst = read_fst::<W>(&io.input)?;
    debug!(
        "{name}: input has {} states, {} transitions",
        fst.num_states(),
        fst.num_trs_total()
    );
    let start = Instant::now();
    op(&mut fst).with_context(|| format!("{name} failed"))?;
    info!(
        "{name}: {} states, {} transitions in {:.2?}",
        fst.num_states(),
        fst.num_trs_total(),
        start.elapsed()
    );
    write_fst(&fst, &io.output)
}

/// Read two operands, combine the second into the first and write it.
fn binary<W: Semiring>(
    io: &Binary,
    name: &str,
    op: impl FnOnce(&mut VectorFst<W>, &VectorFst<W>) -> wfst::Result<()>,
) -> Result<()> {
    let mut a = read_fst::<W>(&io.input1)?;
    let b = read_fst::<W>(&io.input2)?;
    let start = Instant::now();
    op(&mut a, &b).with_context(|| format!("{name} failed"))?;
    info!(
        "{name}: {} states, {} transitions in {:.2?}",
        a.num_states(),
        a.num_trs_total(),
        start.elapsed()
    );
    write_fst(&a, &io.output)
}
