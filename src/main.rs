#![forbid(unsafe_code)]

mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use carsmith::car::cli::{self, Replacement, Selector};
use carsmith::car::{CodecSettings, CommandError, CommandResult, EditSettings, RenditionType};

#[derive(Debug, Parser)]
#[command(name = "carsmith", version, about = "Browse, extract and patch RCAR asset catalogs")]
struct Cli {
    /// Log filter (e.g. "info", "carsmith=debug"). Overrides CARSMITH_LOG and RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct SelectArgs {
    /// Display name of the rendition.
    #[arg(long)]
    name: String,
    /// Only consider renditions of this type (image, icon, color, ...).
    #[arg(long)]
    kind: Option<RenditionType>,
    /// Only consider renditions with this scale factor.
    #[arg(long)]
    scale: Option<u32>,
}

impl From<SelectArgs> for Selector {
    fn from(s: SelectArgs) -> Self {
        Selector {
            name: s.name,
            kind: s.kind,
            scale: s.scale,
        }
    }
}

#[derive(Debug, Args)]
struct WriteArgs {
    /// Append changed payloads instead of rewriting the whole file.
    #[arg(long, default_value_t = false)]
    append: bool,
    /// Zstd level (1..=22) for payloads that get compressed.
    #[arg(long, env = "CARSMITH_ZSTD_LEVEL", default_value_t = CodecSettings::DEFAULT_ZSTD_LEVEL)]
    zstd_level: i32,
}

impl WriteArgs {
    fn settings(&self) -> EditSettings {
        EditSettings {
            codec: CodecSettings::default().with_level(self.zstd_level),
            compact: !self.append,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive catalog browser (terminal).
    Ui,

    /// List renditions grouped by type.
    List {
        #[arg(long)]
        car: PathBuf,
        /// Case-insensitive name filter.
        #[arg(long)]
        filter: Option<String>,
        /// Print size, scale, key fields and digests too.
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },

    /// Show the details of one rendition.
    Info {
        #[arg(long)]
        car: PathBuf,
        #[command(flatten)]
        select: SelectArgs,
    },

    /// Export renditions to a directory.
    Extract {
        #[arg(long)]
        car: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Case-insensitive name filter.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Remove a rendition from the catalog in place.
    Remove {
        #[arg(long)]
        car: PathBuf,
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// Replace the pixels of an image or icon rendition in place.
    Edit {
        #[arg(long)]
        car: PathBuf,
        #[command(flatten)]
        select: SelectArgs,
        /// Replacement image (any format the image crate decodes).
        #[arg(long, conflicts_with = "color", required_unless_present = "color")]
        image: Option<PathBuf>,
        /// Replacement color as r,g,b,a. Color edits are not supported.
        #[arg(long)]
        color: Option<String>,
        #[command(flatten)]
        write: WriteArgs,
    },

    /// Pack a directory into a catalog.
    Build {
        /// Input directory.
        #[arg(long)]
        input: PathBuf,
        /// Output catalog file.
        #[arg(long)]
        output: PathBuf,
        /// Optional name prefix (e.g. "icons/").
        #[arg(long, default_value = "")]
        prefix: String,
        /// Skip paths containing this substring (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Store payloads uncompressed.
        #[arg(long, default_value_t = false)]
        no_compress: bool,
        /// Zstd level (1..=22).
        #[arg(long, env = "CARSMITH_ZSTD_LEVEL", default_value_t = CodecSettings::DEFAULT_ZSTD_LEVEL)]
        zstd_level: i32,
    },

    /// Verify catalog integrity (bounds, hashes, dangling lookups).
    Verify {
        #[arg(long)]
        car: PathBuf,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("CARSMITH_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cmd: Command) -> CommandResult<()> {
    match cmd {
        Command::Ui => ui::run(),
        Command::List {
            car,
            filter,
            verbose,
        } => cli::list(&car, filter.as_deref(), verbose),
        Command::Info { car, select } => cli::info(&car, &select.into()),
        Command::Extract {
            car,
            output,
            filter,
        } => cli::extract(&car, &output, filter.as_deref()),
        Command::Remove { car, select, write } => {
            cli::remove(&car, &select.into(), write.settings())
        }
        Command::Edit {
            car,
            select,
            image,
            color,
            write,
        } => {
            let replacement = match (image, color) {
                (Some(image), _) => Replacement::Image(image),
                (None, Some(color)) => Replacement::Color(cli::parse_color(&color)?),
                (None, None) => {
                    return Err(CommandError::Argument("edit needs --image or --color".into()))
                }
            };
            cli::edit(&car, &select.into(), &replacement, write.settings())
        }
        Command::Build {
            input,
            output,
            prefix,
            exclude,
            no_compress,
            zstd_level,
        } => {
            let mut codec = CodecSettings::default().with_level(zstd_level);
            if no_compress {
                codec.compress = false;
            }
            cli::build(&input, &output, &prefix, &exclude, codec)
        }
        Command::Verify { car } => cli::verify(&car),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli.cmd) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
