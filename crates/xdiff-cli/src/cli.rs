//! The command-line surface (§6.2): flags, subcommands and their defaults,
//! parsed with `clap` the way the teacher's `sherpack_cli::Cli` is.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "xdiff")]
#[command(author = "xdiff Contributors")]
#[command(version)]
#[command(about = "Show what would change in a Crossplane-managed cluster before you apply it", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand)]
pub enum Command {
    /// Diff candidate XRs/Claims against the live cluster
    Xr(XrArgs),

    /// Diff an updated Composition by re-rendering every live XR that
    /// currently uses it
    Comp(CompArgs),
}

#[derive(clap::Args)]
pub struct XrArgs {
    /// YAML file or directory paths of candidate XRs/Claims
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(clap::Args)]
pub struct CompArgs {
    /// YAML file path of the updated Composition
    pub composition: PathBuf,

    /// Namespace to scope the affected-XR search to (empty = all)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Also diff XRs pinned to a prior revision under `Manual` update policy
    #[arg(long)]
    pub include_manual: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
pub struct CommonArgs {
    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Disable ANSI color in the textual report
    #[arg(long)]
    pub no_color: bool,

    /// Use a 1-line diff context instead of 3
    #[arg(long)]
    pub compact: bool,

    /// `--output=json` emits the diff set as JSON instead of the textual report
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Recursion cap for nested composites
    #[arg(long, default_value_t = 10)]
    pub max_nested_depth: usize,

    /// Overall deadline for the run, e.g. "30s", "1m", "2h"
    #[arg(long, default_value = "1m", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Cluster client queries-per-second budget
    #[arg(long, default_value_t = 50.0)]
    pub qps: f32,

    /// Cluster client burst budget
    #[arg(long, default_value_t = 100)]
    pub burst: u32,

    /// Dotted/bracketed path expression to exclude from every diff, e.g.
    /// `metadata.annotations[my.io/tracking-id]`. Repeatable.
    #[arg(long = "ignore-paths")]
    pub ignore_paths: Vec<String>,

    /// Newline-delimited file of ignore-path expressions, merged with
    /// `--ignore-paths`
    #[arg(long)]
    pub ignore_paths_file: Option<PathBuf>,

    /// YAML map of `secretRef.name -> namespace` overrides for function
    /// credentials, for local testing without cluster Secret access
    #[arg(long)]
    pub function_credentials: Option<PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// External render command invoked once per render call, fed a JSON
    /// request on stdin and expected to print a JSON result on stdout
    /// (§6.1's render contract realized as a subprocess)
    #[arg(long, default_value = "crossplane-render-fn", env = "XDIFF_RENDER_COMMAND")]
    pub render_command: String,

    /// Extra arguments passed to `--render-command`
    #[arg(long = "render-arg")]
    pub render_args: Vec<String>,
}

/// Parse a simple "<number><unit>" duration string (`30s`, `1m`, `2h`),
/// matching the shape of `--timeout` the spec's §6.2 default uses.
fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split_at = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("invalid duration {input:?}: missing unit (s/m/h)"))?;
    let (number, unit) = input.split_at(split_at);
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration {input:?}: not a number"))?;
    let seconds = match unit {
        "s" => number,
        "m" => number * 60,
        "h" => number * 3600,
        other => return Err(format!("invalid duration unit {other:?}: expected s, m or h")),
    };
    Ok(Duration::from_secs(seconds))
}
