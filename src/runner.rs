use std::path::Path;
use std::str::FromStr;

use clap::{Args, Command, FromArgMatches as _};

use crate::context::Context;
use crate::error::IxaError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::log::{enable_logging, set_log_level, LevelFilter};
use crate::random::ContextRandomExt;
use crate::scenario::Parameters;

/// Default cli arguments for the crossborder runner
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Optional path for a scenario config file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Enable logging at this level (error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Args)]
pub struct PlaceholderCustom {}

fn create_cli() -> Command {
    let cli = Command::new("crossborder");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with custom cli arguments.
///
/// # Parameters
/// - `setup_fn`: A function that takes a mutable reference to a `Context`, a `BaseArgs` struct,
///   and an `Option<A>` where A is the custom cli arguments struct
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    A: Args,
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), IxaError>,
{
    let mut cli = create_cli();
    cli = A::augment_args(cli);
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    let custom_matches = A::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, Some(custom_matches), setup_fn)
}

/// Runs a simulation with default cli arguments.
///
/// Logging, the scenario config and the random seed are set up from the
/// arguments before `setup_fn` runs. `setup_fn` drives execution itself, for
/// example with [`ContextScenarioExt::run_scenario`](crate::scenario::ContextScenarioExt::run_scenario).
///
/// # Errors
/// Returns an error if argument parsing or the setup function fails
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<PlaceholderCustom>) -> Result<(), IxaError>,
{
    let cli = create_cli();
    let matches = cli.get_matches();

    let base_args_matches = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(base_args_matches, None, setup_fn)
}

fn run_with_args_internal<A, F>(
    args: BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, BaseArgs, Option<A>) -> Result<(), IxaError>,
{
    if let Some(level) = &args.log_level {
        let level = LevelFilter::from_str(level)
            .map_err(|_| IxaError::config(format!("unknown log level {level}")))?;
        enable_logging();
        set_log_level(level);
    }

    let mut context = Context::new();

    // Optionally load the scenario from a file
    if !args.config.is_empty() {
        let config_path = Path::new(&args.config);
        context.load_global_property(Parameters, config_path)?;
    }

    context.init_random(args.random_seed);

    setup_fn(&mut context, args, custom_args)?;

    Ok(context)
}
