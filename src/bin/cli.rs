use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf, absolute};
use std::process::ExitCode;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use clap::builder::styling::Styles;
use clap::{Args, ColorChoice, Parser, Subcommand, crate_version};
use clap_cargo::style::{ERROR, HEADER, INVALID, LITERAL, PLACEHOLDER, USAGE, VALID};
use regex::{Match, Regex};
use tracing::level_filters::LevelFilter;
use tracing::{Level, debug, enabled, error, info, instrument, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry, fmt};
use workoutfit::internal::profile_version_str;
use workoutfit::internal::report::{validation_report, workout_report};
use workoutfit::{
    BuildError, FitWorkoutOptions, Sport, WorkoutFitError, WorkoutPlan, build_workout,
    parse_fit_file, repair_fit_bytes, repaired_path, validate_fit_bytes, validate_fit_files,
};

pub const CLAP_STYLING: Styles = Styles::styled()
    .header(HEADER)
    .usage(USAGE)
    .literal(LITERAL)
    .placeholder(PLACEHOLDER)
    .error(ERROR)
    .valid(VALID)
    .invalid(INVALID);

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{} (FIT profile {}, rustc {})",
        crate_version!(),
        profile_version_str(),
        env!("RUSTC_VERSION"),
    )
});

/// Preview, validate and repair Garmin FIT workout files
///
/// Checks workout files for exercise categories a watch will refuse, and
/// rewrites them with valid ones so they can be copied to the device.
#[derive(Parser)]
#[command(
    name = "workoutfit",
    version,
    long_version = LONG_VERSION.as_str(),
    about,
    color = ColorChoice::Auto,
    styles = CLAP_STYLING,
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,

    /// Configure diagnostic logging level
    ///
    /// Set to DEBUG to see a performance summary following execution.
    #[clap(long, short = 'L', default_value_t = Level::ERROR)]
    log_level: Level,

    /// Log to a file
    #[clap(long)]
    log_file: Option<PathBuf>,
}

/// Encode a version number for FIT
///
/// Encodes the crate's version number at compilation into a 16-bit unsigned
/// integer that can be stashed in the FIT file_creator message, as base-10
/// digits: one for the major version, then two each for minor and patch.
fn encode_version_number() -> Result<u16> {
    let re = Regex::new(r"^(\d+)\.(\d+)\.(\d+)")?;

    fn part(s: Option<Match>) -> Result<u16> {
        let val = s
            .ok_or_else(|| anyhow!("Did not get a version part match"))?
            .as_str()
            .parse::<u16>()
            .map_err(|e| anyhow!("Couldn't parse version part as u16: {e}"))?;
        if val > 99 {
            bail!("Can't encode version part with more than two digits");
        }
        Ok(val)
    }

    let caps = re
        .captures(crate_version!())
        .ok_or_else(|| anyhow!("Crate version string didn't match regex"))?;
    let major = part(caps.get(1))?;
    if major > 5 {
        bail!("Can't encode major version {major}");
    }
    let minor = part(caps.get(2))?;
    let patch = part(caps.get(3))?;
    Ok(10000 * major + 100 * minor + patch)
}

fn fit_options(lap_button: bool) -> FitWorkoutOptions {
    FitWorkoutOptions::default()
        .with_lap_button(lap_button)
        .with_product_name("workoutfit".to_owned())
        .with_software_version(encode_version_number().unwrap_or_else(|e| {
            warn!("Unable to encode version number to FIT: {e}");
            0u16
        }))
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// FIT workout input path
    input: PathBuf,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// FIT workout input paths
    #[clap(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// FIT file output path
    #[clap(long, short)]
    output: Option<PathBuf>,

    /// Force overwriting the output file, if it already exists.
    #[clap(long, short, action)]
    force: bool,

    /// End every exercise and rest step with the lap button instead of a
    /// rep count or timer
    #[clap(long, action)]
    lap_button: bool,
}

#[derive(Args, Debug)]
struct RepairArgs {
    /// FIT workout input path
    ///
    /// Unless --output is given, the repaired workout is written to
    /// <INPUT>_repaired.fit in the same directory.
    input: PathBuf,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// JSON workout plan input path
    ///
    /// Unless --output is given, the workout is written to <INPUT>.fit in the
    /// same directory.
    input: PathBuf,

    #[command(flatten)]
    out: OutputArgs,

    /// Sport to be designated for the workout, overriding the plan's.
    #[clap(long, short = 'p')]
    sport: Option<Sport>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a workout's steps
    ///
    /// Files that cannot be fully decoded still show whatever text could be
    /// recovered from them.
    Preview(PreviewArgs),

    /// Check workouts for values a watch will reject
    ///
    /// Exits with a non-zero status if any file is invalid.
    Validate(ValidateArgs),

    /// Rewrite a workout with valid exercise categories
    Repair(RepairArgs),

    /// Encode a JSON workout plan as a FIT workout
    Build(BuildArgs),
}

/// A command's printable report and whether it succeeded.
struct Outcome {
    report: String,
    success: bool,
}

impl From<String> for Outcome {
    fn from(report: String) -> Self {
        Self {
            report,
            success: true,
        }
    }
}

fn write_output(output: &Path, force: bool, bytes: &[u8]) -> Result<()> {
    if ((force && enabled!(Level::WARN)) || (!force && enabled!(Level::ERROR))) && output.exists()
    {
        if force {
            warn!("Output file exists and will be overwritten: {:?}", output);
        } else {
            error!(
                "Output file already exists and may not be overwritten: {:?}",
                output
            );
        }
    }
    let mut w = BufWriter::new(
        if force {
            File::create(output)
        } else {
            File::create_new(output)
        }
        .context("Creating the <OUTPUT> file. Use --force to replace an existing file.")?,
    );
    w.write_all(bytes)
        .and_then(|_| w.flush())
        .context(concat!(
            "Writing the FIT output to the filesystem. Ensure the output path exists and ",
            "that you have access permissions to write there."
        ))?;
    info!("Created FIT output file: {:?}", absolute(output)?);
    Ok(())
}

fn output_note(r: &mut String, output: &Path) -> Result<()> {
    writeln!(
        r,
        "\nOutput is in {}",
        absolute(output)
            .unwrap_or(output.to_path_buf())
            .to_string_lossy()
    )?;
    Ok(())
}

#[instrument(level = "trace", skip_all)]
fn preview_cmd(sub_args: &PreviewArgs) -> Result<Outcome> {
    debug!("preview args: {:?}", sub_args);

    let model = parse_fit_file(&sub_args.input).ok_or_else(|| {
        anyhow!(
            "Could not read {:?}. It may be missing, empty or not a workout file.",
            sub_args.input
        )
    })?;
    Ok(workout_report(&model).into())
}

#[instrument(level = "trace", skip_all)]
fn validate_cmd(sub_args: &ValidateArgs) -> Result<Outcome> {
    debug!("validate args: {:?}", sub_args);

    let results = validate_fit_files(sub_args.inputs.as_slice());
    let mut report = String::new();
    for (path, result) in sub_args.inputs.iter().zip(&results) {
        report.push_str(&validation_report(&path.to_string_lossy(), result));
    }
    Ok(Outcome {
        report,
        success: results.iter().all(|r| r.valid),
    })
}

#[instrument(level = "trace", skip_all)]
fn repair_cmd(sub_args: &RepairArgs) -> Result<Outcome> {
    debug!("repair args: {:?}", sub_args);

    let bytes = std::fs::read(&sub_args.input)
        .context("Opening the FIT <INPUT> file. Check that it exists and can be accessed.")?;
    info!("Read FIT input file: {:?}", absolute(&sub_args.input)?);
    let before = validate_fit_bytes(&bytes);

    let res = repair_fit_bytes(&bytes, fit_options(sub_args.out.lap_button));
    let repaired = match &res {
        Err(WorkoutFitError::Format(_)) => res.context(concat!(
            "The <INPUT> could not be decoded as a FIT file, so it cannot be repaired. ",
            "Try the preview command to see what can be recovered from it."
        )),
        _ => res.map_err(anyhow::Error::from),
    }?;

    let output = match &sub_args.out.output {
        Some(p) => p.clone(),
        None => repaired_path(&sub_args.input),
    };
    write_output(&output, sub_args.out.force, &repaired)?;

    let mut report = validation_report("Before", &before);
    report.push_str(&validation_report("After", &validate_fit_bytes(&repaired)));
    output_note(&mut report, &output)?;
    Ok(report.into())
}

#[instrument(level = "trace", skip_all)]
fn build_cmd(sub_args: &BuildArgs) -> Result<Outcome> {
    debug!("build args: {:?}", sub_args);

    let json = std::fs::read_to_string(&sub_args.input)
        .context("Opening the plan <INPUT> file. Check that it exists and can be accessed.")?;
    let mut plan: WorkoutPlan = serde_json::from_str(&json)
        .context("The <INPUT> is not a valid JSON workout plan. Check that it is correct.")?;
    if let Some(sport) = sub_args.sport {
        plan.sport = Some(sport);
    }

    let res = build_workout(&plan, fit_options(sub_args.out.lap_button));
    let bytes = match &res {
        Err(BuildError::UnrecognizedReps(_)) => res.context(concat!(
            "A reps value in the plan could not be understood. Use a count such as 10, ",
            "a time such as \"45s\" or a distance such as \"400m\"."
        )),
        Err(BuildError::ZeroSets(_)) => {
            res.context("Every exercise in the plan needs at least one set.")
        }
        _ => res.map_err(anyhow::Error::from),
    }?;

    let output = match &sub_args.out.output {
        Some(p) => p.clone(),
        None => sub_args.input.with_extension("fit"),
    };
    write_output(&output, sub_args.out.force, &bytes)?;

    let mut report = format!(
        "Encoded {} exercises from {:?}\n",
        plan.exercise_count(),
        plan.title
    );
    output_note(&mut report, &output)?;
    Ok(report.into())
}

fn main() -> Result<ExitCode> {
    // Intentionally avoid wrapping argument parsing errors in anyhow::Result so
    // we preserve Clap's pretty formatting of usage info.
    let args = Cli::parse();

    let log_w: Box<dyn std::io::Write + Send> = match &args.log_file {
        Some(path) => Box::new(File::create(path).context("Creating the log file")?),
        None => Box::new(std::io::stderr()),
    };
    let (appender, _guard) = tracing_appender::non_blocking(log_w);

    // Enable the TRACE-level span tree layer for fmt logging level DEBUG.
    let fmt_layer = fmt::Layer::new()
        .with_writer(appender)
        .with_ansi(args.log_file.is_none())
        .with_target(false)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE)
        .with_filter(LevelFilter::from_level(args.log_level));
    if args.log_level >= Level::DEBUG {
        let span_tree_layer = tracing_span_tree::SpanTree::default().aggregate(true);
        tracing::subscriber::set_global_default(
            Registry::default().with(fmt_layer).with(span_tree_layer),
        )?;
    } else {
        tracing::subscriber::set_global_default(Registry::default().with(fmt_layer))?;
    }

    debug!("workoutfit {}", clap::crate_version!());

    let outcome = match &args.cmd {
        Commands::Preview(sub_args) => preview_cmd(sub_args),
        Commands::Validate(sub_args) => validate_cmd(sub_args),
        Commands::Repair(sub_args) => repair_cmd(sub_args),
        Commands::Build(sub_args) => build_cmd(sub_args),
    }?;

    print!("{}", outcome.report);
    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
