use std::fmt;

use cmi_core::hacp;
use cmi_core::model::{Entry, LessonStatus, SessionState};
use cmi_core::time::cmi_timespan;
use lms_services::{Clock, LaunchParams, open_session};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFile,
    UnknownArg(String),
    InvalidScore { raw: String },
    MissingAiccLaunch,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFile => write!(f, "inspect requires a file"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidScore { raw } => write!(f, "invalid --score value: {raw}"),
            ArgsError::MissingAiccLaunch => {
                write!(f, "aicc requires --url and --sid (or LMS_AICC_URL and LMS_AICC_SID)")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- inspect <hacp_response_file> [--json]");
    eprintln!(
        "  cargo run -p app -- aicc [--url <url>] [--sid <id>] [--status <status>] \
         [--score <n>] [--location <loc>] [--suspend-data <data>]"
    );
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LMS_AICC_URL, LMS_AICC_SID, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Inspect,
    Aicc,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "inspect" => Some(Self::Inspect),
            "aicc" => Some(Self::Aicc),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct InspectArgs {
    file: String,
    json: bool,
}

impl InspectArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut file = None;
        let mut json = false;
        for arg in args {
            match arg.as_str() {
                "--json" => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") || file.is_some() => {
                    return Err(ArgsError::UnknownArg(arg));
                }
                _ => file = Some(arg),
            }
        }
        let file = file.ok_or(ArgsError::MissingFile)?;
        Ok(Self { file, json })
    }
}

/// Session fields as decoded from an HACP body, for `inspect --json`.
#[derive(Debug, Serialize)]
struct SessionSnapshot<'a> {
    accepted: bool,
    lesson_status: Option<LessonStatus>,
    entry: Entry,
    lesson_location: &'a str,
    score: i64,
    total_time: String,
    student_id: &'a str,
    student_name: &'a str,
    mastery_score: &'a str,
    suspend_data: &'a str,
}

impl<'a> SessionSnapshot<'a> {
    fn new(accepted: bool, state: &'a SessionState) -> Self {
        Self {
            accepted,
            lesson_status: state.lesson_status(),
            entry: state.entry(),
            lesson_location: state.lesson_location_or_default(),
            score: state.score(),
            total_time: cmi_timespan(state.total_time()),
            student_id: state.student_id(),
            student_name: state.student_name(),
            mastery_score: state.mastery_score(),
            suspend_data: state.suspend_data(),
        }
    }
}

#[derive(Debug, Default)]
struct AiccArgs {
    launch: LaunchParams,
    status: Option<String>,
    score: Option<i64>,
    location: Option<String>,
    suspend_data: Option<String>,
}

impl AiccArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            launch: LaunchParams::from_env(),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--url" => parsed.launch.aicc_url = Some(require_value(args, "--url")?),
                "--sid" => parsed.launch.aicc_sid = Some(require_value(args, "--sid")?),
                "--status" => parsed.status = Some(require_value(args, "--status")?),
                "--score" => {
                    let value = require_value(args, "--score")?;
                    let score = value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ArgsError::InvalidScore { raw: value.clone() })?;
                    parsed.score = Some(score);
                }
                "--location" => parsed.location = Some(require_value(args, "--location")?),
                "--suspend-data" => {
                    parsed.suspend_data = Some(require_value(args, "--suspend-data")?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if parsed.launch.aicc_config().is_none() {
            return Err(ArgsError::MissingAiccLaunch);
        }
        Ok(parsed)
    }
}

fn inspect(args: &InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(&args.file)?;
    let response = hacp::parse(&raw);

    if args.json {
        let mut state = SessionState::new();
        response.apply(&mut state);
        let snapshot = SessionSnapshot::new(response.is_success(), &state);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let top = response.top();
    println!("error:      {}", top.error.as_deref().unwrap_or("-"));
    println!("error_text: {}", top.error_text.as_deref().unwrap_or("-"));
    println!("accepted:   {}", response.is_success());
    for section in response.sections() {
        println!("[{}]", section.name());
        for line in section.lines() {
            println!("  {line}");
        }
    }

    let mut state = SessionState::new();
    response.apply(&mut state);
    println!();
    println!(
        "lesson_status:   {}",
        state.lesson_status().map_or("-", LessonStatus::as_str)
    );
    println!("entry:           {}", state.entry());
    println!("lesson_location: {}", state.lesson_location_or_default());
    println!("score:           {}", state.score());
    println!("total_time:      {}", cmi_timespan(state.total_time()));
    println!("student:         {} ({})", state.student_name(), state.student_id());
    println!("mastery_score:   {}", state.mastery_score());
    println!("suspend_data:    {}", state.suspend_data());
    Ok(())
}

async fn run_aicc(args: AiccArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(&args.launch, None, Clock::default_clock()).await?;
    let adapter = session.adapter_mut();
    info!(
        student_id = %adapter.student_id()?,
        status = ?adapter.lesson_status()?,
        "AICC session opened"
    );

    if let Some(status) = &args.status {
        adapter.set_lesson_status(status)?;
    }
    if let Some(score) = args.score {
        adapter.set_score(score)?;
    }
    if let Some(location) = &args.location {
        adapter.set_lesson_location(location)?;
    }
    if let Some(data) = &args.suspend_data {
        adapter.set_suspend_data(data)?;
    }

    let committed = adapter.commit().await?;
    let finished = adapter.finish().await?;
    println!("committed: {committed}");
    println!("finished:  {finished}");
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first.clone())
        })?,
    };

    match cmd {
        Command::Inspect => {
            let args = InspectArgs::parse(&mut argv).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            inspect(&args)
        }
        Command::Aicc => {
            let args = AiccArgs::parse(&mut argv).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            run_aicc(args).await
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run().await {
        // Binary glue: report once and exit.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
