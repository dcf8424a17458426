use roster::{DispatchConfig, DispatchInput, DispatchReport, Engine, Level};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Roster(roster::Error),
    Json(serde_json::Error),
    BadOverride(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Roster(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::BadOverride(raw) => {
                write!(f, "invalid --set value `{raw}` (expected key=value)")
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<roster::Error> for CliError {
    fn from(value: roster::Error) -> Self {
        Self::Roster(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Dispatch,
    Check,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    config: Option<String>,
    overrides: Vec<(String, Value)>,
    pretty: bool,
    sorted: bool,
}

fn usage() -> &'static str {
    "roster-cli\n\
\n\
USAGE:\n\
  roster-cli [dispatch] [OPTIONS] [--pretty] [--sorted] [<path>|-]\n\
  roster-cli check [OPTIONS] [<path>|-]\n\
\n\
OPTIONS:\n\
  --config <file>        JSON config merged onto the defaults\n\
  --set <key>=<value>    override one config value (repeatable)\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - dispatch prints the report as JSON; --sorted lists members in display order.\n\
  - check loads the input and prints load diagnostics without assigning anyone.\n\
  - --set values are parsed as JSON when possible, otherwise taken as strings.\n\
  - Set ROSTER_LOG (e.g. ROSTER_LOG=debug) to control log output on stderr.\n\
"
}

fn parse_override(raw: &str) -> Result<(String, Value), CliError> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(CliError::BadOverride(raw.to_string()));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::BadOverride(raw.to_string()));
    }
    let value = serde_json::from_str::<Value>(value.trim())
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "dispatch" => args.command = Command::Dispatch,
            "check" => args.command = Command::Check,
            "--pretty" => args.pretty = true,
            "--sorted" => args.sorted = true,
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--set" => {
                let Some(raw) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.overrides.push(parse_override(raw)?);
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn load_config(args: &Args) -> Result<DispatchConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => DispatchConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => DispatchConfig::default(),
    };
    for (key, value) in &args.overrides {
        config = config.with_override(key, value.clone())?;
    }
    Ok(config)
}

fn sort_members(report: &mut DispatchReport) {
    for class in &mut report.classes {
        for group in &mut class.groups {
            let ordered = group.roster_order().into_iter().cloned().collect();
            group.members = ordered;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ROSTER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<(), CliError> {
    let engine = Engine::new().with_config(load_config(&args)?);
    let text = read_input(args.input.as_deref())?;
    let input: DispatchInput = serde_json::from_str(&text)?;

    match args.command {
        Command::Dispatch => {
            let mut report = engine.dispatch(&input)?;
            if args.sorted {
                sort_members(&mut report);
            }
            write_json(&report, args.pretty)
        }
        Command::Check => {
            let diagnostics = engine.check(&input)?;
            for d in diagnostics.iter() {
                println!("{d}");
            }
            println!(
                "{} leaders, {} candidates, {} warnings",
                input.leaders.len(),
                input.candidates.len(),
                diagnostics.count(Level::Warning)
            );
            Ok(())
        }
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    init_tracing();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
