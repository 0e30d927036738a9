use clap::{command, Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use solb::plan::Plan;
use solb::validate::Validate;
use std::path::Path;
use std::{
    io,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use mimalloc::MiMalloc;

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[macro_use]
extern crate clap;

const PATH: &str = "PATH";
const TOOLS_VERSION: &str = "tools-version";
const SKIP_INVALID: &str = "skip-invalid";
const PATH_DESCR: &str = "Sets solution (.sln) or solution filter (.slnf) path";

fn main() {
    let app = build_cli();
    let matches = app.get_matches();

    init_logging(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("plan", cmd)) => plan(cmd),
        Some(("validate", cmd)) => validate(cmd),
        Some(("completion", cmd)) => print_completions(cmd),
        _ => {}
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("solb=debug,solm=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("solb=info,solm=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();
}

fn plan(cmd: &ArgMatches) {
    let properties = cmd.get_many::<String>("property").unwrap_or_default();
    let properties = match solb::parse_properties(properties) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(exitcode::USAGE);
        }
    };
    let targets = cmd
        .get_many::<String>("target")
        .unwrap_or_default()
        .flat_map(|t| t.split([';', ',']))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect();
    let json = cmd.get_flag("json");

    let mut consumer = Plan::new(
        properties,
        cmd.get_one::<String>(TOOLS_VERSION).cloned(),
        targets,
        cmd.get_flag(SKIP_INVALID),
        json,
    );
    let now = Instant::now();
    if let Some(path) = cmd.get_one::<String>(PATH) {
        solb::open_path(Path::new(path), &mut consumer);
    }
    if !json {
        print_elapsed(now);
    }
    if let Some(code) = consumer.failure {
        std::process::exit(code);
    }
}

fn validate(cmd: &ArgMatches) {
    let only_problems = cmd.get_flag("problems");

    let mut consumer = Validate::new(only_problems);
    let now = Instant::now();
    if let Some(path) = cmd.get_one::<String>(PATH) {
        solb::open_path(Path::new(path), &mut consumer);
    }
    print_elapsed(now);
    if let Some(code) = consumer.failure {
        std::process::exit(code);
    }
    if consumer.problems_found && cmd.get_flag("fail") {
        std::process::exit(exitcode::DATAERR);
    }
}

fn print_elapsed(now: Instant) {
    let duration = now.elapsed().as_millis();
    let duration = Duration::from_millis(u64::try_from(duration).unwrap_or(u64::MAX));
    println!("{:>2} {}", "elapsed:", humantime::format_duration(duration));
}

fn print_completions(matches: &ArgMatches) {
    let mut cmd = build_cli();
    let bin_name = cmd.get_name().to_string();
    if let Some(generator) = matches.get_one::<Shell>("generator") {
        generate(*generator, &mut cmd, bin_name, &mut io::stdout());
    }
}

fn build_cli() -> Command {
    command!(crate_name!())
        .arg_required_else_help(true)
        .version(crate_version!())
        .author(crate_authors!("\n"))
        .about(crate_description!())
        .arg(
            arg!(-v --verbose)
                .required(false)
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output debug diagnostics to stderr"),
        )
        .subcommand(
            Command::new("plan")
                .aliases(["pl", "build"])
                .about(
                    "Synthesizes the project that builds solution and prints target execution plan",
                )
                .arg(arg!([PATH]).help(PATH_DESCR).required(true))
                .arg(
                    arg!(-p --property <PROPERTY>)
                        .required(false)
                        .action(ArgAction::Append)
                        .help("Global property in Name=Value form. Several may be separated by ;"),
                )
                .arg(
                    arg!(-t --target <TARGET>)
                        .required(false)
                        .action(ArgAction::Append)
                        .help("Target to execute. Build by default"),
                )
                .arg(
                    Arg::new(TOOLS_VERSION)
                        .long(TOOLS_VERSION)
                        .value_name("VERSION")
                        .required(false)
                        .help("Tools version override forwarded to every project"),
                )
                .arg(
                    Arg::new(SKIP_INVALID)
                        .long(SKIP_INVALID)
                        .required(false)
                        .action(ArgAction::SetTrue)
                        .help("Warn instead of failing when solution configuration is invalid"),
                )
                .arg(
                    arg!(-j --json)
                        .required(false)
                        .action(ArgAction::SetTrue)
                        .help("Print synthesized project as JSON"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .aliases(["va"])
                .about("Validates solution or solution filter specified")
                .arg(arg!([PATH]).help(PATH_DESCR).required(true))
                .arg(
                    arg!(-p --problems)
                        .required(false)
                        .action(ArgAction::SetTrue)
                        .help("Show only problems. Correct solution will not be shown."),
                )
                .arg(
                    arg!(-f --fail)
                        .required(false)
                        .action(ArgAction::SetTrue)
                        .help("Return not zero exit code if problems found"),
                ),
        )
        .subcommand(
            Command::new("completion")
                .about("Generate the autocompletion script for the specified shell")
                .arg(
                    arg!([generator])
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .index(1),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn plan_arguments() {
        // Arrange
        let cli = build_cli();

        // Act
        let matches = cli
            .try_get_matches_from([
                "solb",
                "plan",
                "-p",
                "Configuration=Release",
                "-t",
                "Clean;Build",
                "--tools-version",
                "15.0",
                "--skip-invalid",
                "app.sln",
            ])
            .unwrap();

        // Assert
        let (name, cmd) = matches.subcommand().unwrap();
        assert_eq!(name, "plan");
        assert_eq!(cmd.get_one::<String>(PATH).unwrap(), "app.sln");
        assert_eq!(cmd.get_one::<String>(TOOLS_VERSION).unwrap(), "15.0");
        assert_eq!(cmd.get_many::<String>("property").unwrap().count(), 1);
        assert!(cmd.get_flag(SKIP_INVALID));
        assert!(!cmd.get_flag("json"));
    }
}
