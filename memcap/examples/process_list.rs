/// Prints the process table of an os assembled from plugins.
///
/// `cargo run --example process_list -- -c dummy:size=16m -o dummy:procs=5`
///
/// With `--process <name>` the modules of that process are listed instead.
use clap::{crate_authors, crate_version, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

use memcap::prelude::v1::*;

const LEVELS: [LevelFilter; 5] = [
    LevelFilter::Error,
    LevelFilter::Warn,
    LevelFilter::Info,
    LevelFilter::Debug,
    LevelFilter::Trace,
];

fn main() -> Result<()> {
    let matches = command().get_matches();

    let verbosity = usize::from(matches.get_count("verbose")).min(LEVELS.len() - 1);
    simplelog::TermLogger::init(
        LEVELS[verbosity],
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .map_err(|_| Error(ErrorOrigin::Other, ErrorKind::Configuration))?;

    let inventory = match matches.get_one::<String>("plugins") {
        Some(dir) => Inventory::scan_path(dir)?,
        None => Inventory::scan(),
    };
    let mut os = inventory.builder().os_chain(chain(&matches)?).build()?;

    match matches.get_one::<String>("process") {
        Some(name) => print_modules(os.into_process_by_name(name)?),
        None => print_processes(&mut os),
    }
}

fn command() -> Command {
    Command::new("process_list")
        .version(crate_version!())
        .author(crate_authors!())
        .arg(Arg::new("verbose").short('v').action(ArgAction::Count))
        .arg(Arg::new("plugins").long("plugins").short('p'))
        .arg(
            Arg::new("connector")
                .long("connector")
                .short('c')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("os")
                .long("os")
                .short('o')
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(Arg::new("process").long("process"))
}

/// Pairs every `-c`/`-o` value with its position on the command line.
fn positioned<'a>(matches: &'a ArgMatches, id: &str) -> Vec<(usize, &'a str)> {
    match (matches.indices_of(id), matches.get_many::<String>(id)) {
        (Some(indices), Some(values)) => indices.zip(values.map(String::as_str)).collect(),
        _ => Vec::new(),
    }
}

fn chain(matches: &ArgMatches) -> Result<OsChain<'_>> {
    OsChain::new(
        positioned(matches, "connector").into_iter(),
        positioned(matches, "os").into_iter(),
    )
}

fn print_processes(os: &mut OsInstance) -> Result<()> {
    println!("{:>6}  {:<10} {:<10} {:<10} NAME", "PID", "STATE", "SYS", "PROC");
    for info in os.process_info_list()? {
        let state = match info.state {
            ProcessState::Alive => "alive".to_string(),
            ProcessState::Dead(code) => format!("exit {}", code),
            ProcessState::Unknown => "?".to_string(),
        };
        println!(
            "{:>6}  {:<10} {:<10} {:<10} {} [{}]",
            info.pid,
            state,
            info.sys_arch.to_string(),
            info.proc_arch.to_string(),
            info.name,
            info.command_line
        );
    }
    Ok(())
}

fn print_modules(mut process: IntoProcessInstance) -> Result<()> {
    let pid = process.info().pid;
    for module in process.module_list()? {
        println!(
            "{:>6}  {:#018x} {:#10x} {}",
            pid,
            module.base.to_umem(),
            module.size,
            module.name
        );
    }
    Ok(())
}
