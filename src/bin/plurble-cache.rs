//! this binary replays recorded phone messages into a persisted frontable cache, and
//! inspects or deletes that cache.
//! to see the list of commands, type: `plurble-cache --help`

use std::env::current_dir;
use std::fs;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg_enum, crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use plurble_cache::{
    persist_delete, CacheError, FrontableCache, InboundMessage, LogEngine, PersistEngine, Result,
    SledEngine, SyncHandler,
};
use serde_json::Deserializer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Engine {
        log,
        sled
    }
}

const DEFAULT_ENGINE: Engine = Engine::log;
// the name, file stem, of the "engine" file
const DEFAULT_ENGINE_FILE: &str = "engine";

/// the action requested on the command line
#[derive(Debug)]
enum Action {
    /// replay messages from a file, or stdin for "-"
    Replay(String),
    Show,
    Delete,
}

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    data_dir: PathBuf,
    engine: Engine,
    action: Action,
}

impl Opt {
    /// validates the `data_dir` and `requested_engine` parameters
    /// # Errors
    /// returns [`CacheError::Parsing`] if the requested engine differs from the one the data
    /// dir was created with
    fn build(data_dir: PathBuf, req_engine: Engine, action: Action) -> Result<Opt> {
        let engine = match current_engine(&data_dir)? {
            None => req_engine,
            Some(cur_engine) if req_engine == cur_engine => cur_engine,
            Some(cur_engine) => {
                return Err(CacheError::Parsing(format!(
                    "the requested engine: {} does not match the engine currently in use: {}",
                    req_engine, cur_engine
                )))
            }
        };
        Ok(Opt {
            data_dir,
            engine,
            action,
        })
    }
}

fn main() {
    let matches = App::new("plurble-cache")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("replay, inspect and delete a persisted frontable cache")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .global(true)
                .takes_value(true)
                .help("directory holding the persisted cache, defaults to the current dir"),
        )
        .arg(
            Arg::with_name("engine")
                .long("engine")
                .value_name("ENGINE_NAME")
                .global(true)
                .takes_value(true)
                .possible_values(&Engine::variants())
                .help("sets the storage engine to use, either 'log' or 'sled'"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("log everything down to TRACE level"),
        )
        .subcommand(
            SubCommand::with_name("replay")
                .about("applies a stream of JSON encoded phone messages, then stores the cache")
                .arg(
                    Arg::with_name("MESSAGES")
                        .help("file of JSON messages, '-' for stdin")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(SubCommand::with_name("show").about("prints the stored cache"))
        .subcommand(SubCommand::with_name("delete").about("deletes the stored cache"))
        .get_matches();

    let verbose = matches.is_present("verbose")
        || matches.subcommand().1.map_or(false, |sub| sub.is_present("verbose"));
    subscriber_config(verbose);

    let opt = match parse_opt(&matches) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    if let Err(e) = run(opt) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn parse_opt(matches: &ArgMatches) -> Result<Opt> {
    // global args may be given before or after the subcommand
    let sub = matches.subcommand().1;
    let value_of = |name: &str| sub.and_then(|s| s.value_of(name)).or_else(|| matches.value_of(name));

    let data_dir = match value_of("data-dir") {
        Some(dir) => PathBuf::from(dir),
        None => current_dir()?,
    };
    let req_engine = match value_of("engine") {
        Some(name) => name.parse::<Engine>().map_err(CacheError::Parsing)?,
        None => DEFAULT_ENGINE,
    };
    let action = match matches.subcommand() {
        ("replay", Some(sub)) => Action::Replay(sub.value_of("MESSAGES").unwrap_or("-").to_owned()),
        ("show", _) => Action::Show,
        ("delete", _) => Action::Delete,
        (other, _) => return Err(CacheError::Parsing(format!("unknown command: {}", other))),
    };
    Opt::build(data_dir, req_engine, action)
}

fn run(opt: Opt) -> Result<()> {
    info!("plurble-cache {}", env!("CARGO_PKG_VERSION"));
    info!("Storage engine: {}", opt.engine);
    info!("Data dir: {:?}", opt.data_dir);

    fs::create_dir_all(&opt.data_dir)?;
    fs::write(opt.data_dir.join(DEFAULT_ENGINE_FILE), format!("{}", opt.engine))?;

    match opt.engine {
        Engine::log => run_with_engine(LogEngine::open(&opt.data_dir)?, opt.action),
        Engine::sled => run_with_engine(SledEngine::open(&opt.data_dir.join("sled"))?, opt.action),
    }
}

fn run_with_engine<E: PersistEngine>(mut engine: E, action: Action) -> Result<()> {
    match action {
        Action::Replay(source) => {
            let mut cache = FrontableCache::new();
            if !cache.persist_load(&engine)? {
                info!("no stored cache, starting empty");
            }
            let reader: Box<dyn Read> = if source == "-" {
                Box::new(io::stdin())
            } else {
                Box::new(File::open(&source)?)
            };
            replay(&mut cache, BufReader::new(reader))?;
            cache.persist_store(&mut engine)?;
            print_cache(&cache);
        }
        Action::Show => {
            let mut cache = FrontableCache::new();
            if cache.persist_load(&engine)? {
                print_cache(&cache);
            } else {
                println!("nothing stored");
            }
        }
        Action::Delete => {
            persist_delete(&mut engine)?;
            println!("deleted");
        }
    }
    Ok(())
}

/// Feeds every message in `reader` to a fresh [`SyncHandler`]. A malformed fragment is logged
/// and skipped, the same way the watch drops it.
fn replay<R: Read>(cache: &mut FrontableCache, reader: R) -> Result<()> {
    let mut handler = SyncHandler::new();
    for msg in Deserializer::from_reader(reader).into_iter::<InboundMessage>() {
        let msg = msg?;
        match handler.receive(cache, &msg) {
            Ok(events) => {
                for event in events {
                    info!(?event, "loaded");
                }
            }
            Err(e) => error!("dropping message: {}", e),
        }
    }
    if !handler.frontables_loaded() {
        warn!("replay finished without a complete frontable transfer");
    }
    Ok(())
}

fn print_cache(cache: &FrontableCache) {
    println!("members: {}", cache.get_members().len());
    for f in cache.get_members() {
        println!("  {:08x} {} ({}) {}", f.hash, f.name(), f.pronouns(), f.color().name());
    }
    println!("custom fronts: {}", cache.get_custom_fronts().len());
    for f in cache.get_custom_fronts() {
        println!("  {:08x} {} {}", f.hash, f.name(), f.color().name());
    }
    println!("current fronters: {}", cache.get_current_fronters().len());
    for f in cache.current_fronters() {
        println!("  {:08x} {}", f.hash, f.name());
    }
    println!("groups: {}", cache.get_groups().len());
    for (id, group) in cache.get_groups().iter() {
        let parent = group
            .parent
            .and_then(|p| cache.get_groups().get(p))
            .map(|p| p.name())
            .unwrap_or("-");
        println!(
            "  {} {} parent={} members={}",
            id.0,
            group.name(),
            parent,
            group.members.len()
        );
    }
}

/// determines if there is an "engine" file in `data_dir` and returns the value of that file
///
/// returns `Ok(None)` if an "engine" file does not (yet) exist or holds an unknown engine
fn current_engine(data_dir: &Path) -> Result<Option<Engine>> {
    let engine = data_dir.join(DEFAULT_ENGINE_FILE);
    if !engine.exists() {
        return Ok(None);
    }

    match fs::read_to_string(engine)?.parse() {
        Ok(engine) => Ok(Some(engine)),
        Err(e) => {
            // file is corrupted or invalid contents
            warn!("The content of the engine file is invalid: {}", e);
            Ok(None)
        }
    }
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config(verbose: bool) {
    let level = if verbose { Level::TRACE } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting tracing default subscriber failed: {}", e);
    }
}
