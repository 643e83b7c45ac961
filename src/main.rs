use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, error, info, warn};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use streetfind::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, Difficulty, FileConfigStore},
    engine::{Effect, GameError},
    game::{Game, PlayError},
    geo::{BoundingBox, LatLon},
    history::{GameLog, GameSummary, HISTORY_FILE},
    leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardKind, MAX_NAME_CHARS},
    pool::{CandidatePool, Target},
    runtime::{Command, FixedTicker, LineEventSource, Runner, RuntimeEvent},
    session::{GameSession, GameState, TimeoutPolicy},
    source::{
        Anchor, DistrictSelection, DistrictSet, OverpassFileSource, SearchArea, SourceError,
        StreetSource, DEFAULT_CENTER,
    },
    store::{open_store, StoreBackend},
};

const TICK_RATE_MS: u64 = 100;

/// find named streets and districts on the map, scored by distance and speed
#[derive(Parser, Debug)]
#[command(name = "streetfind", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// directory for leaderboards and the game log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// where leaderboards are stored
    #[arg(long, value_enum, global = true)]
    store: Option<StoreBackend>,

    /// more logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// play a game
    Play(PlayArgs),
    /// show the top scores
    Leaderboard {
        #[arg(short, long, value_enum, default_value_t = LeaderboardKind::Districts)]
        kind: LeaderboardKind,
    },
    /// list the districts that can be played or selected
    Districts {
        /// GeoJSON district outlines instead of the bundled ones
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
    /// print the Overpass query that fetches the streets of an area
    Query(AreaArgs),
    /// show finished games
    History,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
enum Mode {
    /// guess where each district is
    Districts,
    /// guess where each street is
    Streets,
}

#[derive(Args, Debug, Clone, Default)]
struct AreaArgs {
    /// center of the search circle, as lat,lon
    #[arg(long)]
    center: Option<LatLon>,

    /// search radius in meters (500-5000)
    #[arg(short, long)]
    radius: Option<u32>,

    /// play area district, may be repeated; replaces the circle
    #[arg(short = 'd', long = "district")]
    districts: Vec<String>,

    /// GeoJSON district outlines instead of the bundled ones
    #[arg(long)]
    geojson: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct PlayArgs {
    #[arg(value_enum, default_value_t = Mode::Districts)]
    mode: Mode,

    #[command(flatten)]
    area: AreaArgs,

    /// saved Overpass API response with the streets of the area
    #[arg(long)]
    overpass_file: Option<PathBuf>,

    /// number of rounds
    #[arg(short = 'n', long)]
    rounds: Option<u32>,

    /// seconds per round
    #[arg(short = 's', long)]
    round_secs: Option<u32>,

    /// seconds the answer stays on screen
    #[arg(long)]
    result_secs: Option<u64>,

    #[arg(long, value_enum)]
    difficulty: Option<Difficulty>,

    /// what a timeout does with a placed guess
    #[arg(long, value_enum)]
    timeout_policy: Option<TimeoutPolicy>,

    /// point of a district to find
    #[arg(long, value_enum)]
    anchor: Option<Anchor>,

    /// fixed target order
    #[arg(long)]
    seed: Option<u64>,
}

impl PlayArgs {
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(n) = self.rounds {
            cfg.total_rounds = n;
        }
        if let Some(s) = self.round_secs {
            cfg.round_secs = s;
        }
        if let Some(s) = self.result_secs {
            cfg.result_display_secs = s;
        }
        if let Some(d) = self.difficulty {
            cfg.difficulty = d;
        }
        if let Some(p) = self.timeout_policy {
            cfg.timeout_policy = p;
        }
        if let Some(a) = self.anchor {
            cfg.district_anchor = a;
        }
        if let Some(r) = self.area.radius {
            cfg.search_radius_m = r;
        }
    }

    fn leaderboard_kind(&self) -> LeaderboardKind {
        match self.mode {
            Mode::Districts => LeaderboardKind::Districts,
            Mode::Streets if self.area.districts.is_empty() => LeaderboardKind::Streets,
            Mode::Streets => LeaderboardKind::DistrictStreets,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_store = match &cli.config {
        Some(p) => FileConfigStore::with_path(p),
        None => FileConfigStore::new(),
    };
    let mut config = config_store.load();
    if let Some(backend) = cli.store {
        config.store = backend;
    }
    let data_dir = cli.data_dir.clone().unwrap_or_else(AppDirs::data_dir);
    debug!("config {}, data in {}", config_store.path().display(), data_dir.display());

    match &cli.command {
        Commands::Play(args) => {
            args.apply_to(&mut config);
            play(args, &config, &data_dir)
        }
        Commands::Leaderboard { kind } => {
            let board = Leaderboard::new(open_store(config.store, &data_dir)?, *kind);
            println!("{kind} leaderboard");
            print_leaderboard(board.entries());
            Ok(())
        }
        Commands::Districts { geojson } => {
            let set = load_districts(geojson.as_deref())?;
            for d in set.iter() {
                match d.anchor(config.district_anchor) {
                    Some(at) => println!("{:<24} {at}", d.name),
                    None => println!("{}", d.name),
                }
            }
            Ok(())
        }
        Commands::Query(area) => {
            let mut selection = DistrictSelection::new();
            let area = search_area(area, config.search_radius_m, &mut selection)?;
            info!("send this to {}", streetfind::source::overpass::OVERPASS_ENDPOINT);
            print!("{}", area.overpass_query());
            Ok(())
        }
        Commands::History => {
            let log = GameLog::with_path(data_dir.join(HISTORY_FILE));
            for g in log.read_all()? {
                let avg = g
                    .avg_distance_km
                    .map(|d| format!("{d:.2} km"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<9} {:>2}/{:<2} guessed  {:>5} pts  avg {avg}",
                    g.date.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    g.mode,
                    g.guessed,
                    g.rounds,
                    g.score
                );
            }
            Ok(())
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn load_districts(geojson: Option<&Path>) -> Result<DistrictSet, SourceError> {
    match geojson {
        Some(path) => DistrictSet::from_geojson(&std::fs::read_to_string(path)?),
        None => DistrictSet::bundled(),
    }
}

/// Circle around `--center`, or the selected districts when any are named
fn search_area(
    args: &AreaArgs,
    default_radius_m: u32,
    selection: &mut DistrictSelection,
) -> Result<SearchArea, SourceError> {
    if args.districts.is_empty() {
        let center = args.center.unwrap_or(DEFAULT_CENTER);
        return Ok(SearchArea::circle(
            center,
            args.radius.unwrap_or(default_radius_m),
        ));
    }

    let set = load_districts(args.geojson.as_deref())?;
    for name in &args.districts {
        if set.get(name).is_some() {
            selection.select(name);
        } else {
            warn!("unknown district {name}");
        }
    }
    SearchArea::districts(selection.resolve(&set))
}

/// Targets and the bounds shown on easy difficulty
fn load_targets(
    args: &PlayArgs,
    config: &Config,
) -> Result<(Vec<Target>, Option<BoundingBox>), SourceError> {
    match args.mode {
        Mode::Districts => {
            let mut set = load_districts(args.area.geojson.as_deref())?;
            if !args.area.districts.is_empty() {
                let mut selection = DistrictSelection::new();
                for name in &args.area.districts {
                    if set.get(name).is_some() {
                        selection.select(name);
                    } else {
                        warn!("unknown district {name}");
                    }
                }
                let picked = selection.resolve(&set);
                if picked.is_empty() {
                    return Err(SourceError::NoDistrictsSelected);
                }
                set = DistrictSet::from_districts(picked);
            }
            Ok((set.targets(config.district_anchor), set.bounding_box()))
        }
        Mode::Streets => {
            let path = args
                .overpass_file
                .as_ref()
                .ok_or(SourceError::NoStreetData)?;
            let mut selection = DistrictSelection::new();
            let area = search_area(&args.area, config.search_radius_m, &mut selection)?;
            let streets = OverpassFileSource::with_path(path).fetch_streets(&area)?;
            let bounds = area
                .bounding_boxes()
                .into_iter()
                .reduce(|a, b| a.union(&b));
            Ok((streets, bounds))
        }
    }
}

fn play(args: &PlayArgs, config: &Config, data_dir: &Path) -> Result<(), Box<dyn Error>> {
    let (targets, bounds) = load_targets(args, config).map_err(|e| {
        eprintln!("Error fetching data: {e}");
        e
    })?;

    let session_config = config.session_config();
    let pool = CandidatePool::new(targets);
    let session = match args.seed {
        Some(seed) => GameSession::seeded(session_config, pool, seed),
        None => GameSession::new(session_config, pool),
    };
    let kind = args.leaderboard_kind();
    let board = Leaderboard::new(open_store(config.store, data_dir)?, kind);
    let mut game = Game::new(session, board);
    let log = GameLog::with_path(data_dir.join(HISTORY_FILE));

    let mut screen = Screen {
        difficulty: config.difficulty,
        bounds,
        last_shown_secs: None,
    };

    match game.start(Instant::now()) {
        Ok(effects) => screen.show(&game, &effects),
        Err(PlayError::Game(e @ GameError::PoolTooSmall { .. })) => {
            eprintln!("{e}. Pick a larger area or fewer rounds.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    }

    let runner = Runner::new(
        LineEventSource::stdin(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        let effects = match runner.step() {
            RuntimeEvent::Tick => game.poll(Instant::now())?,
            RuntimeEvent::Input(Command::Quit) => {
                game.reset(Instant::now())?;
                println!("Bye!");
                return Ok(());
            }
            RuntimeEvent::Input(input) => match handle_input(&mut game, input) {
                Ok(effects) => effects,
                Err(PlayError::Game(e)) => {
                    println!("{e}");
                    Vec::new()
                }
                Err(e @ PlayError::Store(_)) => {
                    error!("{e}");
                    println!("{e}; enter your name to try again");
                    Vec::new()
                }
            },
        };

        for effect in &effects {
            if let Effect::GameFinished { .. } = effect {
                let summary =
                    GameSummary::from_rounds(args.mode.to_string(), game.session().history(), Utc::now());
                if let Err(e) = log.append(&summary) {
                    warn!("could not log the game: {e}");
                }
            }
        }
        screen.show(&game, &effects);

        if effects.iter().any(|e| matches!(e, Effect::RecordScore(_))) {
            return Ok(());
        }
    }
}

fn handle_input<S: streetfind::store::KeyValueStore>(
    game: &mut Game<S>,
    input: Command,
) -> Result<Vec<Effect>, PlayError> {
    let now = Instant::now();
    match (game.session().state(), input) {
        (GameState::Playing, Command::Guess(at)) => game.submit_guess(Some(at), now),
        (GameState::Playing, Command::Text(_)) if game.session().is_showing_result() => {
            Ok(Vec::new())
        }
        (GameState::Playing, Command::Text(_)) => {
            println!("Type your guess as lat,lon (for example 60.4518,22.2666)");
            Ok(Vec::new())
        }
        (GameState::Finished, Command::Text(name)) => game.submit_score(&name, now),
        (GameState::Finished, Command::Guess(_)) => {
            println!("Enter your name (max {MAX_NAME_CHARS} characters)");
            Ok(Vec::new())
        }
        _ => Ok(Vec::new()),
    }
}

/// Line-oriented presentation of engine effects
struct Screen {
    difficulty: Difficulty,
    bounds: Option<BoundingBox>,
    last_shown_secs: Option<u32>,
}

impl Screen {
    fn show<S: streetfind::store::KeyValueStore>(&mut self, game: &Game<S>, effects: &[Effect]) {
        let session = game.session();
        for effect in effects {
            match effect {
                Effect::RoundStarted { round, target } => {
                    println!();
                    println!(
                        "Round {round}/{}: find {} ({}s)",
                        session.total_rounds(),
                        target.name,
                        session.config().round_secs
                    );
                    if let (Difficulty::Easy, Some(b)) = (self.difficulty, self.bounds) {
                        println!(
                            "  play area: lat {:.4} to {:.4}, lon {:.4} to {:.4}",
                            b.south, b.north, b.west, b.east
                        );
                    }
                    self.last_shown_secs = Some(session.config().round_secs);
                }
                Effect::RoundResolved(record) => {
                    let r = record.result;
                    if record.guess.is_some() {
                        println!(
                            "{} is at {}, {:.2} km away: {} + {} time = {} points (total {})",
                            record.target.name,
                            record.target.location,
                            r.distance_km,
                            r.distance_points,
                            r.time_points,
                            r.round_score,
                            session.score()
                        );
                    } else {
                        println!(
                            "Time's up! {} is at {}. 0 points (total {})",
                            record.target.name,
                            record.target.location,
                            session.score()
                        );
                    }
                }
                Effect::GameFinished { score } => {
                    println!();
                    println!("Game over! Final score: {score}");
                    if let Some(rank) = game.leaderboard().rank_of(*score) {
                        println!("That makes #{rank} on the leaderboard.");
                    }
                    println!("Enter your name (max {MAX_NAME_CHARS} characters):");
                }
                Effect::RecordScore(entry) => {
                    println!("Saved {} points for {}", entry.score, entry.name);
                    print_leaderboard(game.last_saved().unwrap_or(game.leaderboard().entries()));
                }
                _ => {}
            }
        }

        let secs = session.time_remaining_secs();
        let counting = session.state() == GameState::Playing && !session.is_showing_result();
        if counting && self.last_shown_secs != Some(secs) {
            self.last_shown_secs = Some(secs);
            if secs > 0 && (secs % 10 == 0 || secs <= 5) {
                println!("  {secs}s left");
            }
        }
    }
}

fn print_leaderboard(entries: &[LeaderboardEntry]) {
    if entries.is_empty() {
        println!("  no scores yet");
        return;
    }
    for (i, e) in entries.iter().enumerate() {
        println!(
            "{:>3}. {:<15} {:>5}  {}",
            i + 1,
            e.name,
            e.score,
            e.date.with_timezone(&Local).format("%Y-%m-%d")
        );
    }
}
