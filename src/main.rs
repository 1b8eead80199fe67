use ayah_echo::{
    app::{App, Collaborators},
    app_dirs::AppDirs,
    audio::ProcessAudio,
    config::{Config, ConfigStore, FileConfigStore},
    content::HttpContentSource,
    feedback::{FeedbackProvider, HttpFeedbackProvider},
    logging,
    runtime::{AppEvent, CrosstermEventSource, EventSource, FixedTicker, Runner, Ticker},
    stats::StatsDb,
    surahs,
    util::format_elapsed,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    sync::{mpsc::Sender, Arc},
    time::{Duration, Instant},
};

const TICK_RATE_MS: u64 = 100;
const HISTORY_LIMIT: usize = 20;

/// memorize the Quran verse by verse with repetition
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Plays a range of verses from a surah, repeating each verse and the whole range as many times as you ask. Flags override the saved settings for this run."
)]
pub struct Cli {
    /// surah number to practise
    #[clap(short = 's', long)]
    surah: Option<u32>,

    /// first verse of the range
    #[clap(long)]
    start: Option<u32>,

    /// last verse of the range (defaults to the end of the surah)
    #[clap(long)]
    end: Option<u32>,

    /// how many times each verse is played
    #[clap(short = 'a', long)]
    ayah_reps: Option<u32>,

    /// how many times the whole range is played
    #[clap(short = 'r', long)]
    surah_reps: Option<u32>,

    /// stop after every verse instead of moving on automatically
    #[clap(long)]
    no_autoplay: bool,

    /// pause between verses in milliseconds
    #[clap(long)]
    delay_ms: Option<u64>,

    /// audio player command, the verse URL is appended as the last argument
    #[clap(long)]
    player: Option<String>,

    /// endpoint that turns progress data into AI feedback
    #[clap(long)]
    feedback_endpoint: Option<String>,

    /// print recent sessions and exit
    #[clap(long)]
    history: bool,

    /// delete the recorded session history and exit
    #[clap(long, conflicts_with = "history")]
    clear_history: bool,
}

impl Cli {
    /// Layer the flags that were given over the saved settings
    fn apply(&self, mut config: Config) -> Config {
        if let Some(surah) = self.surah {
            if surah != config.surah_id {
                config.start_ayah = 1;
                config.end_ayah = None;
            }
            config.surah_id = surah;
        }
        if let Some(start) = self.start {
            config.start_ayah = start;
        }
        if self.end.is_some() {
            config.end_ayah = self.end;
        }
        if let Some(reps) = self.ayah_reps {
            config.ayah_repetitions = reps;
        }
        if let Some(reps) = self.surah_reps {
            config.surah_repetitions = reps;
        }
        if self.no_autoplay {
            config.autoplay = false;
        }
        if let Some(delay) = self.delay_ms {
            config.post_verse_delay_ms = delay;
        }
        if let Some(player) = &self.player {
            config.player = player.clone();
        }
        if self.feedback_endpoint.is_some() {
            config.feedback_endpoint = self.feedback_endpoint.clone();
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(path) = AppDirs::log_path() {
        if let Err(err) = logging::init(&path) {
            eprintln!("logging disabled: {err}");
        }
    }

    if cli.history {
        let db = StatsDb::new()?;
        return print_history(&db);
    }

    if cli.clear_history {
        let db = StatsDb::new()?;
        let removed = db.clear_all()?;
        info!("cleared {removed} recorded sessions");
        println!("Cleared {removed} recorded sessions.");
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    info!("starting with {config:?}");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let mut app = build_app(config, runner.sender());
    let result = run_tui(&mut terminal, &runner, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = store.save(app.config()) {
        warn!("failed to save config to {}: {err}", store.path().display());
    }

    result
}

fn build_app(config: Config, events: Sender<AppEvent>) -> App {
    let audio = ProcessAudio::new(&config.player, events.clone());
    let feedback = config
        .feedback_endpoint
        .clone()
        .map(|endpoint| {
            Arc::new(HttpFeedbackProvider::new(endpoint)) as Arc<dyn FeedbackProvider>
        });
    let stats = match StatsDb::new() {
        Ok(db) => Some(db),
        Err(err) => {
            warn!("session history disabled: {err}");
            None
        }
    };

    App::new(
        config,
        Collaborators {
            audio: Box::new(audio),
            content: Arc::new(HttpContentSource::new()),
            feedback,
            stats,
        },
        events,
    )
}

fn run_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    runner: &Runner<E, T>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        let event = runner.step();
        app.handle_event(event, Instant::now());

        if app.should_quit() {
            return Ok(());
        }
    }
}

fn print_history(db: &StatsDb) -> Result<(), Box<dyn Error>> {
    let recent = db.recent_sessions(HISTORY_LIMIT)?;
    if recent.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }

    for record in &recent {
        let name = surahs::find(record.surah_id).map_or("?", |s| s.english_name);
        println!(
            "{}  {:<12} {:>3}-{:<3} x{} x{}  {:>8}  {} mistakes  {}",
            record.finished_at.format("%Y-%m-%d %H:%M"),
            name,
            record.start_ayah,
            record.end_ayah,
            record.ayah_repetitions,
            record.surah_repetitions,
            format_elapsed(Duration::from_secs(record.elapsed_secs)),
            record.total_mistakes,
            record.outcome,
        );
    }

    let totals = db.totals()?;
    println!();
    println!(
        "{} sessions ({} completed), {} practised, {} mistakes",
        totals.sessions,
        totals.completed,
        format_elapsed(Duration::from_secs(totals.total_secs)),
        totals.total_mistakes
    );
    Ok(())
}
