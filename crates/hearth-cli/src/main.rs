mod commands;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use hearth_engine::{Direction, ViewKind, WeekStartDay};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(version, about = "Inspect recurrence rules, move events in and out of .ics, and compute view windows")]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an RRULE and print its canonical form and structure
    Rrule {
        /// e.g. "FREQ=WEEKLY;BYDAY=MO,WE,FR" (an "RRULE:" prefix is fine)
        text: String,

        /// Zone for floating and date-only UNTIL values
        #[arg(long)]
        tz: Option<String>,
    },
    /// Read an .ics file and print the events it contains as JSON
    Import {
        /// Path to the .ics file, or "-" for stdin
        file: String,

        /// Zone for all-day and floating times (IANA name)
        #[arg(long, default_value = "UTC")]
        tz: String,

        /// Calendar id given to the imported events
        #[arg(long, default_value = "imported")]
        calendar: String,
    },
    /// Expand every event of an .ics file over a date range
    Expand {
        /// Path to the .ics file, or "-" for stdin
        file: String,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the range, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,

        /// Zone the dates and the events' wall clocks are read in
        #[arg(long, default_value = "UTC")]
        tz: String,

        /// Cap on occurrences per event
        #[arg(long, default_value_t = hearth_engine::DEFAULT_MAX_INSTANCES)]
        max: usize,
    },
    /// Render a JSON calendar export ({"calendar": .., "events": [..]}) as .ics
    Export {
        /// Path to the JSON file, or "-" for stdin
        file: String,

        /// Timestamp for DTSTAMP (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Print the visible window of a calendar view
    Range {
        #[arg(long, value_enum)]
        view: ViewArg,

        /// Day the view is anchored on (YYYY-MM-DD)
        #[arg(long)]
        anchor: NaiveDate,

        #[arg(long, value_enum, default_value_t = WeekStartArg::Monday)]
        week_start: WeekStartArg,

        /// Move the anchor one view-length before computing the window
        #[arg(long, value_enum)]
        step: Option<StepArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Day,
    Week,
    Month,
    Year,
    Agenda,
}

impl From<ViewArg> for ViewKind {
    fn from(v: ViewArg) -> Self {
        match v {
            ViewArg::Day => ViewKind::Day,
            ViewArg::Week => ViewKind::Week,
            ViewArg::Month => ViewKind::Month,
            ViewArg::Year => ViewKind::Year,
            ViewArg::Agenda => ViewKind::Agenda,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum WeekStartArg {
    Monday,
    Sunday,
}

impl From<WeekStartArg> for WeekStartDay {
    fn from(w: WeekStartArg) -> Self {
        match w {
            WeekStartArg::Monday => WeekStartDay::Monday,
            WeekStartArg::Sunday => WeekStartDay::Sunday,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StepArg {
    Next,
    Prev,
}

impl From<StepArg> for Direction {
    fn from(s: StepArg) -> Self {
        match s {
            StepArg::Next => Direction::Next,
            StepArg::Prev => Direction::Prev,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Rrule { text, tz } => commands::rrule(&text, tz.as_deref()),
        Commands::Import { file, tz, calendar } => commands::import(&file, &tz, &calendar),
        Commands::Expand {
            file,
            from,
            to,
            tz,
            max,
        } => commands::expand(&file, from, to, &tz, max),
        Commands::Export { file, now } => commands::export(&file, now.unwrap_or_else(Utc::now)),
        Commands::Range {
            view,
            anchor,
            week_start,
            step,
        } => commands::range(view.into(), anchor, week_start.into(), step.map(Into::into)),
    }
}
