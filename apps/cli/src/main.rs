#![deny(warnings)]

//! Headless CLI: loads a journal scenario, prints the month view and optionally
//! generates a story for one week.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use journal_calendar::{Clock, FixedClock, SystemClock};
use journal_core::{EngineConfig, Genre, UserId, WeekKey};
use novel_runtime::{GenerationRequest, MemoryStore, MonthView, NovelService, Seed};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct Args {
    scenario: Option<String>,
    config: Option<String>,
    user: Option<String>,
    month: Option<(i32, u32)>,
    today: Option<NaiveDate>,
    generate: Option<(u32, Genre)>,
    json: bool,
}

/// Scenario file: store contents plus who is looking and when.
#[derive(Debug, Default, Deserialize)]
struct Scenario {
    #[serde(default)]
    user: Option<UserId>,
    #[serde(default)]
    today: Option<NaiveDate>,
    #[serde(flatten)]
    seed: Seed,
}

fn parse_month(s: &str) -> Result<(i32, u32)> {
    let (y, m) = s
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got {s}"))?;
    Ok((y.parse()?, m.parse()?))
}

/// `<week>:<genre key>`, e.g. `2:romance`.
fn parse_generate(s: &str) -> Result<(u32, Genre)> {
    let (week, genre) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("expected WEEK:GENRE, got {s}"))?;
    let genre = Genre::from_key(genre).ok_or_else(|| anyhow!("unknown genre {genre}"))?;
    Ok((week.parse()?, genre))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = || it.next().ok_or_else(|| anyhow!("{arg} needs a value"));
        match arg.as_str() {
            "--scenario" => parsed.scenario = Some(value()?),
            "--config" => parsed.config = Some(value()?),
            "--user" => parsed.user = Some(value()?),
            "--month" => parsed.month = Some(parse_month(&value()?)?),
            "--today" => parsed.today = Some(value()?.parse()?),
            "--generate" => parsed.generate = Some(parse_generate(&value()?)?),
            "--json" => parsed.json = true,
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(parsed)
}

fn load_yaml<T: for<'de> Deserialize<'de> + Default>(path: Option<&str>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = std::fs::read_to_string(Path::new(path)).with_context(|| format!("reading {path}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {path}"))
}

fn print_view(view: &MonthView) {
    println!(
        "{}-{:02} | month: {}% | this week: {}/{} ({}%)",
        view.year,
        view.month,
        view.month_progress,
        view.current_week.filled_count,
        view.current_week.total,
        view.current_week.percent
    );
    for card in &view.weeks {
        let days: String = card
            .filled_days
            .iter()
            .map(|&filled| if filled { '#' } else { '.' })
            .collect();
        let genres: Vec<&str> = card.stories.keys().map(|g| g.label()).collect();
        println!(
            "  week {} {}..{} [{}] {:>3}% | {} | stories: {}",
            card.week.week_num,
            card.week.start,
            card.week.end,
            days,
            card.progress,
            card.action.label_key(),
            if genres.is_empty() {
                "-".to_string()
            } else {
                genres.join(", ")
            }
        );
    }
    for notice in &view.notices {
        println!("  notice: {notice:?}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(?args, "starting CLI");

    let config: EngineConfig = load_yaml(args.config.as_deref())?;
    let scenario: Scenario = load_yaml(args.scenario.as_deref())?;
    let clock: Arc<dyn Clock> = match args.today.or(scenario.today) {
        Some(date) => Arc::new(FixedClock(date)),
        None => Arc::new(SystemClock),
    };
    let user = args
        .user
        .map(UserId)
        .or(scenario.user)
        .unwrap_or_else(|| UserId("demo".into()));
    let today = clock.today();
    let (year, month) = args.month.unwrap_or((today.year(), today.month()));

    let store = Arc::new(MemoryStore::from_seed(scenario.seed, config.clone()));
    let service = NovelService::in_memory(store, clock, config);

    if let Some((week_num, genre)) = args.generate {
        let request = GenerationRequest {
            user: user.clone(),
            key: WeekKey::new(year, month, week_num)?,
            genre,
            title: String::new(),
        };
        let generated = service.generate(request).await?;
        println!(
            "generated {} \"{}\" using {:?}",
            generated.record.id, generated.record.title, generated.spent
        );
    }

    let view = service.month_view(&user, year, month).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }
    Ok(())
}
