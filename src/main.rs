use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use pulpit::api::types::AnalyticsEvent;
use pulpit::cache::{KeyValueStorage, MemoryStorage, SqliteStorage};
use pulpit::{Config, ConnectivityState, PulpitClient};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pulpit")]
#[command(about = "Offline-capable client for church devotionals, sermons and announcements")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pulpit/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Treat the network as unavailable (serve cache, queue writes)
  #[arg(long)]
  offline: bool,

  /// Keep cache and queue in memory instead of the on-disk store
  #[arg(long)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List or fetch devotionals
  Devotionals {
    #[arg(long, conflicts_with_all = ["date", "featured"])]
    id: Option<String>,
    /// Devotional for a date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "featured")]
    date: Option<NaiveDate>,
    #[arg(long)]
    featured: bool,
  },
  /// List or fetch sermons
  Sermons {
    #[arg(value_enum)]
    kind: SermonArg,
    #[arg(long, conflicts_with_all = ["featured", "category"])]
    id: Option<String>,
    #[arg(long, conflicts_with = "category")]
    featured: bool,
    #[arg(long)]
    category: Option<String>,
  },
  /// List or fetch announcements
  Announcements {
    #[arg(long, conflicts_with = "active")]
    id: Option<String>,
    #[arg(long)]
    active: bool,
  },
  /// List or fetch categories
  Categories {
    #[arg(long)]
    id: Option<String>,
  },
  /// Record an analytics event
  Track {
    event: String,
    #[arg(long)]
    content_id: Option<String>,
    #[arg(long, default_value = "content")]
    content_type: String,
  },
  /// Replay writes queued while offline
  Sync,
  /// Show writes waiting for background sync
  Queue,
  /// Manage the response cache
  Cache {
    #[arg(value_enum)]
    action: CacheAction,
  },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SermonArg {
  Video,
  Audio,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CacheAction {
  /// Remove every cached response
  Clear,
  /// Remove expired cached responses
  Prune,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = pulpit::logging::init(pulpit::logging::default_log_dir().as_deref());

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let connectivity = ConnectivityState::new(!args.offline);

  if args.ephemeral {
    let client = PulpitClient::with_storage(&config, Arc::new(MemoryStorage::new()), connectivity)?;
    run(client, args.command).await
  } else {
    let client: PulpitClient<SqliteStorage> = PulpitClient::open(&config, connectivity)?;
    run(client, args.command).await
  }
}

async fn run<S: KeyValueStorage + 'static>(
  client: PulpitClient<S>,
  command: Command,
) -> Result<()> {
  match command {
    Command::Devotionals { id, date, featured } => {
      let api = client.devotionals();
      if let Some(id) = id {
        print_json(&api.get_by_id(&id).await?)
      } else if let Some(date) = date {
        print_json(&api.get_by_date(date).await?)
      } else if featured {
        print_json(&api.get_featured().await?)
      } else {
        print_json(&api.get_all().await?)
      }
    }
    Command::Sermons {
      kind,
      id,
      featured,
      category,
    } => {
      let api = match kind {
        SermonArg::Video => client.video_sermons(),
        SermonArg::Audio => client.audio_sermons(),
      };
      if let Some(id) = id {
        print_json(&api.get_by_id(&id).await?)
      } else if featured {
        print_json(&api.get_featured().await?)
      } else if let Some(category) = category {
        print_json(&api.get_by_category(&category).await?)
      } else {
        print_json(&api.get_all().await?)
      }
    }
    Command::Announcements { id, active } => {
      let api = client.announcements();
      if let Some(id) = id {
        print_json(&api.get_by_id(&id).await?)
      } else if active {
        print_json(&api.get_active().await?)
      } else {
        print_json(&api.get_all().await?)
      }
    }
    Command::Categories { id } => {
      let api = client.categories();
      match id {
        Some(id) => print_json(&api.get_by_id(&id).await?),
        None => print_json(&api.get_all().await?),
      }
    }
    Command::Track {
      event,
      content_id,
      content_type,
    } => {
      let mut event = AnalyticsEvent::new(event);
      if let Some(content_id) = content_id {
        event = event.with_content(content_type, content_id);
      }
      client.analytics().track(&event).await;
      Ok(())
    }
    Command::Sync => {
      if !client.connectivity().is_online() {
        return Err(eyre!("Cannot sync while offline"));
      }
      let report = client.sync_now().await?;
      println!(
        "replayed {}, dropped {} expired, {} still pending",
        report.replayed, report.expired, report.failed
      );
      Ok(())
    }
    Command::Queue => print_json(&client.transport().queue().items()?),
    Command::Cache { action } => {
      let cache = client
        .transport()
        .cache()
        .ok_or_else(|| eyre!("Response cache is disabled in config"))?;
      let removed = match action {
        CacheAction::Clear => cache.clear()?,
        CacheAction::Prune => cache.prune_expired()?,
      };
      println!("removed {} cached responses", removed);
      Ok(())
    }
  }
}

fn print_json(value: &impl Serialize) -> Result<()> {
  let out =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to format output: {}", e))?;
  println!("{}", out);
  Ok(())
}
