//! # Digest Curator
//!
//! Command-line entry point. Loads `config.yaml`, overlays secrets from flags
//! or the environment, and dispatches one subcommand.
//!
//! ## Usage
//!
//! ```sh
//! digest_curator ingest
//! digest_curator candidates
//! digest_curator promote --quota 2
//! digest_curator push
//! digest_curator weekly
//! digest_curator tools list --featured
//! digest_curator serve
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::error::Error;

use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use digest_curator::cli::{Cli, Command, ToolCommand};
use digest_curator::config::Config;
use digest_curator::digest::{DigestService, PushStatus};
use digest_curator::error::CurationError;
use digest_curator::http::build_client;
use digest_curator::models::ToolCandidate;
use digest_curator::notify::notifiers_from_config;
use digest_curator::scheduler;
use digest_curator::store::{ArchiveOutcome, ArchiveQuery, ToolQuery};
use digest_curator::utils::{ensure_writable_dir, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    debug!(config = %args.config.display(), command = ?args.command, "Parsed CLI arguments");

    let mut config = Config::load(&args.config);
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    args.secrets.apply(&mut config.notify);
    config.validate()?;

    if let Err(e) = ensure_writable_dir(&config.data_dir).await {
        error!(
            path = %config.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client = build_client(config.sources.request_timeout())?;
    let notifiers = notifiers_from_config(&config.notify, &client);
    let service = DigestService::new(config, client.clone(), notifiers);

    if let Err(e) = dispatch(args.command, &service, &client).await {
        error!(error = %e, status = e.status_code(), "Command failed");
        return Err(e.into());
    }
    Ok(())
}

async fn dispatch(
    command: Command,
    service: &DigestService,
    client: &reqwest::Client,
) -> Result<(), CurationError> {
    let curator = service.curator();

    match command {
        Command::Ingest => {
            let added = service.ingest_all().await?;
            println!("added {added} candidates");
        }
        Command::Candidates => {
            for (keyword, views) in curator.grouped_candidates() {
                println!("## {keyword} ({})", views.len());
                for view in views {
                    let mark = if view.is_archived { "[archived] " } else { "" };
                    println!("- {mark}{}\n  {}", view.item.title(), view.item.url());
                }
            }
        }
        Command::Accept { url } => {
            curator.accept(&url)?;
            println!("accepted {url}");
        }
        Command::Reject { url } => {
            curator.reject(&url)?;
            println!("rejected {url}");
        }
        Command::Archive {
            url,
            category,
            tags,
            tools,
            from_pool,
        } => {
            let outcome = if from_pool {
                curator.archive_from_pool(&url, category, &tags, &tools)?
            } else {
                curator.archive_candidate(&url, category, &tags, &tools)?
            };
            match outcome {
                ArchiveOutcome::Archived { id } => {
                    println!("archived {url} as {category} #{id}");
                    if let Err(e) = service.update_weekly().await {
                        warn!(error = %e, "Weekly report not updated");
                    }
                }
                ArchiveOutcome::AlreadyArchived => println!("already archived: {url}"),
            }
        }
        Command::Add { url } => {
            let (item, added) = curator.add_manual(client, &url).await?;
            if added {
                println!("added {} ({})", item.title(), item.url());
            } else {
                println!("already in main pool: {}", item.url());
            }
        }
        Command::Promote { quota } => {
            let quota = quota.unwrap_or(service.config().schedule.promote_per_keyword);
            let report = curator.promote(quota, &mut rand::rng())?;
            println!(
                "promoted {} candidates; {} remain",
                report.promoted, report.remaining
            );
        }
        Command::Push => match service.push().await?.check()? {
            PushStatus::Sent { count, channels } => {
                println!("pushed {count} items via {}", channels.join(", "))
            }
            other => println!("not pushed: {other:?}"),
        },
        Command::Query {
            category,
            tag,
            tool,
            search,
            sort,
            page,
            page_size,
        } => {
            let query = ArchiveQuery {
                category,
                tag,
                tool,
                search,
                sort_by: sort,
                page,
                page_size,
            };
            let (items, total) = curator.archive().query(&query);
            info!(total, returned = items.len(), "Archive query");
            print_json(&items)?;
        }
        Command::View { url } => {
            if !curator.record_view(&url)? {
                return Err(CurationError::not_found(url));
            }
            println!("recorded view of {}", truncate_for_log(&url, 120));
        }
        Command::IsArchived { url } => {
            println!("{}", curator.is_archived(&url));
        }
        Command::Weekly => match service.update_weekly().await {
            Ok(path) => println!("wrote {}", path.display()),
            Err(e) => {
                return Err(CurationError::store_write(
                    service.config().weekly_dir(),
                    std::io::Error::other(e.to_string()),
                ));
            }
        },
        Command::Tools { command } => dispatch_tools(command, service)?,
        Command::Serve => scheduler::run(service).await,
    }
    Ok(())
}

fn dispatch_tools(command: ToolCommand, service: &DigestService) -> Result<(), CurationError> {
    let tools = service.tools();

    match command {
        ToolCommand::List {
            category,
            featured,
            search,
            sort,
            page,
            page_size,
        } => {
            let query = ToolQuery {
                category,
                featured: featured.then_some(true),
                search,
                sort_by: sort,
                page,
                page_size,
            };
            let (items, total) = tools.list(&query);
            info!(total, returned = items.len(), "Tool query");
            print_json(&items)?;
        }
        ToolCommand::Show { key } => {
            let tool = tools.find(&key).ok_or_else(|| CurationError::not_found(key))?;
            print_json(&tool)?;
        }
        ToolCommand::Articles { key, page, page_size } => {
            let identifier = tools.find(&key).map_or(key, |t| t.key());
            let query = ArchiveQuery {
                tool: Some(identifier),
                page,
                page_size,
                ..ArchiveQuery::default()
            };
            let (items, total) = service.curator().archive().query(&query);
            info!(total, returned = items.len(), "Tool articles");
            print_json(&items)?;
        }
        ToolCommand::Submit {
            name,
            url,
            description,
            category,
            tags,
            submitted_by,
        } => {
            let mut candidate = ToolCandidate::new(name, url, category);
            candidate.description = description;
            candidate.tags = tags;
            candidate.submitted_by = submitted_by;
            let url = candidate.url.clone();
            if tools.submit(candidate)? {
                println!("submitted {url}");
            } else {
                println!("already queued or catalogued: {url}");
            }
        }
        ToolCommand::Candidates => {
            for c in tools.candidates() {
                println!("- {} [{}]\n  {}", c.name, c.category, c.url);
            }
        }
        ToolCommand::Accept { url, category } => match tools.accept(&url, category.as_deref())? {
            Some(tool) => println!("accepted {} as {} #{}", tool.name, tool.identifier, tool.id),
            None => println!("already in the catalog: {url}"),
        },
        ToolCommand::Reject { url } => {
            tools.reject(&url)?;
            println!("rejected {url}");
        }
        ToolCommand::View { key } => {
            if !tools.increment_view_count(&key)? {
                return Err(CurationError::not_found(key));
            }
            println!("recorded view of {key}");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CurationError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| CurationError::Config(e.to_string()))?;
    println!("{json}");
    Ok(())
}
