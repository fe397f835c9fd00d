#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use datapress_model::{ContainerId, DatasetId, UserId};
use datapress_publish::{
    demo_draft, BaselineValidator, DraftRepository, LocalRegistrar, Publisher, PublisherConfig,
    PublisherDeps, SqliteRegistry, StatusStore, DEFAULT_IDENTIFIER_PREFIX,
};
use datapress_store::{LocalFsStore, Namespace, ObjectStore, StoreErrorCode};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "datapress")]
#[command(about = "Datapress registry and publishing operations CLI")]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, default_value_t = false)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one publish attempt against a local store and registry.
    Publish {
        #[arg(long, default_value = "artifacts/registry.db")]
        db: PathBuf,
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "artifacts/draft-store")]
        draft_root: PathBuf,
        #[arg(long, default_value = "artifacts/published-store")]
        published_root: PathBuf,
        #[arg(long, default_value = DEFAULT_IDENTIFIER_PREFIX)]
        identifier_prefix: String,
        #[arg(long, default_value_t = false)]
        skip_validation: bool,
    },
    /// Print the publishing status row for a dataset.
    Status {
        #[arg(long, default_value = "artifacts/registry.db")]
        db: PathBuf,
        #[arg(long)]
        dataset: String,
    },
    /// Seed a publishable demo draft with files into the draft store.
    SeedDemo {
        #[arg(long, default_value = "artifacts/registry.db")]
        db: PathBuf,
        #[arg(long, default_value = "ds-demo")]
        dataset: String,
        #[arg(long, default_value = "demo-container")]
        container: String,
        #[arg(long, default_value = "demo-user")]
        user: String,
        #[arg(long, default_value = "artifacts/draft-store")]
        draft_root: PathBuf,
        #[arg(long, default_value = "artifacts/published-store")]
        published_root: PathBuf,
    },
    /// Dump registry counters and status rows straight from sqlite.
    InspectDb {
        #[arg(long)]
        db: PathBuf,
    },
}

struct PublishCliArgs {
    db: PathBuf,
    dataset: String,
    user: String,
    draft_root: PathBuf,
    published_root: PathBuf,
    identifier_prefix: String,
    skip_validation: bool,
}

struct SeedDemoArgs {
    db: PathBuf,
    dataset: String,
    container: String,
    user: String,
    draft_root: PathBuf,
    published_root: PathBuf,
}

const DEMO_FILES: &[(&str, &[u8])] = &[
    (
        "participants.csv",
        b"participant_id,age,sex\np-001,54,F\np-002,61,M\np-003,58,F\n",
    ),
    (
        "measurements/acuity_scores.csv",
        b"participant_id,eye,logmar\np-001,od,0.18\np-001,os,0.22\np-002,od,0.30\n",
    ),
    ("images/fundus_001.png", b"\x89PNG\r\n\x1a\nplaceholder"),
    ("images/fundus_002.png", b"\x89PNG\r\n\x1a\nplaceholder"),
];

fn main() -> ProcessExitCode {
    match run() {
        Ok(()) => ProcessExitCode::from(datapress_core::ExitCode::Success as u8),
        Err(err) => {
            eprintln!("{err}");
            ProcessExitCode::from(datapress_core::ExitCode::Failure as u8)
        }
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Publish {
            db,
            dataset,
            user,
            draft_root,
            published_root,
            identifier_prefix,
            skip_validation,
        } => run_publish(
            PublishCliArgs {
                db,
                dataset,
                user,
                draft_root,
                published_root,
                identifier_prefix,
                skip_validation,
            },
            cli.json,
            cli.quiet,
        ),
        Commands::Status { db, dataset } => run_status(db, &dataset, cli.json),
        Commands::SeedDemo {
            db,
            dataset,
            container,
            user,
            draft_root,
            published_root,
        } => seed_demo(
            SeedDemoArgs {
                db,
                dataset,
                container,
                user,
                draft_root,
                published_root,
            },
            cli.quiet,
        ),
        Commands::InspectDb { db } => inspect_db(db),
    }
}

fn run_publish(args: PublishCliArgs, machine_json: bool, quiet: bool) -> Result<(), String> {
    let dataset = DatasetId::parse(&args.dataset).map_err(|e| e.to_string())?;
    let user = UserId::parse(&args.user).map_err(|e| e.to_string())?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime.block_on(async move {
        let store: Arc<dyn ObjectStore> = Arc::new(
            LocalFsStore::new(args.draft_root, args.published_root).map_err(|e| e.to_string())?,
        );
        let registry = Arc::new(SqliteRegistry::open(&args.db).map_err(|e| e.to_string())?);
        let publisher = Publisher::new(
            PublisherDeps {
                store,
                drafts: registry.clone(),
                status: registry.clone(),
                published: registry,
                validator: Arc::new(BaselineValidator),
                registrar: Arc::new(LocalRegistrar::new(args.identifier_prefix)),
            },
            &PublisherConfig {
                skip_metadata_validation: args.skip_validation,
                ..PublisherConfig::default()
            },
        );
        let receipt = publisher
            .start_publish(&dataset, &user)
            .await
            .map_err(|e| e.to_string())?;
        if machine_json {
            println!(
                "{}",
                serde_json::to_string(&receipt).map_err(|e| e.to_string())?
            );
        } else if quiet {
            println!("{}", receipt.identifier);
        } else {
            println!("published id: {}", receipt.published_id);
            println!("identifier: {}", receipt.identifier);
            println!("container: {}", receipt.container_id);
            println!("files copied: {}", receipt.files_copied);
        }
        Ok(())
    })
}

fn run_status(db: PathBuf, dataset: &str, machine_json: bool) -> Result<(), String> {
    let dataset = DatasetId::parse(dataset).map_err(|e| e.to_string())?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime.block_on(async move {
        let registry = SqliteRegistry::open(&db).map_err(|e| e.to_string())?;
        let status = registry
            .get(&dataset)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("no publishing status recorded for `{dataset}`"))?;
        if machine_json {
            println!(
                "{}",
                serde_json::to_string(&status).map_err(|e| e.to_string())?
            );
        } else {
            println!("stage: {}", status.stage);
            if !status.comment.is_empty() {
                println!("comment: {}", status.comment);
            }
            if status.file_count > 0 {
                println!(
                    "progress: {} of {} files",
                    status.current_file_number, status.file_count
                );
            }
            println!("updated_at: {}", status.updated_at);
        }
        Ok(())
    })
}

fn seed_demo(args: SeedDemoArgs, quiet: bool) -> Result<(), String> {
    let dataset = DatasetId::parse(&args.dataset).map_err(|e| e.to_string())?;
    let container = ContainerId::parse(&args.container).map_err(|e| e.to_string())?;
    let user = UserId::parse(&args.user).map_err(|e| e.to_string())?;
    let runtime = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
    runtime.block_on(async move {
        let store = LocalFsStore::new(args.draft_root, args.published_root)
            .map_err(|e| e.to_string())?;
        match store.create_container(Namespace::Draft, &container).await {
            Ok(()) => {}
            Err(err) if err.code == StoreErrorCode::AlreadyExists => {}
            Err(err) => return Err(err.to_string()),
        }
        for (path, bytes) in DEMO_FILES {
            store
                .create_file(Namespace::Draft, &container, path)
                .await
                .map_err(|e| e.to_string())?;
            store
                .write_file(Namespace::Draft, &container, path, bytes)
                .await
                .map_err(|e| e.to_string())?;
        }
        let registry = SqliteRegistry::open(&args.db).map_err(|e| e.to_string())?;
        registry
            .put(&demo_draft(&dataset, &container, &user))
            .await
            .map_err(|e| e.to_string())?;
        if !quiet {
            println!(
                "seeded draft `{dataset}` with {} files in container `{container}`",
                DEMO_FILES.len()
            );
        }
        Ok(())
    })
}

fn inspect_db(db: PathBuf) -> Result<(), String> {
    let conn = Connection::open(db).map_err(|e| e.to_string())?;
    let schema_version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    println!("schema_version={schema_version}");

    let drafts: i64 = conn
        .query_row("SELECT COUNT(*) FROM drafts", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    println!("draft_count={drafts}");

    let published: i64 = conn
        .query_row("SELECT COUNT(*) FROM published_datasets", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    println!("published_count={published}");

    let mut stmt = conn
        .prepare(
            "SELECT dataset_id, stage, comment, updated_at FROM publishing_status ORDER BY dataset_id",
        )
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .map_err(|e| e.to_string())?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    println!(
        "status_rows={}",
        serde_json::to_string(&rows).map_err(|e| e.to_string())?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_args(dir: &std::path::Path) -> SeedDemoArgs {
        SeedDemoArgs {
            db: dir.join("registry.db"),
            dataset: "ds-demo".to_string(),
            container: "demo-container".to_string(),
            user: "demo-user".to_string(),
            draft_root: dir.join("draft-store"),
            published_root: dir.join("published-store"),
        }
    }

    #[test]
    fn seed_publish_status_inspect_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        seed_demo(seed_args(dir.path()), true).expect("seed");
        // Reseeding must tolerate the existing container.
        seed_demo(seed_args(dir.path()), true).expect("reseed");

        run_publish(
            PublishCliArgs {
                db: dir.path().join("registry.db"),
                dataset: "ds-demo".to_string(),
                user: "demo-user".to_string(),
                draft_root: dir.path().join("draft-store"),
                published_root: dir.path().join("published-store"),
                identifier_prefix: DEFAULT_IDENTIFIER_PREFIX.to_string(),
                skip_validation: false,
            },
            false,
            true,
        )
        .expect("publish");

        run_status(dir.path().join("registry.db"), "ds-demo", true).expect("status");
        inspect_db(dir.path().join("registry.db")).expect("inspect");
    }

    #[test]
    fn status_for_an_unknown_dataset_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_status(dir.path().join("registry.db"), "ds-none", false)
            .expect_err("no status row");
        assert!(err.contains("no publishing status recorded"));
    }

    #[test]
    fn non_member_user_cannot_publish() {
        let dir = tempfile::tempdir().expect("tempdir");
        seed_demo(seed_args(dir.path()), true).expect("seed");
        let err = run_publish(
            PublishCliArgs {
                db: dir.path().join("registry.db"),
                dataset: "ds-demo".to_string(),
                user: "mallory".to_string(),
                draft_root: dir.path().join("draft-store"),
                published_root: dir.path().join("published-store"),
                identifier_prefix: DEFAULT_IDENTIFIER_PREFIX.to_string(),
                skip_validation: false,
            },
            false,
            true,
        )
        .expect_err("non-member publish must fail");
        assert!(err.contains("ds-demo"));
    }
}
