//! Command-line entry point for the document store.
//!
//! # Responsibility
//! - Bootstrap configuration, logging, database, write pipeline and service.
//! - Run one document operation and print the response as JSON.
//!
//! # Invariants
//! - The write pipeline is always drained before the process exits.

use docstore_core::{
    core_version, init_logging, parse_timestamp, ping, spawn_pipeline, AttributeInput,
    CreateDocumentRequest, DocumentSearchQuery, DocumentService, ServiceError,
    SqliteDocumentStore, StoreConfig,
};
use log::info;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

const USAGE: &str = "usage: docstore <command>
  ping | version
  put <timestamp> <key=value>... [--id <uuid>]
  get <uuid>
  search <timestamp> <key> <value>

environment:
  DOCSTORE_DB_PATH (required, `:memory:` for a scratch database)
  DOCSTORE_LOG_LEVEL, DOCSTORE_LOG_DIR, DOCSTORE_CACHE_MAX_COST,
  DOCSTORE_CACHE_TTL_SECS, DOCSTORE_INSERT_TIMEOUT_MS, DOCSTORE_SEARCH_LIMIT";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ping,
    Version,
    Put(CreateDocumentRequest),
    Get(Uuid),
    Search {
        timestamp: i64,
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<Value, String> {
    let command = parse_command(args).map_err(|err| format!("{err}\n\n{USAGE}"))?;
    match command {
        Command::Ping => return Ok(json!({ "ping": ping() })),
        Command::Version => return Ok(json!({ "version": core_version() })),
        _ => {}
    }

    let config = StoreConfig::from_env().map_err(|err| format!("{err}\n\n{USAGE}"))?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    let store = Arc::new(SqliteDocumentStore::open(&config.db_path).map_err(|err| err.to_string())?);
    let (queue, pipeline) = spawn_pipeline(Arc::clone(&store), config.pipeline.clone());
    let service = DocumentService::new(store, config.cache.clone(), queue);

    let response = execute(&service, command, config.search_limit).await;

    service.shutdown();
    let report = pipeline
        .await
        .map_err(|err| format!("write pipeline task failed: {err}"))?;
    info!(
        "event=cli_exit module=cli status=ok persisted={} failed={}",
        report.persisted, report.failed
    );
    if report.failed > 0 {
        return Err(format!("{} document(s) could not be persisted", report.failed));
    }
    response
}

async fn execute(
    service: &DocumentService<SqliteDocumentStore>,
    command: Command,
    search_limit: u32,
) -> Result<Value, String> {
    match command {
        Command::Put(request) => {
            let document = service.create_document(&request).await.map_err(describe)?;
            Ok(json!({ "id": document.id, "status": "created" }))
        }
        Command::Get(id) => match service.retrieve_document(id).await.map_err(describe)? {
            Some(document) => Ok(json!({
                "id": document.id,
                "timestamp": document.timestamp,
                "attrs": document.attributes,
                "status": "ok",
            })),
            None => Err("document not found".to_string()),
        },
        Command::Search {
            timestamp,
            key,
            value,
        } => {
            let query = DocumentSearchQuery {
                limit: search_limit,
                ..DocumentSearchQuery::exact(timestamp, key, value)
            };
            let ids = service.search_documents(&query).await.map_err(describe)?;
            Ok(json!({ "docs": ids }))
        }
        Command::Ping | Command::Version => Ok(Value::Null),
    }
}

fn describe(err: ServiceError) -> String {
    match err {
        ServiceError::Validation(err) => format!("invalid request: {err}"),
        ServiceError::Store(err) => format!("store error: {err}"),
    }
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let Some((name, rest)) = args.split_first() else {
        return Err("missing command".to_string());
    };
    match (name.as_str(), rest) {
        ("ping", []) => Ok(Command::Ping),
        ("version", []) => Ok(Command::Version),
        ("get", [id]) => Uuid::parse_str(id)
            .map(Command::Get)
            .map_err(|_| format!("invalid id `{id}`")),
        ("search", [timestamp, key, value]) => Ok(Command::Search {
            timestamp: parse_timestamp(timestamp).map_err(|err| err.to_string())?,
            key: key.clone(),
            value: value.clone(),
        }),
        ("put", [timestamp, pairs @ ..]) => parse_put(timestamp, pairs),
        (other, _) => Err(format!("unknown command or arguments: `{other}`")),
    }
}

fn parse_put(timestamp: &str, args: &[String]) -> Result<Command, String> {
    let mut request = CreateDocumentRequest {
        timestamp: timestamp.to_string(),
        ..CreateDocumentRequest::default()
    };
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if arg == "--id" {
            let raw = args.next().ok_or("--id needs a value")?;
            request.id = Some(Uuid::parse_str(raw).map_err(|_| format!("invalid id `{raw}`"))?);
            continue;
        }
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got `{arg}`"))?;
        request.attributes.push(AttributeInput::new(key, value));
    }
    Ok(Command::Put(request))
}

#[cfg(test)]
mod tests {
    use super::{parse_command, Command};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn put_collects_pairs_and_optional_id() {
        let id = "6f1c1a6e-8f39-4c57-9a43-2f3c1f0d9b11";
        let command = parse_command(&args(&["put", "10", "a=1", "--id", id, "b=x=y"])).unwrap();
        let Command::Put(request) = command else {
            panic!("expected put");
        };
        assert_eq!(request.timestamp, "10");
        assert_eq!(request.id.unwrap().to_string(), id);
        assert_eq!(request.attributes.len(), 2);
        assert_eq!(request.attributes[1].key, "b");
        assert_eq!(request.attributes[1].value, "x=y");
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(parse_command(&[]).is_err());
        assert!(parse_command(&args(&["get", "not-a-uuid"])).is_err());
        assert!(parse_command(&args(&["put", "10", "novalue"])).is_err());
        assert!(parse_command(&args(&["search", "-5", "k", "v"])).is_err());
        assert!(parse_command(&args(&["ping", "extra"])).is_err());
    }

    #[test]
    fn search_parses_timestamp() {
        assert_eq!(
            parse_command(&args(&["search", "42", "k", "v"])).unwrap(),
            Command::Search {
                timestamp: 42,
                key: "k".to_string(),
                value: "v".to_string(),
            }
        );
    }
}
