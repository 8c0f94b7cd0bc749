use abr_document::{diff_documents, ImpressionChanges};
use abr_engine::{
    EngineConfig, EngineContext, FileStateLoader, LoadReport, StateLoader, StateReconciler,
};
use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("abr")
        .version(abr_engine::VERSION)
        .about("Load, diff and round-trip ABR scene state documents")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("load")
                .about("Apply state documents in order and report each pass")
                .arg(
                    Arg::new("documents")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Document files, applied one after another"),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the serialized scene to this file"),
                )
                .arg(
                    Arg::new("render")
                        .long("render")
                        .action(ArgAction::SetTrue)
                        .help("Run a render pass after the last load"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Show which impressions change between two documents")
                .arg(Arg::new("old").required(true).value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("new").required(true).value_parser(value_parser!(PathBuf)))
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .action(ArgAction::SetTrue)
                        .help("Print the full structural delta"),
                ),
        )
        .subcommand(
            Command::new("roundtrip")
                .about("Check that loading the serialized scene reproduces it")
                .arg(
                    Arg::new("document")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Loader rooted at the file's directory, plus the name to fetch
fn file_loader(path: &Path) -> Result<(FileStateLoader, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a document file: {}", path.display()))?
        .to_string();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok((FileStateLoader::new(dir, name.clone()), name))
}

async fn read_document(path: &Path) -> Result<Value> {
    let (loader, name) = file_loader(path)?;
    Ok(loader.get_state(&name).await?)
}

fn print_report(path: &Path, report: &LoadReport) {
    println!(
        "{}: {} created, {} removed{}, {} resolved, {} unresolved",
        path.display(),
        report.created,
        report.removed,
        if report.cleared { " (scene cleared)" } else { "" },
        report.resolved,
        report.unresolved
    );
    for failure in &report.skipped {
        println!("  skipped: {failure}");
    }
}

async fn run_load(config: EngineConfig, args: &ArgMatches) -> Result<()> {
    let reconciler = StateReconciler::new(EngineContext::from_config(config)?);

    for path in args.get_many::<PathBuf>("documents").into_iter().flatten() {
        let raw = read_document(path).await?;
        let report = reconciler
            .load_document(raw)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
        print_report(path, &report);
    }

    if args.get_flag("render") {
        let rendered = reconciler.render_pass().await?;
        println!("render pass: {rendered} impression(s) recomputed");
    }

    if let Some(path) = args.get_one::<PathBuf>("save") {
        let (loader, _) = file_loader(path)?;
        reconciler.save_to(&loader).await?;
        println!("saved {}", path.display());
    }
    Ok(())
}

async fn run_diff(args: &ArgMatches) -> Result<()> {
    let (Some(old), Some(new)) = (args.get_one::<PathBuf>("old"), args.get_one::<PathBuf>("new"))
    else {
        bail!("diff needs two documents");
    };
    let old = read_document(old).await?;
    let new = read_document(new).await?;

    if args.get_flag("raw") {
        let delta = diff_documents(Some(&old), &new).map(|d| d.to_value());
        println!("{}", serde_json::to_string_pretty(&delta.unwrap_or(Value::Null))?);
        return Ok(());
    }

    match ImpressionChanges::between(Some(&old), &new) {
        ImpressionChanges::Initial => println!("every impression is new"),
        ImpressionChanges::Replace => println!("impressions replaced: scene is cleared and rebuilt"),
        ImpressionChanges::Patch { changed, deleted } => {
            for id in &changed {
                println!("~ {id}");
            }
            for id in &deleted {
                println!("- {id}");
            }
            if changed.is_empty() && deleted.is_empty() {
                println!("no impression changes");
            }
        }
    }
    Ok(())
}

async fn run_roundtrip(config: EngineConfig, args: &ArgMatches) -> Result<bool> {
    let path = args
        .get_one::<PathBuf>("document")
        .context("missing document")?;
    let raw = read_document(path).await?;

    let context = EngineContext::from_config(config)?;
    let first = StateReconciler::new(context.clone());
    print_report(path, &first.load_document(raw).await?);
    let serialized = first.serialize_value().await?;

    let second = StateReconciler::new(context);
    second.load_document(serialized).await?;

    let matches = first.scene().summary().await? == second.scene().summary().await?;
    println!("round trip {}", if matches { "ok" } else { "MISMATCH" });
    Ok(matches)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));
    let config = load_config(&matches)?;
    tracing::debug!("Configuration: {:?}", config);

    match matches.subcommand() {
        Some(("load", args)) => run_load(config, args).await,
        Some(("diff", args)) => run_diff(args).await,
        Some(("roundtrip", args)) => {
            if run_roundtrip(config, args).await? {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        _ => unreachable!("subcommand is required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let matches = cli()
            .try_get_matches_from(["abr", "load", "a.json", "b.json", "--json", "--render"])
            .unwrap();
        assert!(matches.get_flag("json"));
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_many::<PathBuf>("documents").unwrap().count(), 2);
        assert!(args.get_flag("render"));
    }

    #[test]
    fn file_loader_splits_path() {
        let (_, name) = file_loader(Path::new("states/Basic.json")).unwrap();
        assert_eq!(name, "Basic.json");
    }
}
