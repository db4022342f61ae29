// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::{BackendKind, Config};
use nisesales_app::Workspace;
use nisesales_db::Store;
use nisesales_remote::Client;
use nisesales_tui::AppRuntime;
use runtime::{Backend, CliRuntime};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    if options.print_sample_csv {
        println!("{}", nisesales_app::sample_csv());
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `nisesales --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    if options.print_db_path {
        println!("{}", storage_location(&config, options.demo)?);
        return Ok(());
    }

    let log_path = logging::init(config.log_level())?;
    let backend = open_backend(&config, &options)?;
    info!(backend = %backend, log = %log_path.display(), "starting");

    if options.check_only {
        backend.check().with_context(|| {
            format!(
                "check {backend}; fix [storage]/[remote] in {}",
                options.config_path.display()
            )
        })?;
        println!("ok: {backend}");
        return Ok(());
    }

    let mut runtime = CliRuntime::new(backend, config.user_name());
    let mut workspace = Workspace::load(runtime.persistence(), config.workspace_options())
        .context("load records")?;

    if let Some(path) = &options.import_path {
        return import_headless(&mut workspace, &mut runtime, path);
    }

    nisesales_tui::run_app(&mut workspace, &mut runtime)
}

/// Database path for the local backend, endpoint for the remote one.
fn storage_location(config: &Config, demo: bool) -> Result<String> {
    if demo {
        return Ok(":memory:".to_owned());
    }
    match config.backend() {
        BackendKind::Sqlite => Ok(config.db_path()?.display().to_string()),
        BackendKind::Remote => Ok(config.remote_url().unwrap_or_default().to_owned()),
    }
}

fn open_backend(config: &Config, options: &CliOptions) -> Result<Backend> {
    if options.demo || config.backend() == BackendKind::Sqlite {
        let db_path = if options.demo {
            PathBuf::from(":memory:")
        } else {
            config.db_path()?
        };
        return open_sqlite(&db_path, options.demo).map(Backend::Sqlite);
    }

    let client = Client::new(
        config.remote_url().unwrap_or_default(),
        config.remote_api_key().unwrap_or_default(),
        config.remote_timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [remote] config in {}; fix url/api_key/timeout values",
            options.config_path.display()
        )
    })?;
    Ok(Backend::Remote(client))
}

fn open_sqlite(db_path: &Path, demo: bool) -> Result<Store> {
    let mut store = Store::open(db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or NISESALES_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if demo {
        store.seed_demo_data()?;
    }
    Ok(store)
}

fn import_headless(workspace: &mut Workspace, runtime: &mut CliRuntime, path: &str) -> Result<()> {
    let text = runtime.read_import_file(path)?;
    let report = workspace
        .import_csv(runtime.persistence(), &text)
        .with_context(|| format!("import {path}"))?;
    println!("{}", report.summary());
    for name in &report.created_representatives {
        println!("created representative {name}");
    }
    for message in &report.messages {
        println!("{message}");
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    print_sample_csv: bool,
    import_path: Option<String>,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        print_sample_csv: false,
        import_path: None,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--import" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--import requires a CSV file path"))?;
                options.import_path = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--print-sample-csv" => {
                options.print_sample_csv = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("nisesales");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path or remote URL");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --print-sample-csv       Print an example import file");
    println!("  --import <csv>           Import companies from a CSV file and exit");
    println!("  --check                  Validate config and reach the storage backend");
    println!("  --help                   Show this help");
}
