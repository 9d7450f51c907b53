use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use std::path::{Path, PathBuf};

use surveyload::config::{init_tracing, LoaderConfig};
use surveyload::load::{DryRunExecutor, PgExecutor};
use surveyload::pipeline::Importer;
use surveyload::profile::{ProfileOptions, TransformationProfile};
use surveyload::schema::PgSchemaIntrospector;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Arquivo de configuração (TOML, JSON ou YAML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Ativa o nível de log `debug`
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Importa um arquivo CSV para a tabela descrita no perfil
    Import {
        /// Perfil de transformação (YAML)
        profile: PathBuf,
        /// Entrada do perfil a importar
        table: String,
        /// Arquivo CSV exportado
        file: PathBuf,
        /// Imprime os comandos sem executá-los
        #[arg(long)]
        dry_run: bool,
        /// Imprime as N primeiras linhas e seus comandos
        #[arg(long, value_name = "N", default_value_t = 0)]
        show_batch: usize,
        /// Imprime a linha com este `_rowid`
        #[arg(long, value_name = "N")]
        show_batch_row: Option<i64>,
    },
    /// Mostra as tabelas de um perfil
    Profile {
        /// Perfil de transformação (YAML)
        profile: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = LoaderConfig::load(cli.settings.as_deref()).context("configuração inválida")?;
    if cli.debug {
        config.observability.log_level = "debug".to_string();
    }
    init_tracing(&config.observability)?;

    match cli.command {
        Commands::Import {
            profile,
            table,
            file,
            dry_run,
            show_batch,
            show_batch_row,
        } => import(&config, &profile, &table, &file, dry_run, show_batch, show_batch_row).await,
        Commands::Profile { profile } => show_profile(&config, &profile),
    }
}

async fn import(
    config: &LoaderConfig,
    profile: &Path,
    table: &str,
    file: &Path,
    dry_run: bool,
    show_batch: usize,
    show_batch_row: Option<i64>,
) -> anyhow::Result<()> {
    let Some(url) = config.database.url.as_deref() else {
        bail!("database.url não configurado (SURVEYLOAD__DATABASE__URL)");
    };

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(config.connect_timeout())
        .connect(url)
        .await
        .context("não foi possível conectar ao banco de destino")?;

    let mut options = config.to_load_options();
    options.show_batch_count = show_batch;
    options.show_batch_row = show_batch_row;

    let builder = Importer::builder()
        .introspector(PgSchemaIntrospector::new(pool))
        .profile_options(config.to_profile_options(None))
        .options(options);
    let builder = if dry_run {
        builder.executor(DryRunExecutor::new())
    } else {
        builder.executor(PgExecutor::connect(url, config.connect_timeout()).await?)
    };
    let mut importer = builder.build()?;

    importer
        .load_profile(profile)
        .with_context(|| format!("perfil {}", profile.display()))?;
    let report = importer.import_file(table, file).await?;

    println!(
        "{}: {} linhas em staging, {} removidas, {} inseridas ({} lotes, {} comandos, {}ms){}",
        report.table,
        report.rows_staged,
        report.rows_deleted,
        report.rows_inserted,
        report.batches_flushed,
        report.statements_executed,
        report.execution_time_ms,
        if report.dry_run { " [simulação]" } else { "" }
    );
    Ok(())
}

fn show_profile(config: &LoaderConfig, path: &Path) -> anyhow::Result<()> {
    let options = ProfileOptions {
        skip_prepare: true,
        ..config.to_profile_options(None)
    };
    let profile = TransformationProfile::load(path, &options)?;

    for definition in profile.tables() {
        println!("{} -> {}", definition.name, definition.table);
        if !definition.prepare.is_empty() {
            println!("  prepare: {}", definition.prepare.join(", "));
        }
        for mapping in definition.mappings() {
            let rule = &mapping.rule;
            let action = if rule.ignore {
                "ignorar".to_string()
            } else {
                let target = rule.rename.as_deref().unwrap_or(&mapping.pattern);
                match rule.to {
                    Some(kind) => format!("{} ({})", target, kind),
                    None => target.to_string(),
                }
            };
            println!("  {:<24} {}", mapping.pattern, action);
        }
        for (column, hint) in &definition.csv_types {
            println!("  csv {:<20} {}", column, hint.name());
        }
        for (column, value) in &definition.constants {
            println!("  {:<24} = {}", column, value);
        }
    }
    Ok(())
}
