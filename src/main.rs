//! semfish CLI: map tabular sampling records into a validated semantic graph.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use semfish::config::SemfishConfig;
use semfish::error::PipelineError;
use semfish::graph::sparql::ExportFormat;
use semfish::mapper::IngestReport;
use semfish::pipeline::Pipeline;
use semfish::schema::Target;

#[derive(Parser)]
#[command(name = "semfish", version, about = "Record-to-graph mapper for fisheries sampling data")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "semfish.toml")]
    config: PathBuf,

    /// Keep the query store on disk in this directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load vocabularies, map rows, validate, then run the configured reports.
    Run {
        /// Input CSV (overrides `[source] path`).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Write the validated graph to this file.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Export syntax: turtle, ntriples or rdfxml.
        #[arg(long, default_value = "turtle")]
        format: ExportFormat,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Map rows and validate the graph; exits non-zero when invalid.
    Validate {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Map rows, then run one ad-hoc SPARQL query.
    Query {
        /// SPARQL text; configured prefixes are declared automatically.
        #[arg(long)]
        sparql: String,

        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Print classes, relations, code lists and the mapping table.
    Schema,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SemfishConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            input,
            export,
            format,
            json,
        } => {
            let mut pipeline = open(config, cli.data_dir.as_deref())?;
            let ingest = prepare(&mut pipeline, input.as_deref())?;
            let published = pipeline.publish()?;
            let reports = published.run_reports(pipeline.queries())?;

            if let Some(path) = &export {
                let file = std::fs::File::create(path).into_diagnostic()?;
                let mut writer = published.export(format, std::io::BufWriter::new(file))?;
                writer.flush().into_diagnostic()?;
            }

            if json {
                let summary = serde_json::json!({
                    "info": pipeline.info(),
                    "ingest": ingest_json(&ingest),
                    "validation": published.report(),
                    "reports": reports,
                    "export": export.as_ref().map(|p| p.display().to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
            } else {
                print_ingest(&ingest);
                print!("{}", published.report());
                for report in &reports {
                    print!("{report}");
                }
                if let Some(path) = &export {
                    println!("Exported graph ({format}) to {}", path.display());
                }
                println!("{}", pipeline.info());
            }
        }

        Commands::Validate { input, json } => {
            let mut pipeline = open(config, cli.data_dir.as_deref())?;
            let ingest = prepare(&mut pipeline, input.as_deref())?;
            let report = pipeline.validate();

            if json {
                let summary = serde_json::json!({
                    "ingest": ingest_json(&ingest),
                    "validation": report,
                });
                println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
            } else {
                print_ingest(&ingest);
                print!("{report}");
            }

            if !report.valid {
                return Err(PipelineError::ValidationFailed {
                    violations: report.violations.len(),
                }
                .into());
            }
        }

        Commands::Query { sparql, input } => {
            let mut pipeline = open(config, cli.data_dir.as_deref())?;
            prepare(&mut pipeline, input.as_deref())?;
            let published = pipeline.publish()?;
            let rows = published.executor().select(&sparql)?;
            println!("{}", rows.variables().join("\t"));
            let mut count = 0;
            for binding in rows {
                let binding = binding?;
                let cells: Vec<&str> = binding.iter().map(|(_, v)| v).collect();
                println!("{}", cells.join("\t"));
                count += 1;
            }
            eprintln!("{count} row(s)");
        }

        Commands::Schema => {
            let pipeline = open(config, None)?;
            let schema = pipeline.schema();
            let ns = schema.namespaces();

            println!("Classes:");
            for class in schema.classes() {
                let concept = if class.concept { " (concept)" } else { "" };
                println!("  {:<16} {}{concept}", class.name, ns.compact(&class.iri));
                if !class.required.is_empty() {
                    println!("  {:<16} requires {}", "", class.required.join(", "));
                }
            }

            println!("Relations:");
            for rel in schema.relations() {
                println!(
                    "  {:<18} {} → {}{}",
                    rel.name,
                    rel.domain.as_deref().unwrap_or("*"),
                    rel.range,
                    if rel.single_valued { " [single]" } else { "" }
                );
            }

            println!("Code lists:");
            for list in schema.code_lists() {
                let norm = list
                    .normalization
                    .map(|n| format!(" (normalized at '{}')", n.separator))
                    .unwrap_or_default();
                println!("  {:<16} {}{norm}", list.name, list.class);
            }

            let mapping = pipeline.mapping();
            println!(
                "Mapping: {} keyed by {}",
                mapping.subject_class, mapping.subject_key
            );
            for field in &mapping.fields {
                let target = match &field.target {
                    Target::Reference(class) => format!("→ {class}"),
                    Target::Literal(kind) => format!("= {kind}"),
                };
                println!("  {:<14} {:<16} {target}", field.field, field.relation);
                for companion in &field.companions {
                    println!(
                        "  {:<14} + {:<14} → {}/{}",
                        "", companion.relation, companion.class, companion.key
                    );
                }
            }
        }
    }

    Ok(())
}

fn open(config: SemfishConfig, data_dir: Option<&Path>) -> Result<Pipeline> {
    let pipeline = Pipeline::from_config(config)?;
    Ok(match data_dir {
        Some(dir) => pipeline.with_data_dir(dir),
        None => pipeline,
    })
}

fn prepare(pipeline: &mut Pipeline, input: Option<&Path>) -> Result<IngestReport> {
    pipeline.load_vocabularies()?;
    Ok(pipeline.ingest_configured(input)?)
}

fn print_ingest(report: &IngestReport) {
    println!(
        "Ingested {} row(s): {} mapped, {} skipped, {} edge(s) attached, {} replaced",
        report.rows_read,
        report.rows_mapped,
        report.rows_skipped,
        report.edges_attached,
        report.edges_replaced
    );
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
}

fn ingest_json(report: &IngestReport) -> serde_json::Value {
    let warnings: Vec<serde_json::Value> = report
        .warnings
        .iter()
        .map(|w| {
            serde_json::json!({
                "row": w.row,
                "field": w.field,
                "raw": w.raw,
                "reason": w.error.reason,
            })
        })
        .collect();
    serde_json::json!({
        "rows_read": report.rows_read,
        "rows_mapped": report.rows_mapped,
        "rows_skipped": report.rows_skipped,
        "edges_attached": report.edges_attached,
        "edges_replaced": report.edges_replaced,
        "warnings": warnings,
    })
}
