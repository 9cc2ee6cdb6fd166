//! Subcommands and their dispatch.

use std::{io::Read as _, path::Path};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use cqmt_core::{microtheory::NewMicrotheory, template::Params};
use cqmt_engine::{CqInput, RunRequest};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::Engine;

#[derive(Subcommand)]
pub enum Command {
  /// Manage microtheories.
  #[command(subcommand)]
  Mt(MtCommand),

  /// Manage competency questions.
  #[command(subcommand)]
  Cq(CqCommand),

  /// Run a competency question and record the outcome.
  Run(RunArgs),

  /// Track the ontology elements microtheories depend on.
  #[command(subcommand)]
  Deps(DepsCommand),

  /// Diff a proposed ontology document against the stored graph.
  Changes {
    /// Named graph holding the current ontology.
    #[arg(long)]
    ontology: String,
    /// Turtle document to compare (`-` for stdin).
    document: String,
  },
}

#[derive(Subcommand)]
pub enum MtCommand {
  /// Create a microtheory, optionally cloned from a parent.
  Create {
    #[arg(long)]
    project:    Uuid,
    #[arg(long)]
    label:      String,
    /// Copy this microtheory's triples into the new one.
    #[arg(long)]
    parent:     Option<String>,
    /// Make the new microtheory the project default.
    #[arg(long)]
    default:    bool,
    #[arg(long)]
    created_by: Option<String>,
  },
  /// List a project's microtheories.
  List {
    #[arg(long)]
    project: Uuid,
  },
  /// Delete a microtheory, its graph and its dependency edges.
  Delete { iri: String },
  /// Make a microtheory the project default.
  Default {
    #[arg(long)]
    project: Uuid,
    iri:     String,
  },
}

#[derive(Subcommand)]
pub enum CqCommand {
  /// Insert or update a question from a JSON file (`-` for stdin).
  Upsert { file: String },
  /// Show a question's most recent runs, newest first.
  Runs {
    #[arg(long)]
    project: Uuid,
    #[arg(long)]
    name:    String,
    #[arg(long, default_value_t = 10)]
    limit:   usize,
  },
}

#[derive(Args)]
pub struct RunArgs {
  #[arg(long)]
  project: Uuid,
  /// Question name.
  #[arg(long)]
  cq:      String,
  /// Target microtheory; defaults to the question's, then the project's.
  #[arg(long)]
  mt:      Option<String>,
  /// Template parameter as `name=value`. Repeatable.
  #[arg(long = "param", value_parser = parse_param)]
  params:  Vec<(String, String)>,
  #[arg(long)]
  by:      Option<String>,
}

#[derive(Subcommand)]
pub enum DepsCommand {
  /// Extract the elements a microtheory references.
  Extract {
    iri:      String,
    #[arg(long)]
    ontology: String,
    /// Replace the stored edges with the extracted set.
    #[arg(long)]
    store:    bool,
  },
  /// Re-check stored edges against the ontology graph.
  Validate { iri: String },
  /// List microtheories that reference an element.
  Affected {
    #[arg(long)]
    ontology: String,
    element:  String,
  },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
    _ => Err(format!("expected name=value, got {raw:?}")),
  }
}

fn read_input(source: &str) -> Result<String> {
  if source == "-" {
    let mut buf = String::new();
    std::io::stdin()
      .read_to_string(&mut buf)
      .context("failed to read stdin")?;
    return Ok(buf);
  }
  std::fs::read_to_string(Path::new(source)).with_context(|| format!("failed to read {source}"))
}

pub async fn execute(engine: &Engine, command: Command) -> Result<Value> {
  let output = match command {
    Command::Mt(cmd) => mt(engine, cmd).await?,
    Command::Cq(cmd) => cq(engine, cmd).await?,
    Command::Run(args) => {
      let request = RunRequest {
        project_id:  args.project,
        cq_name:     args.cq,
        microtheory: args.mt,
        params:      args.params.into_iter().collect::<Params>(),
        executed_by: args.by,
      };
      serde_json::to_value(engine.workbench.run_cq(request).await?)?
    }
    Command::Deps(cmd) => deps(engine, cmd).await?,
    Command::Changes { ontology, document } => {
      let document = read_input(&document)?;
      serde_json::to_value(engine.detector.detect_changes(&ontology, &document).await?)?
    }
  };
  Ok(output)
}

async fn mt(engine: &Engine, command: MtCommand) -> Result<Value> {
  let workbench = &engine.workbench;
  Ok(match command {
    MtCommand::Create { project, label, parent, default, created_by } => {
      let mut input = NewMicrotheory::new(project, label);
      input.parent_iri = parent;
      input.make_default = default;
      input.created_by = created_by;
      serde_json::to_value(workbench.create_microtheory(input).await?)?
    }
    MtCommand::List { project } => {
      serde_json::to_value(workbench.list_microtheories(project).await?)?
    }
    MtCommand::Delete { iri } => {
      workbench.delete_microtheory(&iri).await?;
      json!({ "deleted": iri })
    }
    MtCommand::Default { project, iri } => {
      workbench.set_default_microtheory(project, &iri).await?;
      json!({ "project_id": project, "default": iri })
    }
  })
}

async fn cq(engine: &Engine, command: CqCommand) -> Result<Value> {
  let workbench = &engine.workbench;
  Ok(match command {
    CqCommand::Upsert { file } => {
      let input: CqInput =
        serde_json::from_str(&read_input(&file)?).context("failed to parse question JSON")?;
      serde_json::to_value(workbench.upsert_cq(input).await?)?
    }
    CqCommand::Runs { project, name, limit } => {
      serde_json::to_value(workbench.recent_runs(project, &name, limit).await?)?
    }
  })
}

async fn deps(engine: &Engine, command: DepsCommand) -> Result<Value> {
  let tracker = &engine.tracker;
  Ok(match command {
    DepsCommand::Extract { iri, ontology, store: true } => {
      serde_json::to_value(tracker.refresh_dependencies(&iri, &ontology).await?)?
    }
    DepsCommand::Extract { iri, ontology, store: false } => {
      serde_json::to_value(tracker.extract_dependencies(&iri, &ontology).await?)?
    }
    DepsCommand::Validate { iri } => {
      serde_json::to_value(tracker.validate_dependencies(&iri).await?)?
    }
    DepsCommand::Affected { ontology, element } => {
      serde_json::to_value(tracker.get_affected_mts(&ontology, &element).await?)?
    }
  })
}
