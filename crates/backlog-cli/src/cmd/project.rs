use crate::cmd::block_on;
use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use backlog_core::config::Config;
use backlog_core::store::{self, ConfiguredStore};
use backlog_core::types::Product;
use backlog_core::{timestamp, Project, ProjectDraft, ProjectPatch, UserId};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ProjectSubcommand {
    /// List active projects, most recently updated first
    List,

    /// Show one project
    Show { id: String },

    /// Save a new project (local saves overwrite a project with the same description)
    Save {
        /// JSON file holding the full project draft
        #[arg(long, conflicts_with_all = ["name", "description"])]
        file: Option<PathBuf>,
        /// Product name
        #[arg(long, required_unless_present = "file")]
        name: Option<String>,
        /// Product description
        #[arg(long, required_unless_present = "file")]
        description: Option<String>,
        /// Source document to attach (content and file name are stored)
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Apply a partial update; fields not given are kept
    Update {
        id: String,
        /// JSON file holding the patch
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a project from the local store and, with a user, the cloud store
    Delete { id: String },

    /// Hide a project from listings
    Archive { id: String },

    /// Undo `archive`
    Restore { id: String },

    /// Copy every local project into the cloud store under --user
    Migrate,
}

pub fn run(
    root: &Path,
    subcmd: ProjectSubcommand,
    user: Option<&UserId>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let store = store::open(root, &config).context("failed to open project store")?;

    match subcmd {
        ProjectSubcommand::List => list(&store, user, json),
        ProjectSubcommand::Show { id } => show(&store, &id, user, json),
        ProjectSubcommand::Save {
            file,
            name,
            description,
            document,
        } => save(&store, file, name, description, document, user, json),
        ProjectSubcommand::Update {
            id,
            file,
            name,
            description,
        } => update(&store, &id, file, name, description, user, json),
        ProjectSubcommand::Delete { id } => delete(&store, &id, user, json),
        ProjectSubcommand::Archive { id } => {
            let project = block_on(store.archive(&id, user))??;
            report_updated(project, &id, "archived", json)
        }
        ProjectSubcommand::Restore { id } => {
            let project = block_on(store.restore(&id, user))??;
            report_updated(project, &id, "restored", json)
        }
        ProjectSubcommand::Migrate => migrate(&store, user, json),
    }
}

fn list(store: &ConfiguredStore, user: Option<&UserId>, json: bool) -> anyhow::Result<()> {
    let projects = block_on(store.list(user))?.context("failed to list projects")?;

    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }

    let rows = projects
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                truncate(&p.name, 30),
                p.epics.len().to_string(),
                p.story_count().to_string(),
                if p.synced_to_firestore { "cloud" } else { "local" }.to_string(),
                timestamp::to_iso8601(p.updated_at),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "EPICS", "STORIES", "STORE", "UPDATED"], rows);
    Ok(())
}

fn show(store: &ConfiguredStore, id: &str, user: Option<&UserId>, json: bool) -> anyhow::Result<()> {
    let project = block_on(store.load(id, user))??
        .with_context(|| format!("project '{id}' not found"))?;

    if json {
        return print_json(&project);
    }

    println!("{} ({})", project.name, project.id);
    if !project.description.is_empty() {
        println!("{}", project.description);
    }
    println!();
    println!("Store:    {}", if project.synced_to_firestore { "cloud" } else { "local" });
    if project.archived {
        println!("Archived: yes");
    }
    println!("Created:  {}", timestamp::to_iso8601(project.created_at));
    println!("Updated:  {}", timestamp::to_iso8601(project.updated_at));
    if let Some(file) = &project.document_file_name {
        println!("Document: {file}");
    }
    print_artifacts(&project);

    if !project.epics.is_empty() {
        println!();
        for epic in &project.epics {
            println!("[{}] {} ({} stories)", epic.id, epic.title, epic.user_stories.len());
            for story in &epic.user_stories {
                let priority = story
                    .priority
                    .as_ref()
                    .map(|p| format!(" [{p}]"))
                    .unwrap_or_default();
                println!("  - {}{priority}: {}", story.id, truncate(&story.description, 70));
            }
        }
    }
    Ok(())
}

fn print_artifacts(project: &Project) {
    let mut present = Vec::new();
    if project.prd.is_some() {
        present.push("prd".to_string());
    }
    if project.blueprints.is_some() {
        present.push("blueprints".to_string());
    }
    if !project.research.is_empty() {
        present.push(format!("research({})", project.research.len()));
    }
    if project.competitor_analysis.is_some() {
        present.push("competitor analysis".to_string());
    }
    if !project.personas.is_empty() {
        present.push(format!("personas({})", project.personas.len()));
    }
    if !project.journey_maps.is_empty() {
        present.push(format!("journey maps({})", project.journey_maps.len()));
    }
    if !present.is_empty() {
        println!("Artifacts: {}", present.join(", "));
    }
}

fn save(
    store: &ConfiguredStore,
    file: Option<PathBuf>,
    name: Option<String>,
    description: Option<String>,
    document: Option<PathBuf>,
    user: Option<&UserId>,
    json: bool,
) -> anyhow::Result<()> {
    let mut draft = match file {
        Some(path) => read_json::<ProjectDraft>(&path)?,
        None => ProjectDraft::new(
            Product::new(name.unwrap_or_default(), description.unwrap_or_default()),
            Vec::new(),
        ),
    };
    if let Some(path) = document {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        draft = draft.with_document(Some(content), file_name);
    }
    if draft.product.name.trim().is_empty() {
        anyhow::bail!("product name must not be empty");
    }

    let project = block_on(store.save(draft, user))?.context("failed to save project")?;
    if json {
        return print_json(&project);
    }
    let location = if project.synced_to_firestore { "cloud" } else { "local" };
    println!("Saved project '{}' ({location}): {}", project.name, project.id);
    Ok(())
}

fn update(
    store: &ConfiguredStore,
    id: &str,
    file: Option<PathBuf>,
    name: Option<String>,
    description: Option<String>,
    user: Option<&UserId>,
    json: bool,
) -> anyhow::Result<()> {
    let mut patch = match file {
        Some(path) => read_json::<ProjectPatch>(&path)?,
        None => ProjectPatch::default(),
    };
    if name.is_some() {
        patch.name = name;
    }
    if description.is_some() {
        patch.description = description;
    }
    if patch.is_empty() {
        anyhow::bail!("nothing to update: pass --file, --name, or --description");
    }

    let project = block_on(store.update(id, patch, user))??;
    report_updated(project, id, "updated", json)
}

fn report_updated(
    project: Option<Project>,
    id: &str,
    verb: &str,
    json: bool,
) -> anyhow::Result<()> {
    let project = project.with_context(|| format!("project '{id}' not found"))?;
    if json {
        return print_json(&project);
    }
    println!("Project '{}' {verb}: {}", project.name, project.id);
    Ok(())
}

fn delete(store: &ConfiguredStore, id: &str, user: Option<&UserId>, json: bool) -> anyhow::Result<()> {
    block_on(store.delete(id, user))?.with_context(|| format!("failed to delete '{id}'"))?;
    if json {
        return print_json(&serde_json::json!({ "deleted": id }));
    }
    println!("Deleted project {id}");
    Ok(())
}

fn migrate(store: &ConfiguredStore, user: Option<&UserId>, json: bool) -> anyhow::Result<()> {
    let user = user.context("migration needs a user: pass --user or set BACKLOG_USER")?;
    let report = block_on(store.migrate_to_cloud(user))?.context("migration failed")?;

    if json {
        return print_json(&report);
    }
    println!(
        "Migrated {}/{} projects to the cloud for {user}",
        report.migrated, report.total
    );
    for id in &report.failed_ids {
        println!("  failed: {id}");
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid JSON in {}", path.display()))
}
