use anyhow::Context;
use backlog_core::{
    config::{CloudConfig, Config, LocalBackend},
    io, paths,
};
use std::path::Path;

pub fn run(root: &Path, backend: &str, cloud_project: Option<&str>) -> anyhow::Result<()> {
    let backend = parse_backend(backend)?;

    println!("Initializing backlog in: {}", root.display());

    let dir = paths::backlog_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        return Ok(());
    }

    let mut cfg = Config::default();
    cfg.local.backend = backend;
    cfg.cloud = cloud_project.map(CloudConfig::new);
    cfg.save(root).context("failed to write config.yaml")?;
    println!("  created: {}", paths::CONFIG_FILE);

    if backend == LocalBackend::File {
        let local = cfg.local.resolved_path(root);
        io::ensure_dir(&local).with_context(|| format!("failed to create {}", local.display()))?;
    }
    Ok(())
}

fn parse_backend(s: &str) -> anyhow::Result<LocalBackend> {
    match s {
        "file" => Ok(LocalBackend::File),
        "redb" => Ok(LocalBackend::Redb),
        "memory" => Ok(LocalBackend::Memory),
        other => anyhow::bail!("unknown local backend '{other}': expected file, redb, or memory"),
    }
}
