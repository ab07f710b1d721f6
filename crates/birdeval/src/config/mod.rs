use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::batch::DEFAULT_WORKERS;
use crate::sqlite::DEFAULT_EXECUTION_TIMEOUT;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DB_DIR_NAME: &str = "dev_databases";
pub const DEFAULT_OUT_DIR: &str = "predictions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchPaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub data_dir: PathBuf,
    pub db_root: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathOverrides<'a> {
    pub data_dir: Option<&'a Path>,
    pub db_root: Option<&'a Path>,
    pub out_dir: Option<&'a Path>,
}

pub fn resolve_bench_paths(
    home_dir: &Path,
    cwd: &Path,
    overrides: PathOverrides<'_>,
) -> Result<BenchPaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let resolve_or = |path: Option<&Path>, default: PathBuf| match path {
        Some(path) => resolve_user_path(path, &home_dir, &cwd),
        None => Ok(normalize_lexical(&default)),
    };

    let data_dir = resolve_or(overrides.data_dir, cwd.join(DEFAULT_DATA_DIR))?;
    let db_root = resolve_or(overrides.db_root, data_dir.join(DEFAULT_DB_DIR_NAME))?;
    let out_dir = resolve_or(overrides.out_dir, cwd.join(DEFAULT_OUT_DIR))?;

    Ok(BenchPaths {
        home_dir,
        cwd,
        data_dir,
        db_root,
        out_dir,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    pub timeout: Duration,
    pub workers: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_EXECUTION_TIMEOUT,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ExecutionSettings {
    pub fn new(timeout_secs: f64, workers: usize) -> Result<Self> {
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            bail!("timeout must be a positive number of seconds: {timeout_secs}");
        }
        if workers == 0 {
            bail!("workers must be at least 1");
        }

        Ok(Self {
            timeout: Duration::from_secs_f64(timeout_secs),
            workers,
        })
    }
}

pub fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
