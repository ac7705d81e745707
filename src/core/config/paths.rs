use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        Self::with_dirs(project_root, user_data_dir)
    }

    /// Build paths rooted at explicit directories (tests, embedding hosts).
    pub fn with_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let secrets_path = user_data_dir.join("secrets.yaml");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            secrets_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// `DOCQA_ROOT`, else the crate directory when it holds a `config.yml`,
/// else the working directory.
fn discover_project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    env::var_os("DOCQA_ROOT")
        .map(PathBuf::from)
        .or_else(|| {
            manifest_dir
                .join("config.yml")
                .is_file()
                .then(|| manifest_dir.clone())
        })
        .or_else(|| env::current_dir().ok())
        .unwrap_or(manifest_dir)
}

/// `DOCQA_DATA_DIR`, else the project root in debug builds, else the
/// per-user application data directory.
fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Some(dir) = env::var_os("DOCQA_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    match env::consts::OS {
        "windows" => env_path("LOCALAPPDATA")
            .or_else(|| env_path("USERPROFILE"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("DocQA"),
        "macos" => home_dir().join("Library/Application Support/DocQA"),
        _ => env_path("XDG_DATA_HOME")
            .unwrap_or_else(|| home_dir().join(".local/share"))
            .join("docqa"),
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn home_dir() -> PathBuf {
    env_path("HOME")
        .or_else(|| env_path("USERPROFILE"))
        .unwrap_or_else(|| PathBuf::from("."))
}
