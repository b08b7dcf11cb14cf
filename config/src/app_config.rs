use directories::ProjectDirs;
use std::path::PathBuf;

/// Directory holding the optional user `config.yaml`.
pub fn get_config_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("int", "ecmwf", "aviso-monitoring")
}
