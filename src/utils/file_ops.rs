use std::fs;
use std::path::{Path, PathBuf};

use crate::core::launcher::sandbox::CHARACTERS_DIR;

pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 程序数据目录：可执行文件旁的 `MPL/`
pub fn mpl_dir() -> PathBuf {
    exe_dir().join("MPL")
}

pub fn mpl_subdir<P: AsRef<Path>>(rel: P) -> PathBuf {
    mpl_dir().join(rel)
}

pub fn create_initial_directories() {
    create_directories_under(&mpl_dir());
}

/// 失败只打印，不中断启动；日志系统此时还没有初始化
fn create_directories_under(root: &Path) {
    let dirs = [
        root.to_path_buf(),
        root.join("logs"),
        root.join("config"),
        root.join(CHARACTERS_DIR),
    ];

    for dir in dirs {
        if let Err(e) = fs::create_dir_all(&dir) {
            eprintln!("Failed to create directory '{}': {}", dir.display(), e);
        }
    }
}
