use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    // Templates and config are looked up next to the executable
    let Some(target_dir) = target_dir() else {
        return;
    };
    copy_templates(&target_dir);
    copy_config(&target_dir);
}

/// target/release (or target/debug), three levels above OUT_DIR.
fn target_dir() -> Option<PathBuf> {
    let out_dir = env::var("OUT_DIR").ok()?;
    Path::new(&out_dir)
        .ancestors()
        .nth(3)
        .map(Path::to_path_buf)
}

/// Copies the glyph templates so the template classifier can find them.
fn copy_templates(target_dir: &Path) {
    let template_src = Path::new("resources/templates");
    let template_dst = target_dir.join("resources").join("templates");

    if template_src.exists() {
        let _ = fs::create_dir_all(&template_dst);
        if let Ok(entries) = fs::read_dir(template_src) {
            for entry in entries.flatten() {
                let src_path = entry.path();
                if let Some(file_name) = src_path.file_name() {
                    if src_path.is_file() {
                        let _ = fs::copy(&src_path, template_dst.join(file_name));
                    }
                }
            }
        }
        println!("cargo:rerun-if-changed=resources/templates/");
    }
}

/// Copies config.json to the target directory.
fn copy_config(target_dir: &Path) {
    let config_src = Path::new("config.json");
    if config_src.exists() {
        let _ = fs::copy(config_src, target_dir.join("config.json"));
        println!("cargo:rerun-if-changed=config.json");
    }
}
