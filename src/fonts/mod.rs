//! Font loading for the composed renderer.
//!
//! Fonts are looked up in, in order: the directory named by
//! `MANUAL_PRESS_FONTS_DIR`, `assets/fonts` next to the running executable,
//! and `assets/fonts` inside the crate. The first directory holding every
//! required file wins.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use rusttype::Font;

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable overriding the font directory.
pub const FONTS_DIR_ENV: &str = "MANUAL_PRESS_FONTS_DIR";

const REGULAR_FILE: &str = "Roboto-Regular.ttf";
const BOLD_FILE: &str = "Roboto-Bold.ttf";
const FONT_FILES: &[&str] = &[REGULAR_FILE, BOLD_FILE];

/// Regular and bold faces used for body text and headings.
pub struct FontPair {
    pub regular: Font<'static>,
    pub bold: Font<'static>,
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = env::var_os(FONTS_DIR_ENV) {
        if !path.is_empty() {
            candidates.push(PathBuf::from(path));
        }
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            candidates.push(bin_dir.join("assets/fonts"));
        }
    }

    let manifest_candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts");
    if !candidates.contains(&manifest_candidate) {
        candidates.push(manifest_candidate);
    }

    candidates
}

fn missing_font_files(path: &Path) -> Vec<&'static str> {
    FONT_FILES
        .iter()
        .copied()
        .filter(|name| !path.join(name).is_file())
        .collect()
}

/// Finds the first candidate directory that holds all required font files.
pub fn resolve_font_directory() -> io::Result<PathBuf> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        if !candidate.is_dir() {
            attempts.push(format!("{} (directory missing)", candidate.display()));
            continue;
        }
        let missing = missing_font_files(&candidate);
        if missing.is_empty() {
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} (missing files [{}])",
            candidate.display(),
            missing.join(", ")
        ));
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!(
            "Unable to locate the {DEFAULT_FONT_FAMILY_NAME} fonts. Checked: {}. Set {FONTS_DIR_ENV} to a directory containing {}.",
            attempts.join(", "),
            FONT_FILES.join(" and ")
        ),
    ))
}

fn load_font(path: &Path) -> io::Result<Font<'static>> {
    let data = std::fs::read(path)?;
    Font::try_from_vec(data).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse font {}", path.display()),
        )
    })
}

/// Loads the default regular and bold faces.
pub fn default_fonts() -> io::Result<FontPair> {
    let directory = resolve_font_directory()?;
    debug!("loading fonts from {}", directory.display());
    Ok(FontPair {
        regular: load_font(&directory.join(REGULAR_FILE))?,
        bold: load_font(&directory.join(BOLD_FILE))?,
    })
}

/// Indicates whether the default fonts can be found on disk.
pub fn default_fonts_available() -> bool {
    resolve_font_directory().is_ok()
}
