//! Mod staging
//!
//! Turns a mod source (a directory or an archive) into a staging directory
//! and lists the relative paths it provides.

use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use thiserror::Error;
use walkdir::WalkDir;
use zip::read::ZipArchive;

use crate::fs::copy_dir_all;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid archive {}: {reason}", path.display())]
    ArchiveFormat { path: PathBuf, reason: String },
    #[error("Archive entry escapes the staging directory: {0}")]
    PathTraversal(String),
    #[error("A mod is already staged at {}", .0.display())]
    AlreadyInstalled(PathBuf),
    #[error("Unsupported mod source {} (expected a directory, .zip, .tar.gz or .tgz)", .0.display())]
    Unsupported(PathBuf),
}

impl StagingError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| StagingError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Produces a staging directory from a mod source
pub trait Stager {
    /// Populate `destination`, which must not exist yet.
    fn stage(&self, source: &Path, destination: &Path) -> Result<(), StagingError>;
}

/// Stages plain directories, zip archives and gzipped tarballs
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveStager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Directory,
    Zip,
    TarGz,
}

impl Stager for ArchiveStager {
    fn stage(&self, source: &Path, destination: &Path) -> Result<(), StagingError> {
        if destination.exists() {
            return Err(StagingError::AlreadyInstalled(destination.to_path_buf()));
        }
        let format = detect_format(source)?;

        let parent = destination
            .parent()
            .ok_or_else(|| StagingError::Unsupported(destination.to_path_buf()))?;
        fs::create_dir_all(parent).map_err(StagingError::io(parent))?;

        // Unpack next to the destination so the final rename stays on one filesystem
        let temp = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)
            .map_err(StagingError::io(parent))?;
        let content = temp.path().join("content");

        match format {
            SourceFormat::Directory => {
                copy_dir_all(source, &content).map_err(StagingError::io(source))?
            }
            SourceFormat::Zip => unpack_zip(source, &content)?,
            SourceFormat::TarGz => unpack_tar_gz(source, &content)?,
        }

        fs::rename(&content, destination).map_err(StagingError::io(destination))?;
        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            ?format,
            "Staged mod"
        );
        Ok(())
    }
}

/// Name a mod after its source, dropping archive extensions.
pub fn mod_name(source: &Path) -> Option<String> {
    let name = source.file_name()?.to_string_lossy().into_owned();
    if source.is_dir() {
        return Some(name);
    }
    let lower = name.to_ascii_lowercase();
    let stem_len = [".tar.gz", ".tgz", ".zip"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| name.len() - ext.len())
        .unwrap_or(name.len());
    let stem = name[..stem_len].trim();
    (!stem.is_empty()).then(|| stem.to_string())
}

/// List every file below `location` as a path relative to it.
pub fn scan_files(location: &Path) -> Result<BTreeSet<PathBuf>, StagingError> {
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(location).min_depth(1).follow_links(true) {
        let entry = entry.map_err(|err| StagingError::Io {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| location.to_path_buf()),
            source: err.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(location) {
            files.insert(relative.to_path_buf());
        }
    }
    Ok(files)
}

fn detect_format(source: &Path) -> Result<SourceFormat, StagingError> {
    let meta = fs::metadata(source).map_err(StagingError::io(source))?;
    if meta.is_dir() {
        return Ok(SourceFormat::Directory);
    }
    let lower = source
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if lower.ends_with(".zip") {
        Ok(SourceFormat::Zip)
    } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        Ok(SourceFormat::TarGz)
    } else {
        Err(StagingError::Unsupported(source.to_path_buf()))
    }
}

fn unpack_zip(archive_path: &Path, content: &Path) -> Result<(), StagingError> {
    let format_err = |err: zip::result::ZipError| StagingError::ArchiveFormat {
        path: archive_path.to_path_buf(),
        reason: err.to_string(),
    };

    let file = File::open(archive_path).map_err(StagingError::io(archive_path))?;
    let mut zip = ZipArchive::new(file).map_err(format_err)?;
    fs::create_dir_all(content).map_err(StagingError::io(content))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(format_err)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(StagingError::PathTraversal(entry.name().to_string()));
        };
        let outpath = content.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(StagingError::io(&outpath))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(StagingError::io(parent))?;
        }
        let mut out = File::create(&outpath).map_err(StagingError::io(&outpath))?;
        io::copy(&mut entry, &mut out).map_err(StagingError::io(&outpath))?;
    }
    Ok(())
}

fn unpack_tar_gz(archive_path: &Path, content: &Path) -> Result<(), StagingError> {
    let format_err = |err: io::Error| StagingError::ArchiveFormat {
        path: archive_path.to_path_buf(),
        reason: err.to_string(),
    };

    let file = File::open(archive_path).map_err(StagingError::io(archive_path))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    fs::create_dir_all(content).map_err(StagingError::io(content))?;

    for entry in archive.entries().map_err(format_err)? {
        let mut entry = entry.map_err(format_err)?;
        let path = entry.path().map_err(format_err)?.into_owned();
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(StagingError::PathTraversal(path.display().to_string()));
        }
        entry.unpack_in(content).map_err(StagingError::io(content))?;
    }
    Ok(())
}
