//! Zip archives for cache entries, and the md5 manifest stored beside them.
//!
//! An archive stores the cached path under its base name, so
//! `/tmp/mycache/a.txt` is archived as `mycache/a.txt` and extracted back
//! into `/tmp`. A path without a base name is archived relative to itself.

use std::{
    collections::BTreeMap,
    io::{Read, Seek, Write},
    path::{Path, PathBuf},
};

use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::store::StoreError;

/// The md5 of every archived file, keyed by its entry name.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    pub fn for_path(path: &Path) -> Result<Self, StoreError> {
        let mut files = BTreeMap::new();
        for entry in walk(path)? {
            let entry = entry?;
            if entry.file.file_type().is_file() {
                let contents = std::fs::read(entry.file.path())?;
                let digest = md5::compute(contents);
                files.insert(entry.name, format!("{digest:x}"));
            }
        }

        Ok(Self(files))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_json(json: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(json)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Write a deflated zip of `path` to `writer`.
pub fn compress<W>(path: &Path, writer: W) -> Result<W, StoreError>
where
    W: Write + Seek,
{
    let mut zip = ZipWriter::new(writer);
    let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in walk(path)? {
        let entry = entry?;
        let file_type = entry.file.file_type();
        if entry.name.is_empty() {
            continue;
        }

        let options = match unix_mode(&entry.file)? {
            Some(mode) => base_options.unix_permissions(mode),
            None => base_options,
        };

        if file_type.is_dir() {
            zip.add_directory(format!("{}/", entry.name), options)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.file.path())?;
            zip.add_symlink(entry.name, target.to_string_lossy().into_owned(), options)?;
        } else {
            zip.start_file(entry.name, options)?;
            let mut file = std::fs::File::open(entry.file.path())?;
            std::io::copy(&mut file, &mut zip)?;
        }
    }

    Ok(zip.finish()?)
}

/// Unpack an archive produced by [`compress`] back onto `path`.
pub fn extract<R>(reader: R, path: &Path) -> Result<(), StoreError>
where
    R: Read + Seek,
{
    let destination = extract_root(path);
    std::fs::create_dir_all(&destination)?;

    let mut archive = ZipArchive::new(reader)?;
    archive.extract(&destination)?;

    tracing::debug!(
        entries = archive.len(),
        destination = %destination.display(),
        "extracted archive"
    );

    Ok(())
}

/// Total size in bytes of the files under `path`.
pub fn total_size(path: &Path) -> Result<u64, StoreError> {
    std::fs::symlink_metadata(path)?;

    let mut size = 0;
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            size += entry.metadata()?.len();
        }
    }

    Ok(size)
}

struct ArchiveEntry {
    name: String,
    file: walkdir::DirEntry,
}

fn walk(path: &Path) -> Result<impl Iterator<Item = Result<ArchiveEntry, StoreError>>, StoreError> {
    // Surface a missing path as an I/O error rather than a walk error.
    std::fs::symlink_metadata(path)?;

    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let root = path.to_path_buf();

    let entries = walkdir::WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .map(move |entry| -> Result<ArchiveEntry, StoreError> {
            let file = entry?;
            let relative = file.path().strip_prefix(&root).unwrap_or(file.path());
            let relative = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let name = match (&prefix, relative.is_empty()) {
                (Some(prefix), true) => prefix.clone(),
                (Some(prefix), false) => format!("{prefix}/{relative}"),
                (None, _) => relative,
            };

            Ok(ArchiveEntry { name, file })
        });

    Ok(entries)
}

fn extract_root(path: &Path) -> PathBuf {
    match (path.file_name(), path.parent()) {
        (Some(_), Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        (Some(_), _) => PathBuf::from("."),
        (None, _) => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn unix_mode(entry: &walkdir::DirEntry) -> Result<Option<u32>, StoreError> {
    use std::os::unix::fs::PermissionsExt as _;

    let metadata = entry.metadata()?;
    Ok(Some(metadata.permissions().mode() & 0o7777))
}

#[cfg(not(unix))]
fn unix_mode(_entry: &walkdir::DirEntry) -> Result<Option<u32>, StoreError> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tree(root: &Path) {
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("a.txt"), "alpha").unwrap();
        std::fs::write(root.join("nested/b.txt"), "beta").unwrap();
    }

    #[test]
    fn test_compress_and_extract_directory() {
        let source_dir = tempfile::TempDir::new().unwrap();
        let cached = source_dir.path().join("mycache");
        write_tree(&cached);

        let archive = compress(&cached, std::io::Cursor::new(Vec::new())).unwrap();
        let bytes = archive.into_inner();

        let names = {
            let archive = ZipArchive::new(std::io::Cursor::new(&bytes)).unwrap();
            archive.file_names().map(str::to_string).collect::<Vec<_>>()
        };
        assert!(names.contains(&"mycache/a.txt".to_string()));
        assert!(names.contains(&"mycache/nested/b.txt".to_string()));

        std::fs::remove_dir_all(&cached).unwrap();
        extract(std::io::Cursor::new(bytes), &cached).unwrap();

        assert_eq!(std::fs::read_to_string(cached.join("a.txt")).unwrap(), "alpha");
        assert_eq!(
            std::fs::read_to_string(cached.join("nested/b.txt")).unwrap(),
            "beta"
        );
    }

    #[test]
    fn test_compress_and_extract_single_file() {
        let source_dir = tempfile::TempDir::new().unwrap();
        let cached = source_dir.path().join("lockfile.json");
        std::fs::write(&cached, "{}").unwrap();

        let archive = compress(&cached, std::io::Cursor::new(Vec::new())).unwrap();
        std::fs::remove_file(&cached).unwrap();
        extract(std::io::Cursor::new(archive.into_inner()), &cached).unwrap();

        assert_eq!(std::fs::read_to_string(&cached).unwrap(), "{}");
    }

    #[test]
    fn test_manifest_tracks_contents() {
        let source_dir = tempfile::TempDir::new().unwrap();
        let cached = source_dir.path().join("mycache");
        write_tree(&cached);

        let manifest = Manifest::for_path(&cached).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(
            manifest.0.get("mycache/a.txt").map(String::as_str),
            Some("2c1743a391305fbf367df8e4f069f9f9")
        );

        let json = manifest.to_json().unwrap();
        assert_eq!(Manifest::from_json(&json).unwrap(), manifest);

        std::fs::write(cached.join("a.txt"), "changed").unwrap();
        assert_ne!(Manifest::for_path(&cached).unwrap(), manifest);
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let source_dir = tempfile::TempDir::new().unwrap();
        let missing = source_dir.path().join("missing");
        assert!(matches!(
            Manifest::for_path(&missing),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn test_total_size() {
        let source_dir = tempfile::TempDir::new().unwrap();
        let cached = source_dir.path().join("mycache");
        write_tree(&cached);

        assert_eq!(total_size(&cached).unwrap(), 9);
    }

    #[test]
    fn test_total_size_of_missing_path_is_io_error() {
        let source_dir = tempfile::TempDir::new().unwrap();
        let missing = source_dir.path().join("missing");
        assert!(matches!(total_size(&missing), Err(StoreError::Io(_))));
    }
}
