//! Directory packages
//!
//! A package is a directory tree of YAML files. Reading walks the tree in
//! lexicographic order and stamps each document with the file it came from;
//! writing groups documents by that file and writes them back. The
//! read-writer additionally deletes files whose documents all disappeared
//! between a read and the following write.

use crate::annotations::{
    error_if_missing_annotation, get_index, path_set, INDEX_ANNOTATION, PACKAGE_ANNOTATION,
    PATH_ANNOTATION,
};
use crate::byteio::{ByteReader, ByteWriter};
use crate::errors::KioError;
use crate::pipeline::{Reader, Writer};
use glob::Pattern;
use kpipe_yaml::RNode;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Globs used when `match_files_glob` is empty
pub const DEFAULT_MATCH: [&str; 2] = ["*.yaml", "*.yml"];

/// Resolve a package-relative path, rejecting anything that leaves the
/// package or names the package root itself
fn package_file(root: &Path, relative: &str) -> Result<PathBuf, KioError> {
    let mut clean = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir if clean.pop() => {}
            _ => return Err(KioError::PathEscapesPackage(relative.to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(KioError::PathIsDirectory(relative.to_string()));
    }
    Ok(root.join(clean))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A file selected for reading
#[derive(Debug)]
struct PackageFile {
    absolute: PathBuf,
    relative: String,
    package: String,
}

/// Reads every matching file below a directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalPackageReader {
    /// Package root; may also name a single file
    #[serde(rename = "path")]
    pub package_path: PathBuf,

    /// Marker file that makes a directory a subpackage
    pub package_file_name: String,

    /// File name globs to read; defaults to [`DEFAULT_MATCH`]
    pub match_files_glob: Vec<String>,

    pub include_subpackages: bool,

    /// Fail on documents without apiVersion or kind
    pub error_if_non_resources: bool,

    /// Do not stamp index, path and package annotations
    pub omit_reader_annotations: bool,

    /// Extra annotations applied to every document
    pub set_annotations: BTreeMap<String, String>,
}

impl LocalPackageReader {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        LocalPackageReader {
            package_path: package_path.into(),
            ..Default::default()
        }
    }

    fn patterns(&self) -> Result<Vec<Pattern>, KioError> {
        let globs: Vec<&str> = if self.match_files_glob.is_empty() {
            DEFAULT_MATCH.to_vec()
        } else {
            self.match_files_glob.iter().map(String::as_str).collect()
        };
        Ok(globs
            .into_iter()
            .map(Pattern::new)
            .collect::<Result<_, _>>()?)
    }

    fn is_subpackage(&self, dir: &Path) -> Result<bool, KioError> {
        if self.package_file_name.is_empty() {
            return Ok(false);
        }
        Ok(dir.join(&self.package_file_name).try_exists()?)
    }

    /// Files to read, in walk order
    fn files(&self) -> Result<Vec<PackageFile>, KioError> {
        let patterns = self.patterns()?;
        let root = self.package_path.as_path();
        let base = if fs::metadata(root)?.is_dir() {
            root
        } else {
            root.parent().unwrap_or(Path::new(""))
        };

        let mut files = Vec::new();
        let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                if entry.depth() > 0
                    && !self.include_subpackages
                    && self.is_subpackage(entry.path())?
                {
                    debug!("Skipping subpackage {}", entry.path().display());
                    walker.skip_current_dir();
                }
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !patterns.iter().any(|p| p.matches(&name)) {
                continue;
            }
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            let package = match relative.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => slash_path(dir),
                _ => ".".to_string(),
            };
            files.push(PackageFile {
                absolute: entry.path().to_path_buf(),
                relative: slash_path(relative),
                package,
            });
        }
        Ok(files)
    }

    fn read_file(&self, file: &PackageFile) -> Result<Vec<RNode>, KioError> {
        debug!("Reading {}", file.absolute.display());
        let mut reader = ByteReader::new(File::open(&file.absolute)?);
        reader.omit_reader_annotations = self.omit_reader_annotations;
        reader.set_annotations = self.set_annotations.clone();
        if !self.omit_reader_annotations {
            reader
                .set_annotations
                .insert(PATH_ANNOTATION.to_string(), file.relative.clone());
            reader
                .set_annotations
                .insert(PACKAGE_ANNOTATION.to_string(), file.package.clone());
        }
        let nodes = reader.read()?;
        if self.error_if_non_resources && nodes.iter().any(|n| !n.get_meta().is_resource()) {
            return Err(KioError::NonResource {
                path: file.relative.clone(),
            });
        }
        Ok(nodes)
    }
}

impl Reader for LocalPackageReader {
    fn read(&mut self) -> Result<Vec<RNode>, KioError> {
        if self.package_path.as_os_str().is_empty() {
            return Err(KioError::MissingPackagePath);
        }
        let files = self.files()?;
        let per_file = files
            .par_iter()
            .map(|file| self.read_file(file))
            .collect::<Result<Vec<_>, _>>()?;
        let nodes: Vec<RNode> = per_file.into_iter().flatten().collect();
        debug!(
            "Read {} documents from {} files under {}",
            nodes.len(),
            files.len(),
            self.package_path.display()
        );
        Ok(nodes)
    }
}

/// Writes documents back to the files named by their path annotations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPackageWriter {
    pub package_path: PathBuf,

    /// Keep index, path and package annotations in the written files
    pub keep_reader_annotations: bool,

    /// Annotations removed from every document before writing
    pub clear_annotations: Vec<String>,
}

impl LocalPackageWriter {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        LocalPackageWriter {
            package_path: package_path.into(),
            ..Default::default()
        }
    }

    /// Group nodes by path annotation, each group ordered by index
    fn group(nodes: Vec<RNode>) -> Result<BTreeMap<String, Vec<RNode>>, KioError> {
        let mut groups: BTreeMap<String, Vec<(usize, RNode)>> = BTreeMap::new();
        for node in nodes {
            let path = node.get_annotation(PATH_ANNOTATION).unwrap_or_default();
            let index = get_index(&node)?.unwrap_or_default();
            groups.entry(path).or_default().push((index, node));
        }
        Ok(groups
            .into_iter()
            .map(|(path, mut nodes)| {
                nodes.sort_by_key(|(index, _)| *index);
                (path, nodes.into_iter().map(|(_, node)| node).collect())
            })
            .collect())
    }
}

impl Writer for LocalPackageWriter {
    fn write(&mut self, nodes: Vec<RNode>) -> Result<(), KioError> {
        error_if_missing_annotation(&nodes, &[INDEX_ANNOTATION, PATH_ANNOTATION])?;
        if !fs::metadata(&self.package_path)?.is_dir() {
            return Err(KioError::NotADirectory(self.package_path.clone()));
        }

        let groups = Self::group(nodes)?;
        let mut targets = Vec::with_capacity(groups.len());
        for (path, nodes) in groups {
            let target = package_file(&self.package_path, &path)?;
            if target.is_dir() {
                return Err(KioError::PathIsDirectory(path));
            }
            targets.push((target, nodes));
        }

        for (target, nodes) in targets {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!("Writing {} documents to {}", nodes.len(), target.display());
            let mut writer = ByteWriter::new(BufWriter::new(File::create(&target)?));
            writer.keep_reader_annotations = self.keep_reader_annotations;
            writer.clear_annotations = self.clear_annotations.clone();
            writer.write(nodes)?;
        }
        Ok(())
    }
}

/// Reads a package and writes it back in place, deleting files that no
/// longer hold any document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPackageReadWriter {
    pub package_path: PathBuf,
    pub package_file_name: String,
    pub match_files_glob: Vec<String>,
    pub include_subpackages: bool,
    pub error_if_non_resources: bool,
    pub omit_reader_annotations: bool,
    pub set_annotations: BTreeMap<String, String>,
    pub keep_reader_annotations: bool,

    /// Never delete files on write
    pub no_delete_files: bool,

    files: BTreeSet<String>,
}

impl LocalPackageReadWriter {
    pub fn new(package_path: impl Into<PathBuf>) -> Self {
        LocalPackageReadWriter {
            package_path: package_path.into(),
            ..Default::default()
        }
    }

    /// Files that produced the documents of the last read or write
    pub fn tracked_files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    fn reader(&self) -> LocalPackageReader {
        LocalPackageReader {
            package_path: self.package_path.clone(),
            package_file_name: self.package_file_name.clone(),
            match_files_glob: self.match_files_glob.clone(),
            include_subpackages: self.include_subpackages,
            error_if_non_resources: self.error_if_non_resources,
            omit_reader_annotations: self.omit_reader_annotations,
            set_annotations: self.set_annotations.clone(),
        }
    }

    fn delete_removed(&self, current: &BTreeSet<String>) -> Result<usize, KioError> {
        let mut deleted = 0;
        for path in self.files.difference(current) {
            let target = package_file(&self.package_path, path)?;
            debug!("Deleting {}", target.display());
            fs::remove_file(&target)?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

impl Reader for LocalPackageReadWriter {
    fn read(&mut self) -> Result<Vec<RNode>, KioError> {
        let nodes = self.reader().read()?;
        if !self.no_delete_files {
            self.files = path_set(&nodes);
        }
        Ok(nodes)
    }
}

impl Writer for LocalPackageReadWriter {
    fn write(&mut self, nodes: Vec<RNode>) -> Result<(), KioError> {
        let current = path_set(&nodes);
        let count = nodes.len();
        let mut writer = LocalPackageWriter {
            package_path: self.package_path.clone(),
            keep_reader_annotations: self.keep_reader_annotations,
            clear_annotations: self.set_annotations.keys().cloned().collect(),
        };
        writer.write(nodes)?;

        let deleted = if self.no_delete_files {
            0
        } else {
            self.delete_removed(&current)?
        };
        info!(
            "Wrote {} documents to {} files, deleted {} files",
            count,
            current.len(),
            deleted
        );
        self.files = current;
        Ok(())
    }
}

/// In-memory document list usable as both reader and writer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageBuffer {
    pub nodes: Vec<RNode>,
}

impl PackageBuffer {
    pub fn new(nodes: Vec<RNode>) -> Self {
        PackageBuffer { nodes }
    }
}

impl Reader for PackageBuffer {
    fn read(&mut self) -> Result<Vec<RNode>, KioError> {
        Ok(self.nodes.clone())
    }
}

impl Writer for PackageBuffer {
    fn write(&mut self, nodes: Vec<RNode>) -> Result<(), KioError> {
        self.nodes = nodes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            assert!(fs::create_dir_all(parent).is_ok());
        }
        assert!(fs::write(path, content).is_ok());
    }

    fn package() -> TempDir {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir should be created");
        };
        write_file(dir.path(), "a.yaml", "kind: A\napiVersion: v1\n---\nkind: A2\napiVersion: v1\n");
        write_file(dir.path(), "b.yaml", "kind: B\napiVersion: v1\n");
        write_file(dir.path(), "notes.txt", "not yaml");
        write_file(dir.path(), "sub/Kptfile", "kind: Kptfile\n");
        write_file(dir.path(), "sub/c.yaml", "kind: C\napiVersion: v1\n");
        write_file(dir.path(), "plain/d.yml", "kind: D\napiVersion: v1\n");
        dir
    }

    fn kinds(nodes: &[RNode]) -> Vec<String> {
        nodes.iter().map(|n| n.get_meta().kind).collect()
    }

    #[test]
    fn test_package_file_stays_inside() {
        let root = Path::new("/pkg");
        assert!(package_file(root, "a/b.yaml").is_ok_and(|p| p == Path::new("/pkg/a/b.yaml")));
        assert!(package_file(root, "a/../b.yaml").is_ok_and(|p| p == Path::new("/pkg/b.yaml")));
        assert!(matches!(
            package_file(root, "../b.yaml"),
            Err(KioError::PathEscapesPackage(_))
        ));
        assert!(matches!(
            package_file(root, "/etc/passwd"),
            Err(KioError::PathEscapesPackage(_))
        ));
        assert!(matches!(
            package_file(root, "."),
            Err(KioError::PathIsDirectory(_))
        ));
    }

    #[test]
    fn test_missing_package_path() {
        let mut reader = LocalPackageReader::default();
        assert!(matches!(reader.read(), Err(KioError::MissingPackagePath)));
    }

    #[test]
    fn test_read_skips_subpackages() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        reader.package_file_name = "Kptfile".to_string();
        let Ok(nodes) = reader.read() else {
            panic!("read should succeed");
        };
        assert_eq!(kinds(&nodes), vec!["A", "A2", "B", "D"]);
        assert!(nodes
            .iter()
            .all(|n| n.get_annotation(PATH_ANNOTATION).as_deref() != Some("sub/c.yaml")));
    }

    #[test]
    fn test_read_includes_subpackages() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        reader.package_file_name = "Kptfile".to_string();
        reader.include_subpackages = true;
        let Ok(nodes) = reader.read() else {
            panic!("read should succeed");
        };
        assert_eq!(kinds(&nodes), vec!["A", "A2", "B", "D", "C"]);
    }

    #[test]
    fn test_read_annotations() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        let Ok(nodes) = reader.read() else {
            panic!("read should succeed");
        };
        let second = &nodes[1];
        assert_eq!(second.get_annotation(PATH_ANNOTATION), Some("a.yaml".to_string()));
        assert_eq!(second.get_annotation(PACKAGE_ANNOTATION), Some(".".to_string()));
        assert_eq!(second.get_annotation(INDEX_ANNOTATION), Some("1".to_string()));

        let nested = nodes.iter().find(|n| n.get_meta().kind == "D");
        assert_eq!(
            nested.and_then(|n| n.get_annotation(PACKAGE_ANNOTATION)),
            Some("plain".to_string())
        );
    }

    #[test]
    fn test_read_omits_annotations() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        reader.omit_reader_annotations = true;
        let Ok(nodes) = reader.read() else {
            panic!("read should succeed");
        };
        assert!(nodes.iter().all(|n| n.annotations().is_empty()));
    }

    #[test]
    fn test_read_custom_glob_and_bad_glob() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        reader.match_files_glob = vec!["*.yml".to_string()];
        assert!(reader.read().is_ok_and(|nodes| kinds(&nodes) == vec!["D"]));

        reader.match_files_glob = vec!["[".to_string()];
        assert!(matches!(reader.read(), Err(KioError::Pattern(_))));
    }

    #[test]
    fn test_read_single_file() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path().join("b.yaml"));
        let Ok(nodes) = reader.read() else {
            panic!("read should succeed");
        };
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].get_annotation(PATH_ANNOTATION), Some("b.yaml".to_string()));
    }

    #[test]
    fn test_read_rejects_non_resources() {
        let dir = package();
        write_file(dir.path(), "z.yaml", "a: 1\n");
        let mut reader = LocalPackageReader::new(dir.path());
        reader.error_if_non_resources = true;
        let result = reader.read();
        assert!(matches!(result, Err(KioError::NonResource { path }) if path == "z.yaml"));
    }

    #[test]
    fn test_reader_from_yaml_config() {
        let reader: Result<LocalPackageReader, _> = serde_yaml::from_str(
            "path: pkg\npackageFileName: Kptfile\nincludeSubpackages: true\nmatchFilesGlob: ['*.json']\n",
        );
        let Ok(reader) = reader else {
            panic!("reader config should parse");
        };
        assert_eq!(reader.package_path, PathBuf::from("pkg"));
        assert_eq!(reader.package_file_name, "Kptfile");
        assert!(reader.include_subpackages);
        assert_eq!(reader.match_files_glob, vec!["*.json"]);
    }

    #[test]
    fn test_writer_requires_annotations() {
        let dir = package();
        let mut writer = LocalPackageWriter::new(dir.path());
        let result = writer.write(vec![RNode::new_mapping()]);
        assert!(matches!(result, Err(KioError::MissingAnnotation { .. })));
    }

    #[test]
    fn test_writer_rejects_directory_targets() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        let Ok(mut nodes) = reader.read() else {
            panic!("read should succeed");
        };
        nodes.truncate(1);
        let result = nodes[0].pipe(&[&kpipe_yaml::set_annotation(PATH_ANNOTATION, "plain")]);
        assert!(result.is_ok());
        let mut writer = LocalPackageWriter::new(dir.path());
        assert!(matches!(
            writer.write(nodes),
            Err(KioError::PathIsDirectory(_))
        ));
    }

    #[test]
    fn test_writer_orders_by_index_and_creates_dirs() {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir should be created");
        };
        let mut nodes = Vec::new();
        for (kind, index) in [("Second", "1"), ("First", "0")] {
            let mut node = RNode::new_mapping();
            let result = node.pipe(&[&kpipe_yaml::FieldSetter::new("kind", kind)]);
            assert!(result.is_ok());
            for (key, value) in [(PATH_ANNOTATION, "new/out.yaml"), (INDEX_ANNOTATION, index)] {
                assert!(node.pipe(&[&kpipe_yaml::set_annotation(key, value)]).is_ok());
            }
            nodes.push(node);
        }
        let mut writer = LocalPackageWriter::new(dir.path());
        assert!(writer.write(nodes).is_ok());
        let written = fs::read_to_string(dir.path().join("new/out.yaml")).unwrap_or_default();
        assert_eq!(written, "kind: First\n---\nkind: Second\n");
    }

    #[test]
    fn test_writer_requires_existing_directory() {
        let dir = package();
        let mut writer = LocalPackageWriter::new(dir.path().join("b.yaml"));
        let mut node = RNode::new_mapping();
        for (key, value) in [(PATH_ANNOTATION, "x.yaml"), (INDEX_ANNOTATION, "0")] {
            assert!(node.pipe(&[&kpipe_yaml::set_annotation(key, value)]).is_ok());
        }
        assert!(matches!(
            writer.write(vec![node]),
            Err(KioError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_read_writer_deletes_emptied_files() {
        let dir = package();
        let mut rw = LocalPackageReadWriter::new(dir.path());
        rw.package_file_name = "Kptfile".to_string();
        let Ok(nodes) = rw.read() else {
            panic!("read should succeed");
        };
        assert_eq!(
            rw.tracked_files().collect::<Vec<_>>(),
            vec!["a.yaml", "b.yaml", "plain/d.yml"]
        );
        let kept: Vec<RNode> = nodes
            .into_iter()
            .filter(|n| n.get_meta().kind != "B")
            .collect();
        assert!(rw.write(kept).is_ok());

        assert!(!dir.path().join("b.yaml").exists());
        assert!(dir.path().join("a.yaml").exists());
        assert!(dir.path().join("sub/c.yaml").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert_eq!(
            rw.tracked_files().collect::<Vec<_>>(),
            vec!["a.yaml", "plain/d.yml"]
        );
        let a = fs::read_to_string(dir.path().join("a.yaml")).unwrap_or_default();
        assert_eq!(a, "kind: A\napiVersion: v1\n---\nkind: A2\napiVersion: v1\n");
    }

    #[test]
    fn test_subpackage_check_propagates_stat_errors() {
        let dir = package();
        let mut reader = LocalPackageReader::new(dir.path());
        reader.package_file_name = "Kpt\0file".to_string();
        assert!(matches!(reader.read(), Err(KioError::Io(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_read_writer_keeps_files_when_a_write_fails() {
        let dir = package();
        let mut rw = LocalPackageReadWriter::new(dir.path());
        rw.package_file_name = "Kptfile".to_string();
        let Ok(nodes) = rw.read() else {
            panic!("read should succeed");
        };
        let only_a: Vec<RNode> = nodes
            .into_iter()
            .filter(|n| n.get_meta().kind.starts_with('A'))
            .collect();

        let a = dir.path().join("a.yaml");
        assert!(fs::remove_file(&a).is_ok());
        assert!(std::os::unix::fs::symlink("/dev/full", &a).is_ok());

        assert!(matches!(rw.write(only_a), Err(KioError::Io(_))));
        assert!(dir.path().join("b.yaml").exists());
        assert!(dir.path().join("plain/d.yml").exists());
        assert_eq!(
            rw.tracked_files().collect::<Vec<_>>(),
            vec!["a.yaml", "b.yaml", "plain/d.yml"]
        );
    }

    #[test]
    fn test_read_writer_no_delete() {
        let dir = package();
        let mut rw = LocalPackageReadWriter::new(dir.path());
        rw.no_delete_files = true;
        let Ok(nodes) = rw.read() else {
            panic!("read should succeed");
        };
        assert_eq!(rw.tracked_files().count(), 0);
        assert!(rw.write(nodes.into_iter().take(1).collect()).is_ok());
        assert!(dir.path().join("b.yaml").exists());
    }

    #[test]
    fn test_read_writer_clears_set_annotations() {
        let dir = package();
        let mut rw = LocalPackageReadWriter::new(dir.path());
        rw.set_annotations
            .insert("example.com/run".to_string(), "1".to_string());
        let Ok(nodes) = rw.read() else {
            panic!("read should succeed");
        };
        assert!(nodes
            .iter()
            .all(|n| n.get_annotation("example.com/run").as_deref() == Some("1")));
        assert!(rw.write(nodes).is_ok());
        let b = fs::read_to_string(dir.path().join("b.yaml")).unwrap_or_default();
        assert_eq!(b, "kind: B\napiVersion: v1\n");
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut buffer = PackageBuffer::default();
        assert!(buffer.write(vec![RNode::new_mapping()]).is_ok());
        assert!(buffer.read().is_ok_and(|nodes| nodes.len() == 1));
    }
}
