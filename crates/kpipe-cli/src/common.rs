//! Common types and utilities shared across commands

use clap::{Args, Parser};
use kpipe_config::Config;
use kpipe_kio::{ByteReader, KioError, LocalPackageReadWriter, LocalPackageReader, Reader};
use kpipe_yaml::RNode;
use std::io;
use std::path::{Path, PathBuf};

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Decrease verbosity")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Where documents come from, shared by the package commands
#[derive(Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Package directory or file; reads stdin when omitted or "-"
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Descend into directories holding a package file
    #[arg(long)]
    pub include_subpackages: bool,

    /// File name glob to read (repeatable, default: *.yaml and *.yml)
    #[arg(long = "match", value_name = "GLOB")]
    pub match_files: Vec<String>,

    /// Marker file that makes a directory a subpackage
    #[arg(long, value_name = "NAME")]
    pub package_file: Option<String>,
}

impl PackageArgs {
    /// Package path, `None` when reading stdin
    pub fn package_path(&self) -> Option<&Path> {
        self.path.as_deref().filter(|p| *p != Path::new("-"))
    }

    /// Reader for the package, with flags taking precedence over config
    pub fn package_reader(&self, config: &Config) -> Option<LocalPackageReader> {
        let path = self.package_path()?;
        let match_files_glob = if self.match_files.is_empty() {
            config.match_files_glob.clone().unwrap_or_default()
        } else {
            self.match_files.clone()
        };
        Some(LocalPackageReader {
            package_path: path.to_path_buf(),
            package_file_name: self
                .package_file
                .clone()
                .or_else(|| config.package_file_name.clone())
                .unwrap_or_default(),
            match_files_glob,
            include_subpackages: self.include_subpackages
                || config.include_subpackages.unwrap_or(false),
            ..Default::default()
        })
    }

    /// Read-writer over the package, `None` when reading stdin
    pub fn package_read_writer(&self, config: &Config) -> Option<LocalPackageReadWriter> {
        let reader = self.package_reader(config)?;
        let mut rw = LocalPackageReadWriter::new(reader.package_path);
        rw.package_file_name = reader.package_file_name;
        rw.match_files_glob = reader.match_files_glob;
        rw.include_subpackages = reader.include_subpackages;
        rw.keep_reader_annotations = config.keep_reader_annotations.unwrap_or(false);
        rw.no_delete_files = config.no_delete_files.unwrap_or(false);
        Some(rw)
    }

    /// Read every document from the package or stdin
    pub fn read(&self, config: &Config) -> Result<Vec<RNode>, KioError> {
        match self.package_reader(config) {
            Some(mut reader) => reader.read(),
            None => ByteReader::new(io::stdin().lock()).read(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_level() {
        let opts = GlobalOpts {
            quiet: true,
            verbose: 2,
        };
        assert_eq!(opts.verbosity_level(), 0);
        let opts = GlobalOpts {
            quiet: false,
            verbose: 2,
        };
        assert_eq!(opts.verbosity_level(), 2);
    }

    #[test]
    fn test_dash_means_stdin() {
        let args = PackageArgs {
            path: Some(PathBuf::from("-")),
            ..Default::default()
        };
        assert!(args.package_path().is_none());
        assert!(args.package_reader(&Config::default()).is_none());
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            package_file_name: Some("Kptfile".to_string()),
            match_files_glob: Some(vec!["*.json".to_string()]),
            include_subpackages: Some(true),
            no_delete_files: Some(true),
            ..Default::default()
        };
        let args = PackageArgs {
            path: Some(PathBuf::from("pkg")),
            match_files: vec!["*.yml".to_string()],
            ..Default::default()
        };
        let Some(reader) = args.package_reader(&config) else {
            panic!("a path should give a reader");
        };
        assert_eq!(reader.package_file_name, "Kptfile");
        assert_eq!(reader.match_files_glob, vec!["*.yml"]);
        assert!(reader.include_subpackages);

        let Some(rw) = args.package_read_writer(&config) else {
            panic!("a path should give a read-writer");
        };
        assert!(rw.no_delete_files);
        assert_eq!(rw.package_path, PathBuf::from("pkg"));
    }
}
