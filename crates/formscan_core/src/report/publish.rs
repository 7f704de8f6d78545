//! All-or-nothing publication of report files.
//!
//! # Invariants
//! - Every artifact is fully written to a temporary file in the target
//!   directory before any of them is renamed into place.
//! - A staging failure leaves no new file behind.
//! - Every target lives directly in the publish directory, so each persist is
//!   a same-directory rename.

use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// One named text file to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub file_name: String,
    pub contents: String,
}

/// A report file could not be staged or published.
#[derive(Debug)]
pub struct PublishError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot write report `{}`: {}", self.path.display(), self.source)
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Writes all artifacts into `dir`, returning the published paths in input
/// order.
///
/// Every `file_name` must be a single path component. Names are checked
/// before anything is staged.
pub fn publish_reports(dir: &Path, artifacts: &[ReportArtifact]) -> Result<Vec<PathBuf>, PublishError> {
    for artifact in artifacts {
        check_file_name(dir, &artifact.file_name)?;
    }

    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let target = dir.join(&artifact.file_name);
        let temp = stage(dir, &artifact.contents).map_err(|source| {
            error!(
                "event=publish_reports module=report status=error stage=staging path={} error={source}",
                target.display()
            );
            PublishError {
                path: target.clone(),
                source,
            }
        })?;
        staged.push((temp, target));
    }

    let mut published = Vec::with_capacity(staged.len());
    for (temp, target) in staged {
        temp.persist(&target).map_err(|err| {
            error!(
                "event=publish_reports module=report status=error stage=persist path={} error={}",
                target.display(),
                err.error
            );
            PublishError {
                path: target.clone(),
                source: err.error,
            }
        })?;
        published.push(target);
    }

    info!(
        "event=publish_reports module=report status=ok dir={} files={}",
        dir.display(),
        published.len()
    );
    Ok(published)
}

fn check_file_name(dir: &Path, file_name: &str) -> Result<(), PublishError> {
    let mut components = Path::new(file_name).components();
    let single_component = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single_component {
        return Ok(());
    }

    let path = dir.join(file_name);
    error!(
        "event=publish_reports module=report status=error stage=validate path={}",
        path.display()
    );
    Err(PublishError {
        path,
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            "report file name must be a single path component",
        ),
    })
}

fn stage(dir: &Path, contents: &str) -> io::Result<NamedTempFile> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    Ok(temp)
}
