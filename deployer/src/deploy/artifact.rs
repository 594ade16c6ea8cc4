//! Build artifacts
//!
//! The toolchain and the packager are opaque collaborators of the pipeline:
//! whatever implements [`ArtifactBuilder`] hands back a named archive.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::platform::Architecture;
use crate::utils::sha256_hash;

/// Name of the executable inside the archive, as the runtime expects it
pub const BOOTSTRAP: &str = "bootstrap";

/// Source-control revision a build was made from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRevision {
    /// First 7 characters of the commit id
    pub short_hash: String,

    /// Whether the working tree had uncommitted changes
    pub dirty: bool,
}

impl SourceRevision {
    pub fn new(short_hash: impl Into<String>, dirty: bool) -> Self {
        Self {
            short_hash: short_hash.into(),
            dirty,
        }
    }

    /// Parse `git rev-parse HEAD` and `git status --porcelain` output
    pub fn from_git_output(rev_parse: &str, porcelain: &str) -> Result<Self, DeployError> {
        let commit = rev_parse.trim();
        let short_hash = commit.get(..7).ok_or_else(|| {
            DeployError::BuildError(format!("unexpected git commit id '{}'", commit))
        })?;
        Ok(Self::new(short_hash, !porcelain.is_empty()))
    }

    /// Read the revision of the repository at `dir`
    pub async fn current(dir: &std::path::Path) -> Result<Self, DeployError> {
        let commit = git_output(dir, &["rev-parse", "HEAD"], "getting current Git commit").await?;
        let status = git_output(dir, &["status", "--porcelain"], "checking git status").await?;
        Self::from_git_output(&commit, &status)
    }

    /// `<hash>` or `<hash>-dirty`
    pub fn label(&self) -> String {
        if self.dirty {
            format!("{}-dirty", self.short_hash)
        } else {
            self.short_hash.clone()
        }
    }
}

async fn git_output(dir: &std::path::Path, args: &[&str], action: &str) -> Result<String, DeployError> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| DeployError::BuildError(format!("Error {}: {}", action, e)))?;

    if !output.status.success() {
        return Err(DeployError::BuildError(format!(
            "Error {}: {}",
            action,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `<function>-<hash>[-dirty].zip`
pub fn artifact_filename(function_name: &str, short_hash: &str, dirty: bool) -> String {
    if dirty {
        format!("{}-{}-dirty.zip", function_name, short_hash)
    } else {
        format!("{}-{}.zip", function_name, short_hash)
    }
}

/// A packaged, content-addressed archive ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub filename: String,
    pub revision: SourceRevision,
    pub bytes: Vec<u8>,

    /// Hex sha256 of `bytes`
    pub sha256: String,
}

impl BuildArtifact {
    pub fn new(function_name: &str, revision: SourceRevision, bytes: Vec<u8>) -> Self {
        Self {
            filename: artifact_filename(function_name, &revision.short_hash, revision.dirty),
            sha256: sha256_hash(&bytes),
            revision,
            bytes,
        }
    }

    /// Metadata stored alongside the uploaded blob
    pub fn metadata(&self) -> Vec<(String, String)> {
        vec![
            ("source-revision".to_string(), self.revision.label()),
            ("sha256".to_string(), self.sha256.clone()),
        ]
    }
}

/// Produces a deployable archive for a function
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    async fn build(
        &self,
        function_name: &str,
        architecture: Architecture,
    ) -> Result<BuildArtifact, DeployError>;
}

/// Package a binary as the single executable entry of a zip archive
pub fn package_binary(name: &str, binary: &[u8]) -> Result<Vec<u8>, DeployError> {
    let package_error = |e: zip::result::ZipError| DeployError::PackageError(e.to_string());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    writer.start_file(name, options).map_err(package_error)?;
    writer.write_all(binary)?;
    let cursor = writer.finish().map_err(package_error)?;
    Ok(cursor.into_inner())
}

/// Builds a Go function with the local toolchain
#[derive(Debug, Clone)]
pub struct GoBuilder {
    /// Module directory to build in
    pub workdir: PathBuf,

    /// Toolchain executable
    pub go: String,
}

impl GoBuilder {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            go: "go".to_string(),
        }
    }

    async fn compile(&self, architecture: Architecture, revision: &SourceRevision) -> Result<File, DeployError> {
        let ldflags = format!("-s -w -X main.Commit={}", revision.label());
        debug!("Running {} build -ldflags \"{}\" (GOARCH={})", self.go, ldflags, architecture.go_arch());

        let status = Command::new(&self.go)
            .current_dir(&self.workdir)
            .args(["build", "-ldflags", &ldflags, "-o", BOOTSTRAP, "."])
            .env("GOARCH", architecture.go_arch())
            .env("CGO_ENABLED", "0")
            .env("GOOS", "linux")
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DeployError::BuildError(format!("Failed to run {} build: {}", self.go, e)))?;

        if !status.success() {
            return Err(DeployError::BuildError(format!(
                "{} build exited with {}",
                self.go, status
            )));
        }

        let binary = File::new(self.workdir.join(BOOTSTRAP));
        binary.set_permissions_755().await?;
        Ok(binary)
    }
}

#[async_trait]
impl ArtifactBuilder for GoBuilder {
    async fn build(
        &self,
        function_name: &str,
        architecture: Architecture,
    ) -> Result<BuildArtifact, DeployError> {
        info!("Building {} for {}...", function_name, architecture);

        let revision = SourceRevision::current(&self.workdir).await?;
        let binary = self.compile(architecture, &revision).await?;
        let bytes = package_binary(BOOTSTRAP, &binary.read_bytes().await?)?;

        let artifact = BuildArtifact::new(function_name, revision, bytes);
        info!("Packaged {} ({} bytes)", artifact.filename, artifact.bytes.len());
        Ok(artifact)
    }
}
