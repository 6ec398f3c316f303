//! Template → compiled artifact resolution.
//!
//! Templates resolve either from a directory of compiled contract
//! artifacts (the `artifacts/` tree a Hardhat build leaves behind, one
//! `<ContractName>.json` per contract) or from built-in placeholders used
//! against the development ledger.

use std::path::PathBuf;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact for template {template} under {}", dir.display())]
    NotFound { template: String, dir: PathBuf },
    #[error("failed to read artifact {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
    #[error("artifact {} has no deployable bytecode", path.display())]
    EmptyBytecode { path: PathBuf },
    #[error("invalid template name: {0:?}")]
    InvalidTemplate(String),
}

/// Compiled, deployable form of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub contract_name: String,
    pub bytecode: Vec<u8>,
}

/// Resolves template identifiers to deployable artifacts.
pub trait TemplateResolver: Send + Sync {
    fn resolve(&self, template: &str) -> Result<Artifact, ArtifactError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompiledArtifact {
    contract_name: String,
    bytecode: String,
}

/// Scans a directory tree for `<template>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find(&self, template: &str) -> Option<PathBuf> {
        let wanted = format!("{template}.json");
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .find(|e| e.file_name().to_str() == Some(wanted.as_str()))
            .map(|e| e.into_path())
    }
}

impl TemplateResolver for ArtifactDir {
    fn resolve(&self, template: &str) -> Result<Artifact, ArtifactError> {
        if template.is_empty() || template.contains(['/', '\\']) {
            return Err(ArtifactError::InvalidTemplate(template.to_string()));
        }

        let path = self.find(template).ok_or_else(|| ArtifactError::NotFound {
            template: template.to_string(),
            dir: self.root.clone(),
        })?;

        let content = std::fs::read_to_string(&path).map_err(|e| ArtifactError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let compiled: CompiledArtifact =
            serde_json::from_str(&content).map_err(|e| ArtifactError::Read {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let digits = compiled
            .bytecode
            .strip_prefix("0x")
            .unwrap_or(&compiled.bytecode);
        let bytecode = hex::decode(digits).map_err(|e| ArtifactError::Read {
            path: path.clone(),
            reason: format!("bytecode: {e}"),
        })?;
        if bytecode.is_empty() {
            return Err(ArtifactError::EmptyBytecode { path });
        }

        Ok(Artifact {
            contract_name: compiled.contract_name,
            bytecode,
        })
    }
}

/// Placeholder artifacts for the development ledger: the bytecode is a
/// digest of the template name, so distinct templates stay distinct.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateResolver for BuiltinTemplates {
    fn resolve(&self, template: &str) -> Result<Artifact, ArtifactError> {
        if template.trim().is_empty() {
            return Err(ArtifactError::InvalidTemplate(template.to_string()));
        }
        let bytecode = Sha256::digest(format!("satlink-builtin:{template}").as_bytes()).to_vec();
        Ok(Artifact {
            contract_name: template.to_string(),
            bytecode,
        })
    }
}
