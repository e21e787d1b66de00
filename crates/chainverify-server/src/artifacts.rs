//! Static JSON files: deployed addresses and compiled contract artifacts.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("malformed JSON in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read and parse a JSON file.
pub async fn read_json_file(path: &Path) -> Result<Value, ArtifactError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound(path.display().to_string()))
        }
        Err(source) => {
            return Err(ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Solidity identifier: `[A-Za-z_$][A-Za-z0-9_$]*`. Rules out path tricks.
pub fn is_contract_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Candidate paths for `<Name>.json`, Hardhat layout first.
pub fn artifact_candidates(dir: &Path, name: &str) -> [PathBuf; 2] {
    [
        dir.join(format!("{name}.sol")).join(format!("{name}.json")),
        dir.join(format!("{name}.json")),
    ]
}

/// Load the artifact requested as `file` (e.g. `Token.json`).
pub async fn load_artifact(dir: &Path, file: &str) -> Result<Value, ArtifactError> {
    let name = file
        .strip_suffix(".json")
        .filter(|n| is_contract_name(n))
        .ok_or_else(|| ArtifactError::NotFound(file.to_string()))?;

    for candidate in artifact_candidates(dir, name) {
        match read_json_file(&candidate).await {
            Err(ArtifactError::NotFound(_)) => continue,
            other => return other,
        }
    }
    Err(ArtifactError::NotFound(file.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_names() {
        for ok in ["Token", "UnrugpadToken", "_X", "ERC1967Proxy", "$Lib"] {
            assert!(is_contract_name(ok), "{ok}");
        }
        for bad in ["", "1Token", "../secret", "a/b", "Token.sol", "x y"] {
            assert!(!is_contract_name(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn hardhat_layout_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Token.sol")).unwrap();
        std::fs::write(dir.path().join("Token.sol/Token.json"), r#"{"contractName":"Token"}"#).unwrap();
        std::fs::write(dir.path().join("Token.json"), r#"{"contractName":"flat"}"#).unwrap();

        let v = load_artifact(dir.path(), "Token.json").await.unwrap();
        assert_eq!(v["contractName"], "Token");
    }

    #[tokio::test]
    async fn flat_layout_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Flat.json"), r#"{"abi":[]}"#).unwrap();
        std::fs::write(dir.path().join("Broken.json"), "{not json").unwrap();

        assert!(load_artifact(dir.path(), "Flat.json").await.unwrap()["abi"].is_array());
        assert!(matches!(
            load_artifact(dir.path(), "Broken.json").await,
            Err(ArtifactError::Malformed { .. })
        ));
        assert!(matches!(
            load_artifact(dir.path(), "Missing.json").await,
            Err(ArtifactError::NotFound(_))
        ));
        assert!(matches!(
            load_artifact(dir.path(), "Flat.txt").await,
            Err(ArtifactError::NotFound(_))
        ));
    }
}
