//! Chart provenance
//!
//! A provenance file (`<archive>.prov`) is a clear-signed message: the chart's
//! `Chart.yaml`, a `...` separator, then the SHA-256 digest of every signed
//! archive. The signature is a minisign signature box over that body.
//!
//! ```text
//! -----BEGIN CHARTROOM SIGNED MESSAGE-----
//! apiVersion: v2
//! name: nginx
//! version: 1.0.0
//! ...
//! files:
//!   nginx-1.0.0.tgz: sha256:9f86d08...
//! -----BEGIN CHARTROOM SIGNATURE-----
//! untrusted comment: signature from minisign secret key
//! RUQf...
//! trusted comment: Chartroom Maintainers
//! 0Mzv...
//! -----END CHARTROOM SIGNATURE-----
//! ```

use minisign::{PublicKey, SecretKey, SignatureBox};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::ProvenanceError;
use crate::index::Maintainer;

/// Suffix appended to an archive name or URL to locate its provenance file
pub const PROVENANCE_SUFFIX: &str = ".prov";

const MESSAGE_HEADER: &str = "-----BEGIN CHARTROOM SIGNED MESSAGE-----";
const SIGNATURE_HEADER: &str = "-----BEGIN CHARTROOM SIGNATURE-----";
const SIGNATURE_FOOTER: &str = "-----END CHARTROOM SIGNATURE-----";
const BODY_SEPARATOR: &str = "...";

type Result<T> = std::result::Result<T, ProvenanceError>;

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    /// Trusted comment of the signature, identifying the signer
    pub signed_by: String,
    /// Base64 public key that verified the signature
    pub key: String,
    /// Archive file name the digest was checked for
    pub file_name: String,
    /// `sha256:<hex>` digest of the archive
    pub file_hash: String,
}

/// Chart metadata as found in an archive's `Chart.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SumCollection {
    files: BTreeMap<String, String>,
}

/// Trusted public keys
#[derive(Debug, Clone)]
pub struct Keyring {
    keys: Vec<PublicKey>,
}

impl Keyring {
    /// Load a keyring file
    ///
    /// One base64 minisign public key per line. `untrusted comment:` lines,
    /// `#` comments and blank lines are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ProvenanceError::Keyring {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|message| ProvenanceError::Keyring {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut keys = Vec::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("untrusted comment:") {
                continue;
            }
            let key = PublicKey::from_base64(line)
                .map_err(|e| format!("line {}: invalid public key: {}", n + 1, e))?;
            keys.push(key);
        }

        if keys.is_empty() {
            return Err("no public keys found".to_string());
        }
        Ok(Self { keys })
    }

    /// First key that verifies `signature` over `body`
    fn verify(&self, body: &[u8], signature: &SignatureBox) -> Result<&PublicKey> {
        let mut last_error = String::new();
        for key in &self.keys {
            let mut cursor = Cursor::new(body);
            match minisign::verify(key, signature, &mut cursor, true, false, false) {
                Ok(()) => return Ok(key),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(ProvenanceError::SignatureInvalid {
            message: last_error,
        })
    }
}

/// Whether `path` carries the packed chart extension
pub fn is_tar(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tgz"))
}

/// Provenance file path for an archive
pub fn provenance_path(archive: &Path) -> PathBuf {
    let mut path = archive.as_os_str().to_owned();
    path.push(PROVENANCE_SUFFIX);
    PathBuf::from(path)
}

/// `sha256:<hex>` digest of a file
pub fn digest_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path).map_err(|e| ProvenanceError::ArchiveUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(digest(&data))
}

fn digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// Verify a chart archive against its `.prov` file and a keyring
pub fn verify_chart(archive: &Path, keyring: &Path) -> Result<Verification> {
    let metadata = std::fs::metadata(archive).map_err(|e| ProvenanceError::ArchiveUnreadable {
        path: archive.to_path_buf(),
        source: e,
    })?;
    if metadata.is_dir() {
        return Err(ProvenanceError::UnpackedChart {
            path: archive.to_path_buf(),
        });
    }
    if !is_tar(archive) {
        return Err(ProvenanceError::NotAnArchive {
            path: archive.to_path_buf(),
        });
    }

    let prov_path = provenance_path(archive);
    let message =
        std::fs::read_to_string(&prov_path).map_err(|e| ProvenanceError::MissingProvenance {
            path: prov_path.clone(),
            source: e,
        })?;

    let keyring = Keyring::load(keyring)?;
    verify_message(archive, &message, &keyring)
}

fn verify_message(archive: &Path, message: &str, keyring: &Keyring) -> Result<Verification> {
    let (body, signature) = split_message(message)?;
    let signature = SignatureBox::from_string(signature).map_err(|e| ProvenanceError::Malformed {
        message: format!("invalid signature block: {}", e),
    })?;

    let key = keyring.verify(body.as_bytes(), &signature)?;
    let signed_by = signature
        .trusted_comment()
        .map_err(|e| ProvenanceError::Malformed {
            message: format!("invalid trusted comment: {}", e),
        })?;

    let sums = parse_sums(body)?;
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let expected = sums
        .files
        .get(&file_name)
        .ok_or_else(|| ProvenanceError::MissingDigest {
            file: file_name.clone(),
        })?;

    let actual = digest_file(archive)?;
    if *expected != actual {
        return Err(ProvenanceError::DigestMismatch {
            file: file_name,
            expected: expected.clone(),
            actual,
            signed_by,
        });
    }

    Ok(Verification {
        signed_by,
        key: key.to_base64(),
        file_name,
        file_hash: actual,
    })
}

/// Split a clear-signed message into its body and signature block
fn split_message(message: &str) -> Result<(&str, &str)> {
    let malformed = |message: &str| ProvenanceError::Malformed {
        message: message.to_string(),
    };

    let rest = message
        .trim_start()
        .strip_prefix(MESSAGE_HEADER)
        .and_then(|r| r.strip_prefix('\n'))
        .ok_or_else(|| malformed("missing signed message header"))?;
    let (body, signed) = rest
        .split_once(SIGNATURE_HEADER)
        .ok_or_else(|| malformed("missing signature block"))?;
    let (signature, _) = signed
        .split_once(SIGNATURE_FOOTER)
        .ok_or_else(|| malformed("unterminated signature block"))?;

    Ok((body, signature.trim()))
}

fn parse_sums(body: &str) -> Result<SumCollection> {
    let separator = format!("\n{}\n", BODY_SEPARATOR);
    let (_, sums) = body
        .split_once(&separator)
        .ok_or_else(|| ProvenanceError::Malformed {
            message: "message block must have at least two parts".to_string(),
        })?;
    serde_yaml::from_str(sums).map_err(|e| ProvenanceError::Malformed {
        message: format!("invalid files section: {}", e),
    })
}

/// Read `Chart.yaml` from the top-level directory of a chart archive
pub fn load_chart_metadata(archive: &Path) -> Result<ChartMetadata> {
    let unreadable = |e: std::io::Error| ProvenanceError::ArchiveUnreadable {
        path: archive.to_path_buf(),
        source: e,
    };

    let file = std::fs::File::open(archive).map_err(unreadable)?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));

    for entry in tar.entries().map_err(unreadable)? {
        let mut entry = entry.map_err(unreadable)?;
        let path = entry.path().map_err(unreadable)?.into_owned();
        let is_chart_yaml =
            path.components().count() == 2 && path.file_name().is_some_and(|n| n == "Chart.yaml");
        if !is_chart_yaml {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content).map_err(unreadable)?;
        return serde_yaml::from_str(&content).map_err(|e| ProvenanceError::Malformed {
            message: format!("invalid Chart.yaml: {}", e),
        });
    }

    Err(ProvenanceError::Malformed {
        message: format!("no Chart.yaml found in {}", archive.display()),
    })
}

/// Produce the provenance message for a chart archive
///
/// `signer` becomes the signature's trusted comment and is reported back as
/// [`Verification::signed_by`].
pub fn clear_sign(archive: &Path, key: &SecretKey, signer: &str) -> Result<String> {
    if !is_tar(archive) {
        return Err(ProvenanceError::NotAnArchive {
            path: archive.to_path_buf(),
        });
    }

    let metadata = load_chart_metadata(archive)?;
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sums = SumCollection {
        files: BTreeMap::from([(file_name, digest_file(archive)?)]),
    };

    let signing = |e: serde_yaml::Error| ProvenanceError::Signing {
        message: e.to_string(),
    };
    let body = format!(
        "{}{}\n{}",
        serde_yaml::to_string(&metadata).map_err(signing)?,
        BODY_SEPARATOR,
        serde_yaml::to_string(&sums).map_err(signing)?
    );

    let signature = minisign::sign(None, key, Cursor::new(body.as_bytes()), Some(signer), None)
        .map_err(|e| ProvenanceError::Signing {
            message: e.to_string(),
        })?;

    Ok(format!(
        "{}\n{}{}\n{}\n{}\n",
        MESSAGE_HEADER,
        body,
        SIGNATURE_HEADER,
        signature.to_string().trim_end(),
        SIGNATURE_FOOTER
    ))
}
