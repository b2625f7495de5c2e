// OCI CLI/SDK config file (~/.oci/config) loading

use crate::storage::signer::RequestSigner;
use crate::types::{PosterError, PosterResult};
use config::{Config as ConfigFile, File, FileFormat, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_PROFILE: &str = "DEFAULT";

/// The API-key credentials of one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciProfile {
    pub user: String,
    pub fingerprint: String,
    pub tenancy: String,
    pub region: Option<String>,
    pub key_file: PathBuf,
}

impl OciProfile {
    /// Read `profile` from the config file at `path`, or from
    /// `~/.oci/config` when no path is given.
    ///
    /// Values missing from a named profile are inherited from `DEFAULT`.
    pub fn load(path: Option<&Path>, profile: Option<&str>) -> PosterResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        let profile = profile.unwrap_or(DEFAULT_PROFILE);
        debug!(path = %path.display(), profile, "Loading OCI configuration");

        let path_str = path.to_str().ok_or_else(|| {
            PosterError::Storage(format!("OCI config path is not UTF-8: {}", path.display()))
        })?;

        let file = ConfigFile::builder()
            .add_source(File::new(path_str, FileFormat::Ini))
            .build()
            .map_err(|e| PosterError::Storage(format!("Failed to load OCI configuration: {}", e)))?;

        let mut values = section(&file, DEFAULT_PROFILE).unwrap_or_default();
        match section(&file, profile) {
            Some(overrides) => values.extend(overrides),
            None if profile == DEFAULT_PROFILE && !values.is_empty() => {}
            None => {
                return Err(PosterError::Storage(format!(
                    "Failed to load OCI configuration: profile {} not found in {}",
                    profile,
                    path.display()
                )))
            }
        }

        if values.contains_key("pass_phrase") {
            return Err(PosterError::Storage(
                "Invalid OCI configuration: passphrase-protected keys are not supported".to_string(),
            ));
        }

        let field = |name: &str| -> PosterResult<String> {
            values
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    PosterError::Storage(format!(
                        "Invalid OCI configuration: missing {} in profile {}",
                        name, profile
                    ))
                })
        };

        Ok(Self {
            user: field("user")?,
            fingerprint: field("fingerprint")?,
            tenancy: field("tenancy")?,
            region: values.get("region").filter(|v| !v.is_empty()).cloned(),
            key_file: expand_home(&field("key_file")?)?,
        })
    }

    /// `tenancy/user/fingerprint`, the key id OCI expects in signatures.
    pub fn key_id(&self) -> String {
        format!("{}/{}/{}", self.tenancy, self.user, self.fingerprint)
    }

    pub fn signer(&self) -> PosterResult<RequestSigner> {
        let pem = std::fs::read_to_string(&self.key_file).map_err(|e| {
            PosterError::Storage(format!(
                "Failed to read OCI key file {}: {}",
                self.key_file.display(),
                e
            ))
        })?;
        RequestSigner::from_pem(self.key_id(), &pem)
    }
}

fn section(file: &ConfigFile, name: &str) -> Option<Map<String, String>> {
    let table: Map<String, Value> = file
        .get_table(name)
        .or_else(|_| file.get_table(&name.to_lowercase()))
        .ok()?;
    Some(
        table
            .into_iter()
            .filter_map(|(k, v)| v.into_string().ok().map(|v| (k.to_lowercase(), v)))
            .collect(),
    )
}

fn default_config_path() -> PosterResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".oci").join("config"))
        .ok_or_else(|| {
            PosterError::Storage("Failed to load OCI configuration: no home directory".to_string())
        })
}

fn expand_home(raw: &str) -> PosterResult<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .ok_or_else(|| PosterError::Storage(format!("Cannot expand {}: no home directory", raw))),
        None => Ok(PathBuf::from(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const CONFIG: &str = "\
[DEFAULT]
user=ocid1.user.oc1..aaa
fingerprint=aa:bb:cc
tenancy=ocid1.tenancy.oc1..bbb
region=us-ashburn-1
key_file=/keys/default.pem

[POSTER]
region=eu-frankfurt-1
key_file=/keys/poster.pem
";

    #[test]
    fn test_default_profile() {
        let file = write_config(CONFIG);
        let profile = OciProfile::load(Some(file.path()), None).unwrap();
        assert_eq!(profile.user, "ocid1.user.oc1..aaa");
        assert_eq!(profile.region.as_deref(), Some("us-ashburn-1"));
        assert_eq!(profile.key_file, PathBuf::from("/keys/default.pem"));
        assert_eq!(
            profile.key_id(),
            "ocid1.tenancy.oc1..bbb/ocid1.user.oc1..aaa/aa:bb:cc"
        );
    }

    #[test]
    fn test_named_profile_inherits_default() {
        let file = write_config(CONFIG);
        let profile = OciProfile::load(Some(file.path()), Some("POSTER")).unwrap();
        assert_eq!(profile.fingerprint, "aa:bb:cc");
        assert_eq!(profile.region.as_deref(), Some("eu-frankfurt-1"));
        assert_eq!(profile.key_file, PathBuf::from("/keys/poster.pem"));
    }

    #[test]
    fn test_unknown_profile() {
        let file = write_config(CONFIG);
        let err = OciProfile::load(Some(file.path()), Some("MISSING")).unwrap_err();
        assert!(err.to_string().contains("MISSING"));
    }

    #[test]
    fn test_missing_field() {
        let file = write_config("[DEFAULT]\nuser=u\nfingerprint=f\nkey_file=/k.pem\n");
        let err = OciProfile::load(Some(file.path()), None).unwrap_err();
        assert!(err.to_string().contains("tenancy"));
    }

    #[test]
    fn test_passphrase_rejected() {
        let file = write_config(
            "[DEFAULT]\nuser=u\nfingerprint=f\ntenancy=t\nkey_file=/k.pem\npass_phrase=secret\n",
        );
        let err = OciProfile::load(Some(file.path()), None).unwrap_err();
        assert!(err.to_string().contains("passphrase"));
    }

    #[test]
    fn test_signer_from_key_file() {
        let key_path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/oci_test_key.pem");
        let file = write_config(&format!(
            "[DEFAULT]\nuser=u\nfingerprint=f\ntenancy=t\nkey_file={}\n",
            key_path
        ));
        let profile = OciProfile::load(Some(file.path()), None).unwrap();
        let signer = profile.signer().unwrap();
        assert_eq!(signer.key_id(), "t/u/f");
    }
}
