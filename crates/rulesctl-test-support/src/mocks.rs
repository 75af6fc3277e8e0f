//! In-memory stand-in for the entitlement server's rules subsystem.
//!
//! Implements the `EMPTY` / `CUSTOM(version)` record state machine, keeps a
//! call log, and can be told to misbehave so cleanup paths can be exercised.

use async_trait::async_trait;
use rulesctl_core::{
    EncodedRulesBlob, RulesApi, RulesBlob, RulesError, RulesResult, ServerStatus, Version,
};
use tokio::sync::Mutex;

use crate::fixtures::{DEFAULT_RULES_VERSION, default_rules};

/// Protocol call recorded by [`InMemoryRulesServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `GET status`.
    GetStatus,
    /// `GET rules`.
    ListRules,
    /// `POST rules` with the uploaded payload.
    UploadRules(EncodedRulesBlob),
    /// `DELETE rules`.
    DeleteRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingFault {
    Fail,
    Alter,
}

#[derive(Debug, Default)]
struct Faults {
    misreported_version: Option<String>,
    listing: Option<ListingFault>,
    sticky_version: bool,
    fail_uploads: bool,
}

#[derive(Debug, Default)]
struct ServerState {
    custom: Option<EncodedRulesBlob>,
    last_upload: Option<EncodedRulesBlob>,
    calls: Vec<ApiCall>,
    uploads: usize,
    faults: Faults,
}

impl ServerState {
    const fn armed(&self) -> bool {
        self.uploads > 0
    }
}

/// Rules server double holding at most one custom blob.
#[derive(Debug)]
pub struct InMemoryRulesServer {
    default_version: Version,
    empty_when_default: bool,
    state: Mutex<ServerState>,
}

impl Default for InMemoryRulesServer {
    fn default() -> Self {
        Self::new(DEFAULT_RULES_VERSION)
    }
}

impl InMemoryRulesServer {
    /// Server in the `EMPTY` state whose built-in rules carry `default_version`.
    #[must_use]
    pub fn new(default_version: Version) -> Self {
        Self {
            default_version,
            empty_when_default: false,
            state: Mutex::new(ServerState::default()),
        }
    }

    /// Seed a custom blob, as if uploaded before the session started.
    #[must_use]
    pub fn with_custom_rules(mut self, encoded: EncodedRulesBlob) -> Self {
        self.state.get_mut().custom = Some(encoded);
        self
    }

    /// Answer `GET rules` with an empty body while no custom blob is stored.
    #[must_use]
    pub fn serving_empty_default(mut self) -> Self {
        self.empty_when_default = true;
        self
    }

    /// Once any upload has been accepted, report `version` from `GET status`
    /// regardless of the stored blob.
    pub async fn misreport_version_after_upload(&self, version: impl Into<String>) {
        self.state.lock().await.faults.misreported_version = Some(version.into());
    }

    /// Once any upload has been accepted, fail `GET rules` with a 500.
    pub async fn fail_listing_after_upload(&self) {
        self.state.lock().await.faults.listing = Some(ListingFault::Fail);
    }

    /// Once any upload has been accepted, append a line to every blob served
    /// by `GET rules` while leaving the stored blob untouched.
    pub async fn alter_listing_after_upload(&self) {
        self.state.lock().await.faults.listing = Some(ListingFault::Alter);
    }

    /// Keep reporting the most recently uploaded version from `GET status`
    /// after the custom blob has been deleted.
    pub async fn keep_uploaded_version_after_delete(&self) {
        self.state.lock().await.faults.sticky_version = true;
    }

    /// Fail every `POST rules` with a 503.
    pub async fn fail_uploads(&self) {
        self.state.lock().await.faults.fail_uploads = true;
    }

    /// Clear all injected faults.
    pub async fn heal(&self) {
        self.state.lock().await.faults = Faults::default();
    }

    /// Currently stored custom blob, if any.
    pub async fn custom_rules(&self) -> Option<EncodedRulesBlob> {
        self.state.lock().await.custom.clone()
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().await.calls.clone()
    }

    fn effective_version(&self, custom: Option<&EncodedRulesBlob>) -> Version {
        custom
            .and_then(|encoded| encoded.decode().ok())
            .and_then(|blob| blob.extract_version())
            .unwrap_or(self.default_version)
    }
}

#[async_trait]
impl RulesApi for InMemoryRulesServer {
    async fn get_status(&self) -> RulesResult<ServerStatus> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::GetStatus);
        let misreported = state
            .faults
            .misreported_version
            .clone()
            .filter(|_| state.armed());
        let reported = if state.faults.sticky_version {
            state.custom.as_ref().or(state.last_upload.as_ref())
        } else {
            state.custom.as_ref()
        };
        let version =
            misreported.unwrap_or_else(|| self.effective_version(reported).to_string());
        let source = if state.custom.is_some() {
            "database"
        } else {
            "default"
        };
        let mut status = ServerStatus::with_rules_version(version);
        status.rules_source = Some(source.to_string());
        status.result = Some(true);
        Ok(status)
    }

    async fn list_rules(&self) -> RulesResult<EncodedRulesBlob> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::ListRules);
        if state.faults.listing == Some(ListingFault::Fail) && state.armed() {
            return Err(RulesError::server("list_rules", 500, "rules listing unavailable"));
        }
        match &state.custom {
            Some(custom) if state.faults.listing == Some(ListingFault::Alter) && state.armed() => {
                let mut blob = custom.decode()?.into_bytes();
                blob.extend_from_slice(b"\n// altered in storage");
                Ok(RulesBlob::new(blob).encode())
            }
            Some(custom) => Ok(custom.clone()),
            None if self.empty_when_default => Ok(EncodedRulesBlob::default()),
            None => Ok(default_rules(self.default_version).encode()),
        }
    }

    async fn upload_rules(&self, encoded: &EncodedRulesBlob) -> RulesResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::UploadRules(encoded.clone()));
        if state.faults.fail_uploads {
            return Err(RulesError::server("upload_rules", 503, "rules storage offline"));
        }
        encoded.decode()?;
        state.custom = Some(encoded.clone());
        state.last_upload = Some(encoded.clone());
        state.uploads += 1;
        Ok(())
    }

    async fn delete_rules(&self) -> RulesResult<()> {
        let mut state = self.state.lock().await;
        state.calls.push(ApiCall::DeleteRules);
        state.custom = None;
        Ok(())
    }
}
