use std::sync::Arc;
use std::time::Duration;

use crate::services::analysis::AnalysisError;
use crate::services::analysis::upload::{ImageUpload, UploadPolicy};
use crate::services::auth::Tier;
use crate::services::usage::{QuotaPolicy, UsageLedger};
use crate::services::vision::{VisionError, VisionModel, VisionRequest};

/// Result of a completed, charged analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub tier: Tier,
    pub used: u64,
    pub limit: Option<u64>,
    pub description: String,
}

/// Runs an admitted upload through the vision model and charges the caller.
///
/// Usage is committed only after the model has returned a non-empty
/// description. Validation failures, upstream errors, timeouts and empty
/// answers leave the ledger untouched, as does dropping the future mid-call.
pub struct AnalysisService {
    vision: Arc<dyn VisionModel>,
    ledger: Arc<dyn UsageLedger>,
    upload_policy: UploadPolicy,
    quota_policy: QuotaPolicy,
    prompt: String,
    timeout: Duration,
}

impl AnalysisService {
    pub fn new(
        vision: Arc<dyn VisionModel>,
        ledger: Arc<dyn UsageLedger>,
        upload_policy: UploadPolicy,
        quota_policy: QuotaPolicy,
        prompt: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            vision,
            ledger,
            upload_policy,
            quota_policy,
            prompt: prompt.into(),
            timeout,
        }
    }

    pub fn upload_policy(&self) -> &UploadPolicy {
        &self.upload_policy
    }

    pub async fn analyze(
        &self,
        identity: &str,
        tier: Tier,
        upload: ImageUpload,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let format = self.upload_policy.check_type(&upload.filename)?;
        self.upload_policy.check_size(upload.bytes.len())?;

        let request = VisionRequest {
            image: &upload.bytes,
            mime_type: format.mime_type(),
            prompt: &self.prompt,
        };

        let description = match tokio::time::timeout(self.timeout, self.vision.describe(request)).await
        {
            Ok(Ok(text)) => text.trim().to_string(),
            Ok(Err(err)) => return Err(self.upstream_failed(identity, err)),
            Err(_) => return Err(self.upstream_failed(identity, VisionError::Timeout(self.timeout))),
        };

        if description.is_empty() {
            return Err(self.upstream_failed(identity, VisionError::EmptyResponse));
        }

        let used = self.ledger.commit(identity).await;

        tracing::info!(
            user_id = %identity,
            tier = tier.as_str(),
            used,
            bytes = upload.bytes.len(),
            model = self.vision.model_name(),
            "analysis completed"
        );

        Ok(AnalysisOutcome {
            tier,
            used,
            limit: self.quota_policy.limit_for(tier),
            description,
        })
    }

    fn upstream_failed(&self, identity: &str, err: VisionError) -> AnalysisError {
        tracing::warn!(
            user_id = %identity,
            model = self.vision.model_name(),
            error = %err,
            "vision analysis failed"
        );
        AnalysisError::UpstreamAnalysisFailed(err)
    }
}
