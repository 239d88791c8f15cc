//! IAM auditor.
//!
//! Canonical findings: `IAM_USER_NO_MFA` (HIGH, `ListMFADevices` returns
//! empty) and `OLD_ACCESS_KEY` (MEDIUM, `create_date` older than 90 days).

use super::ServiceAuditor;
use crate::cloud::{CloudClient, with_retry};
use crate::context::RunContext;
use crate::store::FindingStore;
use async_trait::async_trait;
use audit_proto::{Finding, ResourceKind, ServiceSummary, Severity};
use chrono::Duration as ChronoDuration;

pub struct IamAuditor;

#[async_trait]
impl ServiceAuditor for IamAuditor {
    fn name(&self) -> &'static str {
        "iam"
    }

    async fn audit(
        &self,
        ctx: &RunContext,
        client: &dyn CloudClient,
        store: &FindingStore,
    ) -> ServiceSummary {
        let users = match with_retry(ctx.retry_budget, || client.list_users()).await {
            Ok(v) => v,
            Err(e) => return ServiceSummary::with_error(e.to_string()),
        };

        let mut no_mfa = 0u64;
        let mut old_keys = 0u64;

        for user in &users {
            if ctx.cancel.is_cancelled() {
                break;
            }

            match with_retry(ctx.retry_budget, || client.list_mfa_devices(&user.name)).await {
                Ok(devices) if devices.is_empty() => {
                    no_mfa += 1;
                    store.add(Finding {
                        kind: ResourceKind::IamUser,
                        resource_id: user.name.clone(),
                        region: String::new(),
                        finding_code: "IAM_USER_NO_MFA".into(),
                        severity: Severity::High,
                        description: format!("user {} has no MFA device registered", user.name),
                        recommendation: "require MFA enrollment".into(),
                        estimated_monthly_savings: 0.0,
                        observed_at: ctx.now,
                    });
                }
                Ok(_) => {}
                Err(_) => {}
            }

            if let Ok(keys) = with_retry(ctx.retry_budget, || client.list_access_keys(&user.name)).await
            {
                for key in keys {
                    if ctx.now - key.create_date > ChronoDuration::days(90) {
                        old_keys += 1;
                        store.add(Finding {
                            kind: ResourceKind::IamAccessKey,
                            resource_id: key.id.clone(),
                            region: String::new(),
                            finding_code: "OLD_ACCESS_KEY".into(),
                            severity: Severity::Medium,
                            description: format!(
                                "access key {} for user {} is over 90 days old",
                                key.id, key.user_name
                            ),
                            recommendation: "rotate the access key".into(),
                            estimated_monthly_savings: 0.0,
                            observed_at: ctx.now,
                        });
                    }
                }
            }
        }

        ServiceSummary::new()
            .with_count("total", users.len() as u64)
            .with_count("no_mfa", no_mfa)
            .with_count("old_access_keys", old_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{FakeCloudClient, IamAccessKeyDesc, IamUserDesc};
    use chrono::Utc;

    #[tokio::test]
    async fn test_user_without_mfa_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.users.push(IamUserDesc { name: "alice".into() });
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        IamAuditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert!(findings.iter().any(|f| f.finding_code == "IAM_USER_NO_MFA"));
    }

    #[tokio::test]
    async fn test_user_with_mfa_not_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.users.push(IamUserDesc { name: "bob".into() });
        client
            .mfa_devices
            .insert("bob".into(), vec!["arn:aws:iam::1:mfa/bob".into()]);
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        IamAuditor.audit(&ctx, &client, &store).await;
        assert!(!store.all().iter().any(|f| f.finding_code == "IAM_USER_NO_MFA"));
    }

    #[tokio::test]
    async fn test_old_access_key_flagged() {
        let mut client = FakeCloudClient::new("1", "us-east-1");
        client.users.push(IamUserDesc { name: "carol".into() });
        client.mfa_devices.insert("carol".into(), vec!["x".into()]);
        client.access_keys.insert(
            "carol".into(),
            vec![IamAccessKeyDesc {
                id: "AKIA1".into(),
                user_name: "carol".into(),
                create_date: Utc::now() - ChronoDuration::days(100),
            }],
        );
        let ctx = RunContext::new(Utc::now());
        let store = FindingStore::new();
        IamAuditor.audit(&ctx, &client, &store).await;
        let findings = store.all();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].finding_code, "OLD_ACCESS_KEY");
    }
}
