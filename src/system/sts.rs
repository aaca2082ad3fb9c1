//! # Role Assumption
//!
//! The [`RoleAssumer`] trait is the boundary between path traversal and the
//! security token service. [`AwsCliAssumer`] implements it by shelling out to
//! the `aws` CLI with an explicit credential environment and parsing the JSON
//! responses.

use crate::{
    models::Credentials,
    system::executor::{self, ExecutionError},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssumeError {
    #[error("STS call failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Unexpected STS response: {0}")]
    Response(#[from] serde_json::Error),
    #[error("Cannot derive an MFA device from identity '{0}'.")]
    NoMfaDevice(String),
    #[error("Assume role rejected for {role_arn}: {message}")]
    Rejected { role_arn: String, message: String },
}

/// A second-factor proof for a role that requires MFA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaProof {
    pub serial: String,
    pub code: String,
}

/// Parameters for one role assumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub account_id: String,
    pub role_name: String,
    pub session_name: String,
    pub lifetime: Duration,
    pub region: String,
    pub mfa: Option<MfaProof>,
    pub policy: Option<String>,
}

impl AssumeRoleRequest {
    pub fn role_arn(&self) -> String {
        format!("arn:aws:iam::{}:role/{}", self.account_id, self.role_name)
    }
}

/// The result of an identity check.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    #[serde(default)]
    pub user_id: String,
}

/// Exchanges credentials for role credentials and probes credential liveness.
pub trait RoleAssumer: Send + Sync + fmt::Debug {
    fn assume_role(
        &self,
        source: &Credentials,
        request: &AssumeRoleRequest,
    ) -> Result<Credentials, AssumeError>;

    /// Succeeds only if the credentials are currently accepted.
    fn check_identity(&self, credentials: &Credentials) -> Result<CallerIdentity, AssumeError>;
}

/// Derives the virtual MFA device ARN for an IAM user ARN
/// (`arn:aws:iam::123:user/path/name` → `arn:aws:iam::123:mfa/name`).
pub fn mfa_serial_from_arn(arn: &str) -> Result<String, AssumeError> {
    let no_device = || AssumeError::NoMfaDevice(arn.to_string());
    let (prefix, resource) = arn.split_once(":user/").ok_or_else(no_device)?;
    let name = resource.rsplit('/').next().filter(|n| !n.is_empty()).ok_or_else(no_device)?;
    Ok(format!("{}:mfa/{}", prefix, name))
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    credentials: StsCredentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: DateTime<Utc>,
}

/// A [`RoleAssumer`] backed by the `aws` command line tool.
#[derive(Debug, Clone)]
pub struct AwsCliAssumer {
    program: String,
}

impl AwsCliAssumer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn sts_env(credentials: &Credentials, region: Option<&str>) -> Vec<(String, String)> {
        let mut env = credentials.to_env_vars();
        if let Some(region) = region {
            env.retain(|(k, _)| k != "AWS_REGION" && k != "AWS_DEFAULT_REGION");
            env.push(("AWS_REGION".to_string(), region.to_string()));
            env.push(("AWS_DEFAULT_REGION".to_string(), region.to_string()));
        }
        env
    }

    fn build_assume_args(&self, request: &AssumeRoleRequest) -> Vec<String> {
        let mut argv = vec![
            self.program.clone(),
            "sts".to_string(),
            "assume-role".to_string(),
            "--output".to_string(),
            "json".to_string(),
            "--role-arn".to_string(),
            request.role_arn(),
            "--role-session-name".to_string(),
            request.session_name.clone(),
            "--duration-seconds".to_string(),
            request.lifetime.as_secs().to_string(),
        ];
        if let Some(mfa) = &request.mfa {
            argv.extend([
                "--serial-number".to_string(),
                mfa.serial.clone(),
                "--token-code".to_string(),
                mfa.code.clone(),
            ]);
        }
        if let Some(policy) = &request.policy {
            argv.extend(["--policy".to_string(), policy.clone()]);
        }
        argv
    }
}

impl Default for AwsCliAssumer {
    fn default() -> Self {
        Self::new("aws")
    }
}

impl RoleAssumer for AwsCliAssumer {
    fn assume_role(
        &self,
        source: &Credentials,
        request: &AssumeRoleRequest,
    ) -> Result<Credentials, AssumeError> {
        log::info!("Assuming {} as '{}'", request.role_arn(), request.session_name);
        let argv = self.build_assume_args(request);
        let env = Self::sts_env(source, Some(&request.region));
        let stdout = executor::run_checked(&argv, &env).map_err(|e| match e {
            ExecutionError::NonZeroExitStatus { stderr, .. } => AssumeError::Rejected {
                role_arn: request.role_arn(),
                message: stderr,
            },
            other => AssumeError::Execution(other),
        })?;

        let response: AssumeRoleResponse = serde_json::from_str(&stdout)?;
        Ok(Credentials {
            access_key_id: response.credentials.access_key_id,
            secret_access_key: response.credentials.secret_access_key,
            session_token: Some(response.credentials.session_token),
            region: Some(request.region.clone()),
            expiration: Some(response.credentials.expiration),
        })
    }

    fn check_identity(&self, credentials: &Credentials) -> Result<CallerIdentity, AssumeError> {
        let argv = vec![
            self.program.clone(),
            "sts".to_string(),
            "get-caller-identity".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        let env = Self::sts_env(credentials, None);
        let stdout = executor::run_checked(&argv, &env)?;
        Ok(serde_json::from_str(&stdout)?)
    }
}
