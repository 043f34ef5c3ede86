use crate::context::SuiteContext;
use crate::suite::{Suite, TestCase, Verdict};
use crate::suites::unknown_case;
use async_trait::async_trait;
use logocert_core::{Result, SuiteKind};

const INVALID_TOKEN: &str = "invalid_x_privet_token";

const CASES: &[TestCase] = &[
    TestCase::new("info_requires_token_header", "/privet/info without X-Privet-Token is rejected"),
    TestCase::new("info_required_fields", "/privet/info returns every required field"),
    TestCase::new("invalid_token_rejected", "APIs reject a bogus X-Privet-Token"),
    TestCase::new("accesstoken_requires_auth", "/privet/accesstoken refuses unauthenticated users"),
    TestCase::new("local_api_listed", "/privet/info lists the local APIs the printer supports"),
];

pub struct PrivetSuite;

#[async_trait]
impl Suite for PrivetSuite {
    fn kind(&self) -> SuiteKind {
        SuiteKind::Privet
    }

    fn cases(&self) -> &'static [TestCase] {
        CASES
    }

    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict> {
        if !ctx.config.capabilities.local_discovery {
            return Ok(Verdict::skip("Privet local API not supported"));
        }

        match case {
            "info_requires_token_header" => {
                let raw = ctx.device.get_raw("/privet/info", None).await?;
                Ok(Verdict::check(
                    raw.error_code() == Some(INVALID_TOKEN),
                    format!("Rejected with {} ({})", INVALID_TOKEN, raw.status),
                    format!("Expected {}, got {}: {}", INVALID_TOKEN, raw.status, raw.body),
                ))
            }
            "info_required_fields" => {
                let info = ctx.device.info().await?;
                let missing = info.missing_required();
                Ok(Verdict::check(
                    missing.is_empty(),
                    format!("{} v{} ({})", info.name, info.version, info.device_state),
                    format!("Missing fields: {}", missing.join(", ")),
                )
                .or_block())
            }
            "invalid_token_rejected" => {
                let raw = ctx
                    .device
                    .get_raw("/privet/capabilities", Some("logocert-invalid-token"))
                    .await?;
                Ok(Verdict::check(
                    raw.error_code() == Some(INVALID_TOKEN),
                    format!("Rejected with {}", INVALID_TOKEN),
                    format!("Expected {}, got {}: {}", INVALID_TOKEN, raw.status, raw.body),
                ))
            }
            "accesstoken_requires_auth" => {
                let raw = ctx.device.access_token_raw(ctx.user()).await?;
                let refused = !raw.status.is_success() || raw.error_code().is_some();
                Ok(Verdict::check(
                    refused,
                    format!("Refused ({}, {})", raw.status, raw.error_code().unwrap_or("no error code")),
                    "Access token issued without user authentication",
                ))
            }
            "local_api_listed" => {
                let info = ctx.device.info().await?;
                let mut expected = vec!["/privet/accesstoken"];
                if ctx.config.capabilities.local_printing {
                    expected.extend(["/privet/capabilities", "/privet/printer/submitdoc"]);
                }
                let missing: Vec<&str> = expected.into_iter().filter(|api| !info.supports_api(api)).collect();
                Ok(Verdict::check(
                    missing.is_empty(),
                    format!("api: {}", info.api.join(", ")),
                    format!("Not listed: {}", missing.join(", ")),
                ))
            }
            other => Err(unknown_case(self.kind(), other)),
        }
    }
}
