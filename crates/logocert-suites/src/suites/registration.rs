use crate::context::SuiteContext;
use crate::suite::{Suite, TestCase, Verdict};
use crate::suites::unknown_case;
use async_trait::async_trait;
use logocert_cloudprint::poll_until;
use logocert_core::{CertError, Result, SuiteKind};
use logocert_privet::{RegisterAction, RegistrationResponse};
use tracing::{info, warn};

const PENDING: &str = "pending_user_action";

const CASES: &[TestCase] = &[
    TestCase::new("register_start", "Privet registration starts for the test account"),
    TestCase::new("claim_token", "Printer issues a claim token after the operator confirms"),
    TestCase::new("register_complete", "Registration completes once the claim is accepted"),
    TestCase::new("printer_listed", "Registered printer shows up on the management page"),
];

pub struct RegistrationSuite;

impl RegistrationSuite {
    async fn start(&self, ctx: &SuiteContext) -> Result<Verdict> {
        if ctx.user().is_empty() {
            return Ok(Verdict::blocking("account.email is not configured"));
        }
        let info = ctx.device.info().await?;
        if info.is_registered() {
            if let Some(blocked) = self.remove_existing(ctx, &info.id).await? {
                return Ok(blocked);
            }
        }

        let response = ctx.device.register(RegisterAction::Start, ctx.user()).await?;
        Ok(Verdict::check(
            response.action == RegisterAction::Start.as_str(),
            format!("Started for {}", ctx.user()),
            format!("Unexpected action in response: {}", response.action),
        )
        .or_block())
    }

    /// Delete a previous registration so the printer can be claimed again
    ///
    /// Returns a blocking verdict when the operator declines or the printer
    /// keeps reporting its old cloud id.
    async fn remove_existing(&self, ctx: &SuiteContext, device_id: &str) -> Result<Option<Verdict>> {
        let delete = ctx
            .prompter
            .confirm(&format!(
                "Printer is already registered as {}. Delete it from the management page and continue?",
                device_id
            ))
            .await?;
        if !delete {
            return Ok(Some(Verdict::blocking(format!(
                "Printer already registered as {}; delete it before running registration",
                device_id
            ))));
        }

        ctx.portal.delete_printer(ctx.printer()).await?;
        info!("Deleted existing registration {}", device_id);

        let released = poll_until(
            "printer registration released",
            ctx.claim_poll(),
            || async move { ctx.device.info().await.map(|info| Some(info.is_registered())) },
            |registered: &bool| !registered,
        )
        .await;

        match released {
            Ok(_) => Ok(None),
            Err(CertError::Timeout(msg)) => Ok(Some(Verdict::blocking(msg))),
            Err(e) => Err(e),
        }
    }

    async fn claim_token(&self, ctx: &SuiteContext) -> Result<Verdict> {
        ctx.prompter
            .pause("Accept the registration request on the printer's control panel")
            .await?;

        let claimed = poll_until(
            "claim token",
            ctx.claim_poll(),
            || async move {
                match ctx.device.register(RegisterAction::GetClaimToken, ctx.user()).await {
                    Ok(response) => Ok(Some(response)),
                    Err(e) if e.privet_code() == Some(PENDING) => Ok(None),
                    Err(e) => Err(e),
                }
            },
            |response: &RegistrationResponse| response.token.is_some(),
        )
        .await;

        match claimed {
            Ok(response) => {
                let notes = match &response.claim_url {
                    Some(url) => format!("Claim token issued, claim URL {}", url),
                    None => "Claim token issued".to_string(),
                };
                ctx.update_registration(|state| {
                    state.claim_token = response.token.clone();
                    state.claim_url = response.claim_url.clone();
                });
                Ok(Verdict::pass(notes))
            }
            Err(CertError::Timeout(msg)) => Ok(Verdict::blocking(msg)),
            Err(e) => Err(e),
        }
    }

    async fn complete(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let state = ctx.registration();
        let Some(claim_url) = state.claim_url.or(state.claim_token.map(|t| format!("claim token {}", t))) else {
            return Ok(Verdict::blocking("No claim token from the previous step"));
        };

        if let (Some(browser), true) = (&ctx.browser, claim_url.starts_with("http")) {
            if let Err(e) = browser.navigate(&claim_url).await {
                warn!("Could not open claim page: {}", e);
            }
        }
        ctx.prompter
            .pause(&format!(
                "Finish registration as {} using {}",
                ctx.user(),
                claim_url
            ))
            .await?;

        let response = ctx.device.register(RegisterAction::Complete, ctx.user()).await?;
        match response.device_id.as_deref() {
            Some(device_id) if !device_id.is_empty() => {
                info!("Registered as cloud device {}", device_id);
                ctx.update_registration(|state| state.device_id = Some(device_id.to_string()));
                Ok(Verdict::pass(format!("Device id {}", device_id)))
            }
            _ => Ok(Verdict::blocking(format!("No device id in response: {}", response))),
        }
    }

    async fn listed(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let printer = ctx.printer();
        let found = poll_until(
            "printer on management page",
            ctx.claim_poll(),
            || async move { ctx.portal.printer_name(printer).await.map(Some) },
            |name: &String| !name.is_empty(),
        )
        .await;

        match found {
            Ok(name) => Ok(Verdict::pass(format!("Listed as '{}'", name))),
            Err(CertError::Timeout(msg)) => Ok(Verdict::fail(msg)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Suite for RegistrationSuite {
    fn kind(&self) -> SuiteKind {
        SuiteKind::Registration
    }

    fn cases(&self) -> &'static [TestCase] {
        CASES
    }

    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict> {
        match case {
            "register_start" => self.start(ctx).await,
            "claim_token" => self.claim_token(ctx).await,
            "register_complete" => self.complete(ctx).await,
            "printer_listed" => self.listed(ctx).await,
            other => Err(unknown_case(self.kind(), other)),
        }
    }
}
