use crate::context::SuiteContext;
use crate::suite::{Suite, TestCase, Verdict};
use crate::suites::unknown_case;
use async_trait::async_trait;
use logocert_cloudprint::{poll_until, AdvancedSetting};
use logocert_core::{CertError, Result, SuiteKind};

const SUBMITDOC_API: &str = "/privet/printer/submitdoc";

const CASES: &[TestCase] = &[
    TestCase::new("disable_local_discovery", "Printer stops advertising when local discovery is off"),
    TestCase::new("enable_local_discovery", "Printer advertises again when local discovery is on"),
    TestCase::new("disable_local_printing", "Local printing API disappears when local printing is off"),
    TestCase::new("enable_local_printing", "Local printing API returns when local printing is on"),
    TestCase::new("toggle_conversion_printing", "Conversion printing can be switched off and on"),
];

pub struct LocalSettingsSuite;

impl LocalSettingsSuite {
    /// Flip local discovery and wait for the advertisement to follow
    async fn local_discovery(&self, ctx: &SuiteContext, enabled: bool) -> Result<Verdict> {
        ctx.portal
            .set_advanced_option(ctx.printer(), AdvancedSetting::LocalDiscovery, enabled)
            .await?;

        let window = ctx.config.timeouts.discovery();
        let observed = poll_until(
            "printer advertised",
            ctx.state_poll(),
            || async move { ctx.discovery.find(ctx.printer(), window).await.map(|p| Some(p.is_some())) },
            |advertised: &bool| *advertised == enabled,
        )
        .await;

        verdict_for(observed, if enabled { "Advertised again" } else { "No longer advertised" })
    }

    /// Flip local printing and wait for `/privet/info` to follow
    async fn local_printing(&self, ctx: &SuiteContext, enabled: bool) -> Result<Verdict> {
        ctx.portal
            .set_advanced_option(ctx.printer(), AdvancedSetting::LocalPrinting, enabled)
            .await?;

        let observed = poll_until(
            "submitdoc listed",
            ctx.state_poll(),
            || async move { ctx.device.info().await.map(|info| Some(info.supports_api(SUBMITDOC_API))) },
            |listed: &bool| *listed == enabled,
        )
        .await;

        verdict_for(
            observed,
            if enabled {
                "submitdoc listed in /privet/info"
            } else {
                "submitdoc removed from /privet/info"
            },
        )
    }

    async fn conversion_printing(&self, ctx: &SuiteContext) -> Result<Verdict> {
        let printer = ctx.printer();
        ctx.portal
            .set_advanced_option(printer, AdvancedSetting::ConversionPrinting, false)
            .await?;
        ctx.portal
            .set_advanced_option(printer, AdvancedSetting::ConversionPrinting, true)
            .await?;
        Ok(Verdict::pass("Conversion printing toggled off and back on"))
    }
}

fn verdict_for(observed: Result<bool>, pass_notes: &str) -> Result<Verdict> {
    match observed {
        Ok(_) => Ok(Verdict::pass(pass_notes)),
        Err(CertError::Timeout(msg)) => Ok(Verdict::fail(msg)),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl Suite for LocalSettingsSuite {
    fn kind(&self) -> SuiteKind {
        SuiteKind::LocalSettings
    }

    fn cases(&self) -> &'static [TestCase] {
        CASES
    }

    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict> {
        let caps = &ctx.config.capabilities;
        match case {
            "disable_local_discovery" | "enable_local_discovery" if !caps.local_discovery => {
                Ok(Verdict::skip("Local discovery not supported"))
            }
            "disable_local_printing" | "enable_local_printing" if !caps.local_printing => {
                Ok(Verdict::skip("Local printing not supported"))
            }
            "toggle_conversion_printing" if !caps.conversion_printing => {
                Ok(Verdict::skip("Conversion printing not supported"))
            }
            "disable_local_discovery" => self.local_discovery(ctx, false).await,
            "enable_local_discovery" => self.local_discovery(ctx, true).await,
            "disable_local_printing" => self.local_printing(ctx, false).await,
            "enable_local_printing" => self.local_printing(ctx, true).await,
            "toggle_conversion_printing" => self.conversion_printing(ctx).await,
            other => Err(unknown_case(self.kind(), other)),
        }
    }
}
