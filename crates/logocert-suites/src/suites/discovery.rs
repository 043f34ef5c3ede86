use crate::context::SuiteContext;
use crate::suite::{Suite, TestCase, Verdict};
use crate::suites::unknown_case;
use async_trait::async_trait;
use logocert_core::{Result, SuiteKind};
use logocert_privet::DiscoveredPrinter;

const CASES: &[TestCase] = &[
    TestCase::new("printer_advertised", "Printer advertises _privet._tcp over mDNS"),
    TestCase::new("txt_record_complete", "TXT record carries every required key"),
    TestCase::new("connection_state_valid", "TXT cs is a known connection state"),
];

pub struct DiscoverySuite;

async fn advertised(ctx: &SuiteContext) -> Result<Option<DiscoveredPrinter>> {
    ctx.discovery
        .find(ctx.printer(), ctx.config.timeouts.discovery())
        .await
}

#[async_trait]
impl Suite for DiscoverySuite {
    fn kind(&self) -> SuiteKind {
        SuiteKind::Discovery
    }

    fn cases(&self) -> &'static [TestCase] {
        CASES
    }

    async fn run_case(&self, case: &str, ctx: &SuiteContext) -> Result<Verdict> {
        if !ctx.config.capabilities.local_discovery {
            return Ok(Verdict::skip("Local discovery not supported"));
        }

        match case {
            "printer_advertised" => Ok(match advertised(ctx).await? {
                Some(printer) => Verdict::pass(format!(
                    "{} at {}:{}",
                    printer.name(),
                    printer.hostname,
                    printer.port
                )),
                None => Verdict::blocking(format!(
                    "'{}' not advertised within {}s",
                    ctx.printer(),
                    ctx.config.timeouts.discovery
                )),
            }),
            "txt_record_complete" => Ok(match advertised(ctx).await? {
                Some(printer) => {
                    let missing = printer.txt().missing_required();
                    Verdict::check(
                        missing.is_empty(),
                        "All required TXT keys present",
                        format!("Missing TXT keys: {}", missing.join(", ")),
                    )
                }
                None => Verdict::fail("Printer no longer advertised"),
            }),
            "connection_state_valid" => Ok(match advertised(ctx).await? {
                Some(printer) => {
                    let txt = printer.txt();
                    match txt.connection_state() {
                        Some(state) => Verdict::pass(format!("cs={}", state)),
                        None => Verdict::fail(format!(
                            "Invalid cs value: {}",
                            txt.cs.as_deref().unwrap_or("<absent>")
                        )),
                    }
                }
                None => Verdict::fail("Printer no longer advertised"),
            }),
            other => Err(unknown_case(self.kind(), other)),
        }
    }
}
