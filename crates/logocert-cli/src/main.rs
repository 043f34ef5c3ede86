//! logocert - network printer certification harness
//!
//! Usage:
//!   logocert init                  Write a default logocert.toml
//!   logocert run                   Run the configured suites
//!   logocert suites                List suites and their cases
//!   logocert discover              Browse for Privet printers
//!   logocert privet-info           Show the device's /privet/info
//!   logocert printer-state         Show the printer as the management page sees it
//!   logocert job-status <job>      Show a job's status
//!   logocert update-printer <id> <value>  Submit the simulate page UPDATE form
//!   logocert auth url|exchange     Obtain OAuth2 tokens for the results sheet

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use logocert_browser::BrowserSession;
use logocert_cloudprint::{CloudPrintManager, CloudPrintPortal, UnavailablePortal, UpdateOption};
use logocert_core::config::DEFAULT_CONFIG_FILE;
use logocert_core::{CertConfig, SuiteKind};
use logocert_gdocs::{exchange_code, OAuthCredentials, SheetsClient, TokenManager};
use logocert_privet::{MdnsDiscovery, PrinterDiscovery, PrivetClient, PrivetDevice};
use logocert_suites::{
    default_suites, CertRunner, ResultRecorder, SheetRecorder, StdinPrompter, Suite, SuiteContext,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "logocert")]
#[command(author, version, about = "Network printer certification harness")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run certification suites against the configured printer
    Run {
        /// Suites to run, in order (defaults to suites.enabled from the config)
        #[arg(short, long = "suite", value_name = "SUITE")]
        suites: Vec<SuiteKind>,

        /// Record to the markdown log only, even if sheets are enabled
        #[arg(long)]
        no_sheets: bool,
    },

    /// List suites and their cases
    Suites,

    /// Browse the local network for Privet printers
    Discover {
        /// Seconds to listen (defaults to timeouts.discovery)
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Fetch /privet/info from the printer
    PrivetInfo,

    /// Show the printer's state on the management page
    PrinterState,

    /// Show the status of a print job on the management page
    JobStatus {
        /// Job title, or a unique part of it
        job: String,
    },

    /// Change a registered printer through the simulate page UPDATE form
    UpdatePrinter {
        /// Cloud device id of the printer
        printer_id: String,

        /// Field to update
        #[arg(long, default_value = "local_settings")]
        option: UpdateOption,

        /// Value to submit, usually a JSON object
        value: String,
    },

    /// OAuth2 setup for the results spreadsheet
    Auth {
        #[command(subcommand)]
        action: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Print the consent URL
    Url {
        /// Also open it in the default browser
        #[arg(long)]
        open: bool,
    },

    /// Trade the code from the consent redirect for tokens
    Exchange {
        /// Authorization code
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        return cmd_init(&cli.config, force).map(|_| ExitCode::SUCCESS);
    }

    let config = CertConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let _log_guard = logging::init(&config.output.log_dir, cli.verbose)?;

    match cli.command {
        Commands::Init { .. } => Ok(ExitCode::SUCCESS),
        Commands::Run { suites, no_sheets } => cmd_run(config, suites, no_sheets).await,
        Commands::Suites => cmd_suites().map(|_| ExitCode::SUCCESS),
        Commands::Discover { timeout } => cmd_discover(&config, timeout).await.map(|_| ExitCode::SUCCESS),
        Commands::PrivetInfo => cmd_privet_info(&config).await.map(|_| ExitCode::SUCCESS),
        Commands::PrinterState => cmd_printer_state(&config).await.map(|_| ExitCode::SUCCESS),
        Commands::JobStatus { job } => cmd_job_status(&config, &job).await.map(|_| ExitCode::SUCCESS),
        Commands::UpdatePrinter {
            printer_id,
            option,
            value,
        } => cmd_update_printer(&config, &printer_id, option, &value)
            .await
            .map(|_| ExitCode::SUCCESS),
        Commands::Auth { action } => cmd_auth(&config, action).await.map(|_| ExitCode::SUCCESS),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    CertConfig::write_default(path).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    println!("Set device.name, account.email and the capabilities before running.");
    Ok(())
}

async fn cmd_run(config: CertConfig, suites: Vec<SuiteKind>, no_sheets: bool) -> Result<ExitCode> {
    config.validate()?;
    let selected = if suites.is_empty() {
        config.suites.enabled.clone()
    } else {
        suites
    };

    let browser = if needs_browser(&selected) {
        Some(Arc::new(
            BrowserSession::from_settings(&config.browser)
                .await
                .context("Failed to start the browser")?,
        ))
    } else {
        info!("No selected suite uses the management page, not starting the browser");
        None
    };
    let portal: Arc<dyn CloudPrintPortal> = match &browser {
        Some(browser) => Arc::new(CloudPrintManager::new(browser.clone(), config.gcp.clone())),
        None => Arc::new(UnavailablePortal::new("browser not started for the selected suites")),
    };
    let discovery = Arc::new(MdnsDiscovery::new()?);
    let device = Arc::new(privet_client(&config, discovery.as_ref()).await?);
    info!("Privet API at {}", device.base_url());

    let mut recorder = ResultRecorder::new(config.results_path());
    if config.sheets.enabled && !no_sheets {
        recorder = recorder.with_sheet(sheet_recorder(&config));
    }
    let results_path = recorder.results_path().to_path_buf();

    let mut ctx = SuiteContext::new(config, portal, device, discovery.clone(), Arc::new(StdinPrompter));
    if let Some(browser) = browser {
        ctx = ctx.with_browser(browser);
    }
    let runner = CertRunner::new(ctx, recorder);
    let summary = runner.run(&selected).await;
    discovery.shutdown();

    println!();
    println!("Certification Summary");
    println!("=====================");
    println!("Passed:  {}", summary.passed);
    println!("Failed:  {}", summary.failed);
    println!("Skipped: {}", summary.skipped);
    println!("Blocked: {}", summary.blocked);
    println!("\nResults written to {}", results_path.display());

    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn needs_browser(suites: &[SuiteKind]) -> bool {
    suites.iter().any(SuiteKind::uses_portal)
}

fn sheet_recorder(config: &CertConfig) -> SheetRecorder {
    let tokens = Arc::new(TokenManager::new(OAuthCredentials::from_config(config)));
    SheetRecorder::new(SheetsClient::new(tokens), config.sheets.spreadsheet_name.clone())
}

/// Client for the configured address, or for wherever the printer advertises itself
async fn privet_client(config: &CertConfig, discovery: &dyn PrinterDiscovery) -> Result<PrivetClient> {
    if let Some(address) = &config.device.address {
        return Ok(PrivetClient::for_host(address, config.device.port)?);
    }

    info!("No device.address configured, looking for '{}' over mDNS", config.device.name);
    let printer = discovery
        .find(&config.device.name, config.timeouts.discovery())
        .await?
        .with_context(|| {
            format!(
                "'{}' did not advertise a Privet service; set device.address to test it anyway",
                config.device.name
            )
        })?;
    let base_url = printer
        .base_url()
        .with_context(|| format!("'{}' advertised no address", printer.name()))?;
    Ok(PrivetClient::new(base_url)?)
}

fn cmd_suites() -> Result<()> {
    println!("Suites");
    println!("======");
    for suite in default_suites() {
        let kind = suite.kind();
        println!("\n{} ({})", kind.display_name(), kind);
        for case in suite.cases() {
            println!("  {:<34} {}", case.name, case.description);
        }
    }
    Ok(())
}

async fn cmd_discover(config: &CertConfig, timeout: Option<u64>) -> Result<()> {
    let window = timeout.map(Duration::from_secs).unwrap_or_else(|| config.timeouts.discovery());
    let discovery = MdnsDiscovery::new()?;
    let printers = discovery.browse(window).await;
    discovery.shutdown();
    let printers = printers?;

    println!("Privet printers ({} found in {:?})", printers.len(), window);
    println!("==============");
    for printer in &printers {
        let txt = printer.txt();
        println!("\n{}", printer.name());
        println!("  host:  {}:{}", printer.hostname, printer.port);
        if let Some(url) = printer.base_url() {
            println!("  api:   {}", url);
        }
        println!("  state: {}", txt.cs.as_deref().unwrap_or("(missing)"));
        for (key, value) in &printer.txt {
            println!("  txt {}={}", key, value);
        }
        let missing = txt.missing_required();
        if !missing.is_empty() {
            warn!("{} is missing TXT keys: {}", printer.name(), missing.join(", "));
        }
    }
    Ok(())
}

async fn cmd_privet_info(config: &CertConfig) -> Result<()> {
    let discovery = MdnsDiscovery::new()?;
    let client = privet_client(config, &discovery).await;
    discovery.shutdown();
    let client = client?;

    let info = client.info().await?;
    println!("Privet info from {}", client.base_url());
    println!("==============");
    println!("name:             {}", info.name);
    println!("id:               {}", if info.id.is_empty() { "(unregistered)" } else { info.id.as_str() });
    println!("type:             {}", info.device_type.join(", "));
    println!("device_state:     {}", info.device_state);
    println!("connection_state: {}", info.connection_state);
    println!("manufacturer:     {}", info.manufacturer);
    println!("model:            {}", info.model);
    println!("firmware:         {}", info.firmware);
    println!("api:              {}", info.api.join(", "));

    let missing = info.missing_required();
    if !missing.is_empty() {
        println!("\nMissing required fields: {}", missing.join(", "));
    }
    Ok(())
}

async fn open_portal(config: &CertConfig) -> Result<CloudPrintManager> {
    let browser = BrowserSession::from_settings(&config.browser)
        .await
        .context("Failed to start the browser")?;
    Ok(CloudPrintManager::new(Arc::new(browser), config.gcp.clone()))
}

async fn cmd_printer_state(config: &CertConfig) -> Result<()> {
    let portal = open_portal(config).await?;
    let printer = config.device.name.as_str();

    let name = CloudPrintPortal::printer_name(&portal, printer).await?;
    let state = CloudPrintPortal::printer_state(&portal, printer).await?;
    let error_state = CloudPrintPortal::printer_error_state(&portal, printer).await?;
    let messages = CloudPrintPortal::printer_state_messages(&portal, printer).await?;

    println!("{}", name);
    println!("{}", "=".repeat(name.len()));
    println!("State: {}{}", state, if error_state { " (error)" } else { "" });
    for message in &messages {
        println!("  - {}", message);
    }

    let details = CloudPrintPortal::printer_details(&portal, printer).await?;
    if !details.is_empty() {
        println!("\nDetails:");
        for (key, value) in &details {
            println!("  {}: {}", key, value);
        }
    }
    Ok(())
}

async fn cmd_job_status(config: &CertConfig, job: &str) -> Result<()> {
    let portal = open_portal(config).await?;

    match CloudPrintPortal::job_status(&portal, job).await? {
        Some(status) => {
            println!("{}: {}", job, status);
            if let Some(message) = CloudPrintPortal::job_state_message(&portal, job).await? {
                println!("  {}", message);
            }
            println!("  pages printed: {}", CloudPrintPortal::pages_printed(&portal, job).await?);
        }
        None => println!("No job matching '{}'", job),
    }
    Ok(())
}

async fn cmd_update_printer(
    config: &CertConfig,
    printer_id: &str,
    option: UpdateOption,
    value: &str,
) -> Result<()> {
    let portal = open_portal(config).await?;
    portal
        .update_printer_with_update_api(printer_id, option, value)
        .await
        .with_context(|| format!("Failed to update {} for {}", option, printer_id))?;
    println!("Submitted {} update for {}", option, printer_id);
    Ok(())
}

async fn cmd_auth(config: &CertConfig, action: AuthCommands) -> Result<()> {
    let creds = OAuthCredentials::from_config(config);
    if creds.client_id.is_empty() {
        bail!("account.client_id is not set in the configuration");
    }

    match action {
        AuthCommands::Url { open } => {
            let url = creds.authorization_url()?;
            println!("Visit this URL as {} and approve access:", config.account.email);
            println!("\n  {}\n", url);
            println!("Then run `logocert auth exchange <code>` with the code from the redirect.");
            if open {
                if let Err(e) = open::that(&url) {
                    warn!("Failed to open browser: {}", e);
                }
            }
        }
        AuthCommands::Exchange { code } => {
            let http = reqwest::Client::new();
            let tokens = exchange_code(&http, &creds, code.trim()).await?;
            println!("Add these to the [auth] section of your configuration:");
            println!("\naccess_token = \"{}\"", tokens.access_token);
            match tokens.refresh_token {
                Some(refresh) => println!("refresh_token = \"{}\"", refresh),
                None => warn!("No refresh token returned; revoke access and consent again"),
            }
        }
    }
    Ok(())
}
