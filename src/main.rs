//! Storage E2E Harness
//!
//! Runs the end-to-end suites against a storage platform deployed on
//! Kubernetes, and exposes the installer and the test client's status
//! queries as one-shot commands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, info_span, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storage_e2e_harness::suite::Suite;
use storage_e2e_harness::{
    BlockImageCreateSuite, ConnectionContext, Error, HarnessConfig, InstallHelper, PlatformType,
    Result, SmokeSuite, SuiteReport, SuiteRunner, TestClient,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Storage E2E Harness - end-to-end tests for block/file/object storage
#[derive(Parser, Debug)]
#[command(name = "storage-e2e", author, version, about, long_about = None)]
struct Args {
    /// Target platform (Kubernetes, StandAlone, BareMetal, None)
    #[arg(long, global = true, env = "E2E_PLATFORM", default_value = "Kubernetes")]
    platform: PlatformType,

    /// YAML configuration file
    #[arg(long, global = true, env = "E2E_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace the storage platform runs in
    #[arg(long, global = true, env = "E2E_NAMESPACE")]
    namespace: Option<String>,

    /// Management API base URL (discovered from the API service when unset)
    #[arg(long, global = true, env = "E2E_API_ENDPOINT")]
    api_endpoint: Option<String>,

    /// Directory holding install and test manifests
    #[arg(long, global = true, env = "E2E_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Kubernetes server version, e.g. v1.5
    #[arg(long, global = true, env = "E2E_K8S_VERSION")]
    k8s_version: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run test suites
    Run {
        #[arg(value_enum)]
        suite: SuiteName,

        /// Use an already installed platform
        #[arg(long, env = "E2E_SKIP_INSTALL")]
        skip_install: bool,

        /// Only run cases whose name contains this substring
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print the cluster status reported by the management API
    Status,
    /// Print the version reported by the tools pod
    Version,
    /// List storage nodes
    Nodes,
    /// Install the storage platform and wait for its API
    Install,
    /// Remove the storage platform
    Uninstall,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SuiteName {
    BlockCreate,
    Smoke,
    All,
}

impl Args {
    /// File configuration overridden by flags and environment
    fn harness_config(&self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_yaml_file(path)?,
            None => HarnessConfig::default(),
        };
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(endpoint) = &self.api_endpoint {
            config.api_endpoint = Some(endpoint.clone());
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(version) = &self.k8s_version {
            config.k8s_version = version.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting Storage E2E Harness");
    info!("  Version: {}", storage_e2e_harness::VERSION);
    info!("  Platform: {}", args.platform);

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute the command; `Ok(false)` means it ran but something failed
async fn run(args: Args) -> Result<bool> {
    let config = args.harness_config()?;
    let ctx = connect(args.platform, config).await?;

    match args.command {
        Command::Run {
            suite,
            skip_install,
            filter,
        } => run_suites(args.platform, &ctx, suite, skip_install, filter).await,
        Command::Status => {
            let client = client(args.platform, &ctx).await?;
            print_json(&client.status().await?)?;
            Ok(true)
        }
        Command::Version => {
            let client = client(args.platform, &ctx).await?;
            println!("{}", client.version().await?);
            Ok(true)
        }
        Command::Nodes => {
            let client = client(args.platform, &ctx).await?;
            print_json(&client.nodes().await?)?;
            Ok(true)
        }
        Command::Install => {
            let installer = InstallHelper::new(ctx.require_cluster("install")?, ctx.config.clone());
            let status = installer.install().await?;
            info!("Installed, overall status {}", status.overall);
            Ok(true)
        }
        Command::Uninstall => {
            let installer =
                InstallHelper::new(ctx.require_cluster("uninstall")?, ctx.config.clone());
            let report = installer.uninstall().await;
            info!(
                "Removed {} manifest(s), {} failure(s)",
                report.removed.len(),
                report.failed.len()
            );
            Ok(report.is_clean())
        }
    }
}

/// Kubernetes needs a live cluster; the other platforms run offline
async fn connect(platform: PlatformType, config: HarnessConfig) -> Result<ConnectionContext> {
    match platform {
        PlatformType::Kubernetes => ConnectionContext::kubernetes(config).await,
        _ => Ok(ConnectionContext::offline(config)),
    }
}

async fn client(platform: PlatformType, ctx: &ConnectionContext) -> Result<TestClient> {
    TestClient::create(platform, ctx, info_span!("client", platform = %platform)).await
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Suites
// =============================================================================

async fn run_suites(
    platform: PlatformType,
    ctx: &ConnectionContext,
    which: SuiteName,
    skip_install: bool,
    filter: Option<String>,
) -> Result<bool> {
    let runner = SuiteRunner::new().with_filter(filter);
    let mut reports = Vec::new();

    if matches!(which, SuiteName::BlockCreate | SuiteName::All) {
        if platform != PlatformType::Kubernetes {
            return Err(Error::UnsupportedPlatform(format!(
                "block-create suite runs on Kubernetes only, not {}",
                platform
            )));
        }
        let span = info_span!("suite", name = "block-create");
        let suite = BlockImageCreateSuite::setup(ctx, skip_install, span).await?;
        reports.push(run_suite(&runner, &suite).await);
    }

    if matches!(which, SuiteName::Smoke | SuiteName::All) {
        let span = info_span!("suite", name = "smoke");
        let suite = SmokeSuite::setup(platform, ctx, skip_install, span).await?;
        reports.push(run_suite(&runner, &suite).await);
    }

    for report in &reports {
        info!("{}", report.summary());
    }
    Ok(reports.iter().all(SuiteReport::all_passed))
}

async fn run_suite(runner: &SuiteRunner, suite: &dyn Suite) -> SuiteReport {
    let report = runner.run(suite).await;
    for case in &report.cases {
        if !case.cleanup.is_clean() {
            warn!(
                "Case {} left {} resource(s) behind",
                case.name,
                case.cleanup.failed.len()
            );
        }
    }
    if !report.teardown.is_clean() {
        warn!("Suite {} teardown was incomplete", report.suite);
    }
    report
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "rustls=warn", "reqwest=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
