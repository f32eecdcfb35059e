use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use jira_bridge::spool::SpoolMailbox;
use jira_bridge::{
    resolve_config_path, AttachmentStager, BridgeConfig, BridgeError, IssueSubmitter, JiraClient,
    MailMonitor, ProcessedLedger,
};

fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    dotenvy::dotenv().ok();

    if let Err(err) = run() {
        error!("fatal: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), BridgeError> {
    let config_path = resolve_config_path()?;
    let config = BridgeConfig::load(&config_path)?;
    info!("loaded configuration from {}", config_path.display());

    let client = JiraClient::new(&config.jira)?;
    client.verify_connection(&config.jira.project)?;

    let spool_root = env::var("MONITOR_SPOOL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("spool"));
    let provider = SpoolMailbox::new(spool_root)?;

    let ledger = ProcessedLedger::load(&config.monitor.ledger_path);
    let submitter = IssueSubmitter::new(client, config.jira.clone());
    let stager = AttachmentStager::new(config.attachments.clone());
    let mut monitor = MailMonitor::new(provider, submitter, stager, ledger, &config.monitor);

    spawn_shutdown_listener(monitor.stop_handle());
    monitor.run_loop();
    Ok(())
}

/// Wait for Ctrl-C on a side thread and raise the monitor's stop flag.
/// The loop itself stays synchronous; the runtime here exists only for
/// the signal future.
fn spawn_shutdown_listener(stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("failed to start signal listener: {}", err);
                return;
            }
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            info!("shutdown requested");
            stop.store(true, Ordering::Relaxed);
        }
    });
}
