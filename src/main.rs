use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use sentinel_manager::cli::{Cli, Command};
use sentinel_manager::config::ManagerSettings;
use sentinel_manager::sentinel::config::SentinelConfig;
use sentinel_manager::sentinel::config_parser::parse_sentinel_config;
use sentinel_manager::sentinel::link::TcpConnector;
use sentinel_manager::sentinel::{AddPod, Manager};
use sentinel_manager::Result;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sentinel_manager::logging::init_logging(&settings.loglevel) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command, &settings).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(settings: &ManagerSettings) -> Result<SentinelConfig> {
    match &settings.sentinel_config_file {
        Some(path) => {
            let config = parse_sentinel_config(path)?;
            log::debug!(
                "loaded {} pods from {}",
                config.pods().count(),
                path.display()
            );
            Ok(config)
        }
        None => Ok(SentinelConfig::new()),
    }
}

/// Run one command. `Ok(false)` means it completed but found a problem.
async fn run(command: Command, settings: &ManagerSettings) -> Result<bool> {
    let config = load_config(settings)?;
    let connector = Arc::new(TcpConnector::new(
        settings.connect_timeout,
        settings.command_timeout,
    ));
    let manager = Manager::new(config, connector, settings);
    let target = settings.target();

    match command {
        Command::Addpod {
            name,
            address,
            port,
            password,
            quorum,
            reconfigure_script,
            notification_script,
        } => {
            let request = AddPod {
                name,
                host: address,
                port,
                password,
                quorum,
                reconfig_script: reconfigure_script,
                notification_script,
            };
            let report = manager.add_pod(&target, &request).await?;
            for (directive, e) in &report.directive_failures {
                println!("{}: not set ({})", directive, e);
            }
            println!("Pod '{}' added to {}", report.name, target);
            Ok(report.is_complete())
        }

        Command::Set { directive, value } => {
            let report = manager
                .set_directive_on_all_pods(&target, &directive, &value)
                .await?;
            for (pod, e) in report.failures() {
                println!("{}: {}", pod, e);
            }
            println!("{} updated", report.summary());
            Ok(true)
        }

        Command::Setpod {
            name,
            directive,
            value,
        } => {
            let walk = manager
                .set_directive_on_pod(&name, &directive, &value)
                .await?;
            for (addr, e) in walk.failures() {
                println!("{}: {}", addr, e);
            }
            println!(
                "{} set on {} of {} sentinels",
                directive,
                walk.successes(),
                walk.attempted()
            );
            Ok(true)
        }

        Command::Reset => {
            let report = manager.reset_all_pods().await;
            for (pod, e) in report.failures() {
                println!("{}: {}", pod, e);
            }
            println!("{} reset", report.summary());
            Ok(report.total() == 0 || report.succeeded() > 0)
        }

        Command::Resetpod { name } => {
            let walk = manager.reset_pod(&name).await?;
            println!("Pod '{}' reset on {} sentinels", name, walk.successes());
            Ok(true)
        }

        Command::Removepod { name, archive, .. } => {
            let report = manager.remove_pod(&target, &name, archive).await?;
            if let Some(path) = &report.archive {
                println!("Archived to {}", path.display());
            }
            if report.removed {
                println!("Pod '{}' removed from {}", name, target);
            } else {
                println!("Pod '{}' was not on {}", name, target);
            }
            Ok(true)
        }

        Command::Checkauth { name } => {
            let report = manager.check_auth(&name).await?;
            for node in &report.nodes {
                match &node.error {
                    None => println!("{:?} {}: ok", node.role, node.address),
                    Some(e) => println!("{:?} {}: {}", node.role, node.address, e),
                }
            }
            report.ensure()?;
            Ok(true)
        }

        Command::Validate { name } => {
            let agreement = manager.validate_sentinels(&name).await?;
            for (addr, e) in &agreement.failures {
                println!("{}: {}", addr, e);
            }
            let agreement = agreement.ensure()?;
            println!(
                "All {} sentinels agree on pod '{}'",
                agreement.total, agreement.pod
            );
            Ok(true)
        }

        Command::Pods => {
            let pods = manager.list_pods(&target).await?;
            if pods.is_empty() {
                println!("{} monitors no pods", target);
            }
            for info in pods {
                println!(
                    "{}\t{}\t{}\tquorum={}\treplicas={}\tsentinels={}",
                    info.name,
                    info.addr(),
                    info.state(),
                    info.quorum,
                    info.num_slaves,
                    info.num_other_sentinels + 1
                );
            }
            Ok(true)
        }
    }
}
