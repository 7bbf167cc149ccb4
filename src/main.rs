use std::net::ToSocketAddrs;
use std::sync::Arc;

use anyhow::{Context, bail};

use workorder::config::OrderConfig;
use workorder::error::ActionError;
use workorder::order::{OrderDocument, OrderRecord, OrderStatus};
use workorder::spool::Spool;
use workorder::store::{LibSqlBackend, OrderIndex};
use workorder::worker::JobHandle;

const USAGE: &str = "\
usage: workorder <command>

commands:
  new <service> [host...]          create an order
  show <id>                        print an order as JSON
  status <id> <status>             set an order's status
  add-host <id> <address>          append a host to an order
  list [--service S | --status S]  query the index
  remove <id>                      delete an order
  reindex                          rebuild the index from the spool
  run <id>                         resolve the order's hosts on a job";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config = OrderConfig::from_env()?;
    let index: Arc<dyn OrderIndex> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening index at {}", config.db_path.display()))?,
    );
    let spool = Spool::new(config.spool_dir.clone(), index);
    spool.ensure_dirs().await?;

    match (command.as_str(), rest) {
        ("new", [service, hosts @ ..]) => {
            let mut doc = OrderDocument::new(service.as_str());
            for host in hosts {
                doc.add_host(host.as_str());
            }
            spool.save(&doc).await?;
            println!("{}", doc.id());
        }
        ("show", [id]) => {
            let doc = spool.load(id).await?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        ("status", [id, status]) => {
            let mut doc = spool.load(id).await?;
            doc.set_status_str(status)?;
            spool.save(&doc).await?;
        }
        ("add-host", [id, address]) => {
            let mut doc = spool.load(id).await?;
            doc.add_host(address.as_str());
            spool.save(&doc).await?;
        }
        ("list", filter) => {
            let records = match filter {
                [] => {
                    let mut records = Vec::new();
                    for status in OrderStatus::ALL {
                        records.extend(spool.index().orders_by_status(status).await?);
                    }
                    records
                }
                [flag, service] if flag == "--service" => {
                    spool.index().orders_by_service(service).await?
                }
                [flag, status] if flag == "--status" => {
                    spool.index().orders_by_status(status.parse()?).await?
                }
                _ => bail!("{USAGE}"),
            };
            print_records(&records);
        }
        ("remove", [id]) => spool.remove(id).await?,
        ("reindex", []) => {
            let count = spool.reindex().await?;
            println!("{count} orders indexed");
        }
        ("run", [id]) => run_order(&spool, id).await?,
        _ => bail!("{USAGE}"),
    }

    Ok(())
}

fn print_records(records: &[OrderRecord]) {
    for record in records {
        let hosts: Vec<&str> = record.hosts.iter().map(|h| h.address.as_str()).collect();
        println!(
            "{}\t{}\t{}\t{}",
            record.id,
            record.service,
            record.status,
            hosts.join(",")
        );
    }
}

/// Carry an order through `queued → in-progress → completed | error`, with
/// a job resolving each of its hosts.
async fn run_order(spool: &Spool, id: &str) -> anyhow::Result<()> {
    let mut doc = spool.load(id).await?;
    if doc.status().is_terminal() {
        bail!(
            "order {} is already {}; set its status to rerun it",
            doc.id(),
            doc.status()
        );
    }
    doc.set_status(OrderStatus::Queued);
    spool.save(&doc).await?;

    let hosts: Vec<String> = doc.hosts().into_iter().map(str::to_string).collect();
    let job = JobHandle::new(doc.id(), move || -> Result<(), ActionError> {
        for host in &hosts {
            let resolved = (host.as_str(), 0)
                .to_socket_addrs()
                .map_err(|e| format!("cannot resolve {host}: {e}"))?;
            tracing::info!(host = %host, addresses = resolved.count(), "Host resolved");
        }
        Ok(())
    });

    doc.set_status(OrderStatus::InProgress);
    spool.save(&doc).await?;
    job.start()?;
    let outcome = tokio::task::spawn_blocking(move || job.join()).await?;

    doc.set_status(if outcome.is_ok() {
        OrderStatus::Completed
    } else {
        OrderStatus::Error
    });
    spool.save(&doc).await?;
    println!("{} {}", doc.id(), doc.status());
    outcome.map_err(Into::into)
}
