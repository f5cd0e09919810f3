//! Example of three partition clients sharing one coordination service.
//!
//! Run with:
//!   RUST_LOG=partition_client=info cargo run --example partition-cluster

use partition_client::{MemoryCoordinator, PartitionClient, PartitionConfig, PartitionId};
use std::env;
use std::time::Duration;

const APP: &str = "demo";
const MAX_PARTITION: PartitionId = 32;

fn members(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

async fn start_client(
    coordinator: &MemoryCoordinator,
    name: &str,
    cluster: &[&str],
) -> Result<PartitionClient, Box<dyn std::error::Error>> {
    let config = PartitionConfig::new(APP, name, members(cluster), MAX_PARTITION, "memory:2181")
        .with_retry_interval(Duration::from_millis(50));

    let label = name.to_string();
    let client = PartitionClient::new(config, coordinator, move |owned: &[PartitionId]| {
        println!("[{}] owns {} partitions: {:?}", label, owned.len(), owned);
    })
    .await?;
    Ok(client)
}

fn print_status(clients: &[&PartitionClient]) {
    for client in clients {
        let snapshot = client.metrics().snapshot();
        println!(
            "  {}: owned {:2} / target {:2}, pending {:2}",
            client.self_name(),
            snapshot.owned_partitions,
            snapshot.target_partitions,
            snapshot.pending_acquisitions,
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "partition_client=info".to_string()))
        .init();

    let coordinator = MemoryCoordinator::new();
    let all = ["s1", "s2", "s3"];

    println!("Starting s1, s2 and s3");
    let s1 = start_client(&coordinator, "s1", &all).await?;
    let s2 = start_client(&coordinator, "s2", &all).await?;
    let s3 = start_client(&coordinator, "s3", &all).await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    print_status(&[&s1, &s2, &s3]);

    println!("s3 leaves the cluster");
    s3.close().await;
    s1.update_cluster_list(members(&["s1", "s2"])).await?;
    s2.update_cluster_list(members(&["s1", "s2"])).await?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    print_status(&[&s1, &s2]);

    println!("s3 rejoins");
    let s3 = start_client(&coordinator, "s3", &all).await?;
    s1.update_cluster_list(members(&all)).await?;
    s2.update_cluster_list(members(&all)).await?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    print_status(&[&s1, &s2, &s3]);

    for part in [0, 7, 21] {
        let owner = [&s1, &s2, &s3]
            .iter()
            .find(|c| c.own_partition(part))
            .map(|c| c.self_name().to_string())
            .unwrap_or_else(|| "nobody".to_string());
        println!("partition {} is owned by {}", part, owner);
    }

    println!("\nMetrics for s1:\n{}", s1.metrics().to_prometheus());

    s1.close().await;
    s2.close().await;
    s3.close().await;
    Ok(())
}
