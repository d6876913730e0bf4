// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::info;

/// 初始化指标系统
///
/// 启动Prometheus导出端点并登记各项指标的说明文本。
///
/// # 参数
///
/// * `port` - 导出端点监听的端口
pub fn init_metrics(port: u16) {
    let builder = PrometheusBuilder::new();
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

    // Start the exporter
    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = builder.with_http_listener(addr).install() {
        tracing::warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
    }

    // Register metrics
    describe_counter!(
        "crawl_attempts_total",
        "Total number of crawl attempts by result (changed, unchanged, failed, discarded)"
    );
    describe_histogram!(
        "crawl_duration_seconds",
        "Duration of crawl attempts in seconds"
    );
    describe_counter!(
        "catalog_changes_total",
        "Total number of attempts that stored a changed catalog snapshot"
    );
    describe_gauge!(
        "crawl_inflight",
        "Number of crawl attempts currently in flight"
    );
    describe_counter!(
        "crawl_dispatch_deferred_total",
        "Total number of due targets deferred because all crawl permits were taken"
    );
    describe_counter!(
        "catalog_orphans_pruned_total",
        "Total number of cached snapshots pruned after their target was removed"
    );

    // Store Guard Metrics
    describe_counter!(
        "catalog_store_puts_total",
        "Total number of successful snapshot writes recorded by the store guard"
    );
    describe_counter!(
        "catalog_store_put_failures_total",
        "Total number of failed snapshot writes recorded by the store guard"
    );
    describe_counter!(
        "catalog_store_rejected_total",
        "Total number of snapshot writes rejected by the open store guard"
    );
    describe_gauge!(
        "catalog_store_guard_status",
        "Current status of the store guard (0=Closed, 0.5=HalfOpen, 1=Open)"
    );

    info!("Metrics exporter listening on {}", addr);
}
