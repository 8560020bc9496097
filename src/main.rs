mod api;
mod dao;
mod model;
mod service;

use std::path::PathBuf;

use crate::api::endpoints::{report_export, report_get};
use crate::api::middleware::timing_middleware;
use crate::api::state::AppState;
use crate::dao::accidents::AccidentsDao;
use crate::dao::commune::{ConfiguredResolver, GeoApiResolver};
use crate::dao::store::AccidentStore;
use crate::model::config::{ApplicationArguments, Config, LoggingConfig, ResolverType, StoreType};
use crate::service::consolidator::Consolidator;
use crate::service::report::ReportService;

use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use clap::Parser;
use prometheus::IntCounter;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/**
 * Entry point: reads the configuration, wires the report service and serves the report endpoints.
 */
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = ApplicationArguments::parse();

    let config = get_config(&args.config_file)?;

    init_tracing(&config.logging)?;

    let report_service = get_report_service(&config)?;

    let prometheus = PrometheusMetricsBuilder::new("")
        .endpoint("/metrics")
        .mask_unmatched_patterns("UNKNOWN")
        .build()
        .map_err(|err| std::io::Error::other(format!("Failed to create Prometheus metrics: {err}")))?;

    let reports_generated = IntCounter::new("reports_generated", "Accident reports computed").map_err(|err| std::io::Error::other(format!("Failed to create reports_generated counter: {err}")))?;
    let report_failures = IntCounter::new("report_failures", "Accident report requests that failed").map_err(|err| std::io::Error::other(format!("Failed to create report_failures counter: {err}")))?;
    register_prometheus_metrics(&prometheus, &reports_generated)?;
    register_prometheus_metrics(&prometheus, &report_failures)?;

    let state = web::Data::new(AppState::new(report_service, reports_generated, report_failures));

    info!("Starting accident report server on {}:{}", config.server.bind_address, config.server.http_port);

    HttpServer::new(move || {
        App::new()
            .wrap(prometheus.clone())
            .wrap(from_fn(timing_middleware))
            .app_data(state.clone())
            .service(report_export)
            .service(report_get)
    })
    .bind((config.server.bind_address.as_str(), config.server.http_port))?
    .workers(config.server.workers)
    .run()
    .await
}

/**
 * Initializes console logging.
 *
 * #Arguments
 * `logging`: Which fields to print and the filter directives added to `RUST_LOG`.
 *
 * #Returns
 * A `Result` indicating success or failure.
 */
fn init_tracing(logging: &LoggingConfig) -> Result<(), std::io::Error> {
    let mut env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    for directive in &logging.directives {
        let directive: Directive = directive.parse().map_err(|err| std::io::Error::other(format!("Invalid logging directive {directive}: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(logging.target)
        .with_thread_ids(logging.thread_ids)
        .with_thread_names(logging.thread_names)
        .with_line_number(logging.line_number)
        .with_level(logging.level)
        .with_ansi(logging.ansi)
        .with_file(logging.file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| std::io::Error::other(format!("Failed to initialize logging: {err}")))
}

/**
 * Registers custom Prometheus metrics.
 *
 * #Arguments
 * `prometheus_metrics`: The Prometheus metrics instance to register the counter with.
 * `counter`: The counter to register.
 */
fn register_prometheus_metrics(prometheus_metrics: &PrometheusMetrics, counter: &IntCounter) -> Result<(), std::io::Error> {
    prometheus_metrics.registry.register(Box::new(counter.clone())).map_err(|err| std::io::Error::other(format!("Failed to register Prometheus counter: {err}")))?;
    Ok(())
}

/**
 * Reads the configuration from the specified file.
 *
 * #Arguments
 * `config_file`: The path to the configuration file.
 *
 * #Returns
 * A `Result` containing the parsed `Config` or an `std::io::Error` if reading or parsing fails.
*/
fn get_config(config_file: &str) -> Result<Config, std::io::Error> {
    let config_str: String = std::fs::read_to_string(config_file).map_err(|err| std::io::Error::other(format!("Failed to read config file: {err}")))?;
    let config: Config = toml::from_str(&config_str).map_err(|err| std::io::Error::other(format!("Failed to parse config file: {err}")))?;
    Ok(config)
}

/**
 * Builds the report service from the store and resolver configuration.
 */
fn get_report_service(config: &Config) -> Result<ReportService<ConfiguredResolver>, std::io::Error> {
    let store = match &config.store.store_type {
        StoreType::Sqlite { directory, file_prefix } => AccidentStore::new(PathBuf::from(directory), file_prefix.clone()),
    };
    let resolver = match &config.resolver.resolver_type {
        ResolverType::GeoApi { url, timeout_millis } => {
            ConfiguredResolver::GeoApi(GeoApiResolver::new(url.clone(), *timeout_millis).map_err(|err| std::io::Error::other(format!("Failed to create commune resolver: {err}")))?)
        }
        ResolverType::Disabled => ConfiguredResolver::Disabled,
    };
    Ok(ReportService::new(store, Consolidator::new(AccidentsDao::new()), resolver))
}
