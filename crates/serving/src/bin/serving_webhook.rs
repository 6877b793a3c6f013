/*
 * 5D Labs Model Serving - InferenceService Admission Webhook
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Serving Webhook - admission endpoints for `InferenceService`
//!
//! - `/mutate` fills in runtime versions and resource defaults
//! - `/validate` rejects predictors that fail framework validation
//! - `/health` and `/ready` for probes
//!
//! TLS is terminated in front of the pod.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serving::webhook::{router, WebhookState};
use serving::{ConfigurationError, InferenceServicesConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "serving-webhook", version, about = "InferenceService admission webhook")]
struct Args {
    /// Path of the mounted `predictors` key of the configuration ConfigMap
    #[arg(
        long,
        env = "SERVING_CONFIG_PATH",
        default_value = "/etc/serving/config/predictors"
    )]
    config: String,

    /// Read the configuration from this ConfigMap through the API server instead of a file
    #[arg(long, env = "SERVING_CONFIGMAP")]
    configmap: Option<String>,

    /// Namespace of the configuration ConfigMap
    #[arg(long, env = "SERVING_NAMESPACE", default_value = "kfserving-system")]
    namespace: String,

    /// Address the admission server listens on
    #[arg(long, env = "SERVING_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    #[arg(long, env = "SERVING_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,serving=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn load_config(args: &Args) -> serving::Result<InferenceServicesConfig> {
    let config = match &args.configmap {
        Some(name) => {
            let client = kube::Client::try_default()
                .await
                .map_err(ConfigurationError::from)?;
            InferenceServicesConfig::from_configmap(&client, &args.namespace, Some(name)).await?
        }
        None => InferenceServicesConfig::from_mounted_file(&args.config)?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting serving webhook v{}", env!("CARGO_PKG_VERSION"));

    // An incomplete registry would surface on the first admission request; refuse to start instead
    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!("Predictor configuration is unusable: {e}");
            return Err(anyhow::Error::new(e).context("failed to load predictor configuration"));
        }
    };

    let state = Arc::new(WebhookState::new(config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!("Serving webhook listening on {}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server failed")?;

    info!("Serving webhook stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
