//! `status`: container state of every selected service

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::context::AppContext;
use crate::errors::AdmError;
use crate::session::SessionFactory;
use crate::topology::{select_nonempty, DeployConfig, FilterOption, ServiceIdentity};

/// One row of the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub id: String,
    pub name: String,
    pub role: String,
    pub host: String,
    pub container_id: Option<String>,

    /// Engine-reported container state, `None` when it could not be queried
    pub status: Option<String>,

    /// Why the row is incomplete
    pub error: Option<String>,
}

impl ServiceStatus {
    fn new(ctx: &AppContext, dc: &DeployConfig) -> Self {
        Self {
            id: ServiceIdentity::of(&ctx.cluster, dc).to_string(),
            name: dc.name().to_string(),
            role: dc.role().to_string(),
            host: dc.host().to_string(),
            container_id: None,
            status: None,
            error: None,
        }
    }
}

/// Status of every service matching `filter`, in topology order.
///
/// Hosts are queried concurrently, at most `settings.status_concurrency` at
/// a time. A failure for one service is recorded in its row.
pub async fn status(
    ctx: &AppContext,
    factory: &dyn SessionFactory,
    filter: &FilterOption,
) -> Result<Vec<ServiceStatus>, AdmError> {
    let services = select_nonempty(&ctx.cluster, &ctx.services, filter)?;
    let concurrency = ctx.settings.status_concurrency.max(1);
    debug!("Querying {} services, {} at a time", services.len(), concurrency);

    let rows = stream::iter(services)
        .map(|dc| service_status(ctx, factory, dc))
        .buffered(concurrency)
        .collect::<Vec<_>>()
        .await;
    Ok(rows)
}

async fn service_status(
    ctx: &AppContext,
    factory: &dyn SessionFactory,
    dc: &DeployConfig,
) -> ServiceStatus {
    let mut row = ServiceStatus::new(ctx, dc);

    let identity = ServiceIdentity::of(&ctx.cluster, dc);
    let container_id = match ctx.locator.locate(&identity).await {
        Ok(id) => id,
        Err(e) => {
            row.error = Some(e.to_string());
            return row;
        }
    };
    row.container_id = Some(container_id.clone());

    let inspected: Result<String, AdmError> = async {
        let host = ctx.hosts.resolve(dc.host())?;
        let executor = factory.executor(host)?;
        executor.inspect(&container_id).await
    }
    .await;

    match inspected {
        Ok(status) => row.status = Some(status),
        Err(e) => {
            warn!("Status of {} unavailable: {}", dc.name(), e);
            row.error = Some(e.to_string());
        }
    }
    row
}
