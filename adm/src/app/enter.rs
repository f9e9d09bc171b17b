//! `enter`: interactive shell in the container of one service

use tracing::info;

use crate::app::context::AppContext;
use crate::errors::AdmError;
use crate::hosts::HostConfig;
use crate::session::{SessionExit, SessionFactory};
use crate::topology::{check_id, select_one, DeployConfig, FilterOption, ServiceIdentity};

/// Resolved target of an `enter`
#[derive(Debug)]
pub struct EnterTarget<'a> {
    pub service: &'a DeployConfig,
    pub identity: ServiceIdentity,
    pub container_id: String,
    pub host: &'a HostConfig,
    /// Directory the shell starts in
    pub workdir: &'a str,
}

/// Resolve `id` down to a container and the host that runs it.
///
/// Each stage needs the previous one's output; the first failure ends the
/// pipeline.
pub async fn resolve<'a>(ctx: &'a AppContext, id: &str) -> Result<EnterTarget<'a>, AdmError> {
    check_id(id)?;

    let service = select_one(&ctx.cluster, &ctx.services, &FilterOption::by_id(id))?;
    let identity = ServiceIdentity::of(&ctx.cluster, service);
    let container_id = ctx.locator.locate(&identity).await?;
    let host = ctx.hosts.resolve(service.host())?;

    Ok(EnterTarget {
        service,
        identity,
        container_id,
        host,
        workdir: &service.project_layout().service_root_dir,
    })
}

/// Open an interactive session in the container of service `id`
pub async fn enter(
    ctx: &AppContext,
    factory: &dyn SessionFactory,
    id: &str,
) -> Result<SessionExit, AdmError> {
    let target = resolve(ctx, id).await?;
    info!(
        "Entering {} ({}) in container {} on {}",
        target.service.name(),
        target.identity,
        target.container_id,
        target.host.alias
    );

    let mut session = factory.session(target.host)?;
    let exit = session.attach(&target.container_id, target.workdir).await?;

    info!("Left {}: {:?}", target.service.name(), exit.reason);
    Ok(exit)
}
