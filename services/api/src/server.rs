use crate::cli::ServeArgs;
use crate::infra::{AppState, Stores};
use crate::routes::application_router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use leadflow::auth::AdminGuard;
use leadflow::config::{AppConfig, NotificationConfig};
use leadflow::error::AppError;
use leadflow::forms::{FormCatalog, FormRouterState};
use leadflow::leads::{LeadAdminService, LeadIntakeService, LeadRouterState};
use leadflow::notify::push::{PushRouterState, WebPushGateway};
use leadflow::notify::ChannelNotifier;
use leadflow::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

fn push_gateway(config: &NotificationConfig) -> Option<Arc<WebPushGateway>> {
    let push = config.push.as_ref()?;
    match WebPushGateway::new(push) {
        Ok(gateway) => Some(Arc::new(gateway)),
        Err(err) => {
            warn!(error = %err, "web push client unavailable, push channel disabled");
            None
        }
    }
}

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let guard = AdminGuard::from_config(&config.admin);
    if !guard.is_configured() {
        warn!("LEADFLOW_ADMIN_KEY is not set, admin endpoints will reject every request");
    }

    let stores = Stores::open(&config.storage);
    let gateway = push_gateway(&config.notifications);
    let notifier = Arc::new(ChannelNotifier::from_config(
        config.notifications.clone(),
        stores.subscriptions.clone(),
        gateway.clone(),
    ));
    info!(channels = ?notifier.enabled_channels(), "lead notifications configured");

    let app = application_router(
        LeadRouterState {
            intake: Arc::new(LeadIntakeService::new(stores.leads.clone(), notifier)),
            admin: Arc::new(LeadAdminService::new(stores.leads.clone())),
            guard: guard.clone(),
        },
        FormRouterState {
            catalog: Arc::new(FormCatalog::new(stores.forms.clone())),
            guard: guard.clone(),
        },
        PushRouterState {
            subscriptions: stores.subscriptions.clone(),
            gateway,
            guard,
        },
    )
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        leads_db = %config.storage.leads_db.display(),
        forms_db = %config.storage.forms_db.display(),
        "leadflow ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
