#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use fusionsolar_bridge::api;
use fusionsolar_bridge::poll::PollCycle;
use fusionsolar_bridge::settings;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, State};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

mod metrics;

/// Structure containing state for API handlers.
pub struct StateData {
    poller: Arc<PollCycle>,
    /// `None` when automatic polling is disabled
    interval: Option<Duration>,
}

/// Run a poll cycle every `period` until the process exits.
async fn schedule(poller: Arc<PollCycle>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        metrics::record_cycle(poller.tick().await.is_some());
    }
}

#[get("/metrics")]
async fn metrics_route() -> Result<String, api::Error> {
    metrics::read().await
}

#[post("/update")]
async fn update_route(state: &State<StateData>) -> Result<String, api::Error> {
    let result = state.poller.run().await;
    if !matches!(result, Err(api::Error::CycleInProgress)) {
        metrics::record_cycle(result.is_ok());
    }

    Ok(format!("{:#?}", result?))
}

#[get("/status")]
fn status_route(state: &State<StateData>) -> String {
    format!("{:?}", state.poller.state())
}

#[get("/dump-devices")]
async fn dump_devices_route(state: &State<StateData>) -> Result<String, api::Error> {
    let dump = state.poller.dump_devices().await?;

    Ok(format!("{:#?}", dump))
}

#[launch]
fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = settings::read_settings().expect("Configuration error");
    let sink = Arc::new(metrics::PrometheusSink::default());
    let poller = PollCycle::from_settings(&settings, sink).expect("Unable to create API client");
    let state = StateData {
        poller: Arc::new(poller),
        interval: settings.interval(),
    };

    rocket::build()
        .manage(state)
        .attach(AdHoc::on_liftoff("Poll timer", |rocket| {
            Box::pin(async move {
                if let Some(state) = rocket.state::<StateData>() {
                    match state.interval {
                        Some(period) => {
                            log::info!("polling every {} s", period.as_secs());
                            tokio::spawn(schedule(state.poller.clone(), period));
                        }
                        None => log::info!("update interval is 0, polling only on POST /update"),
                    }
                }
            })
        }))
        .mount(
            "/",
            routes![metrics_route, update_route, status_route, dump_devices_route],
        )
}
