use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub ride_transitions_total: IntCounterVec,
    pub assignment_races_lost_total: IntCounter,
    pub active_rides: IntGauge,
    pub notifications_total: IntCounterVec,
    pub delivery_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ride_transitions_total = IntCounterVec::new(
            Opts::new("ride_transitions_total", "Committed ride transitions by target status"),
            &["to_status"],
        )
        .expect("valid ride_transitions_total metric");

        let assignment_races_lost_total = IntCounter::new(
            "assignment_races_lost_total",
            "Assignment attempts that lost a race on the ride or driver",
        )
        .expect("valid assignment_races_lost_total metric");

        let active_rides = IntGauge::new("active_rides", "Rides currently in a non-terminal state")
            .expect("valid active_rides metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Delivery attempts by channel and outcome"),
            &["channel", "outcome"],
        )
        .expect("valid notifications_total metric");

        let delivery_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "delivery_latency_seconds",
                "Latency of channel delivery attempts in seconds",
            ),
            &["channel"],
        )
        .expect("valid delivery_latency_seconds metric");

        registry
            .register(Box::new(ride_transitions_total.clone()))
            .expect("register ride_transitions_total");
        registry
            .register(Box::new(assignment_races_lost_total.clone()))
            .expect("register assignment_races_lost_total");
        registry
            .register(Box::new(active_rides.clone()))
            .expect("register active_rides");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(delivery_latency_seconds.clone()))
            .expect("register delivery_latency_seconds");

        Self {
            registry,
            ride_transitions_total,
            assignment_races_lost_total,
            active_rides,
            notifications_total,
            delivery_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
