//! Shared application state.

use metrics_exporter_prometheus::PrometheusHandle;
use radar_common::MapBounds;

use crate::pipeline::RadarService;

pub struct AppState {
    pub service: RadarService,
    pub prometheus: PrometheusHandle,
    /// Base for `image_url`; derived from the request when unset.
    pub public_base_url: Option<String>,
    pub bounds: MapBounds,
}

impl AppState {
    pub fn new(
        service: RadarService,
        prometheus: PrometheusHandle,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            service,
            prometheus,
            public_base_url: public_base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            bounds: MapBounds::CONUS,
        }
    }
}
