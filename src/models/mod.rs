mod api;

pub use api::{
    HealthResponse, InfoResponse, LimitResponse, LimitsResponse, RouteInfo, SetLimitRequest,
    StreamParams,
};
