use shared::{ChargingStation, RouteOption};

/// Routes estimated to use more battery than this get a stop suggestion.
pub const IMPACT_THRESHOLD_PCT: u32 = 40;

/// Pick a charging stop for `route` among the stations found in its corridor.
///
/// Takes the station in the middle of the discovered sequence. This is an
/// index midpoint, not a geometric midpoint along the path.
pub fn select<'a>(
    route: &RouteOption,
    stations_along_route: &'a [ChargingStation],
) -> Option<&'a ChargingStation> {
    if route.battery_impact_pct <= IMPACT_THRESHOLD_PCT {
        return None;
    }
    stations_along_route.get(stations_along_route.len() / 2)
}
