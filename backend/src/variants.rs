use shared::{RouteOption, VariantId};

use crate::routing::round1;

/// How a named variant deviates from the base route.
struct VariantProfile {
    id: VariantId,
    name: &'static str,
    distance_factor: f64,
    duration_factor: f64,
    /// Battery percent consumed per base-route kilometer.
    impact_per_km: f64,
    elevation_gain_m: u32,
    recommended: bool,
    note: &'static str,
}

const PROFILES: [VariantProfile; 3] = [
    VariantProfile {
        id: VariantId::Fastest,
        name: "Fastest",
        distance_factor: 1.00,
        duration_factor: 1.00,
        impact_per_km: 1.4,
        elevation_gain_m: 120,
        recommended: false,
        note: "Steep terrain.",
    },
    VariantProfile {
        id: VariantId::Efficient,
        name: "Efficient",
        distance_factor: 1.05,
        duration_factor: 1.10,
        impact_per_km: 0.9,
        elevation_gain_m: 40,
        recommended: true,
        note: "Optimised path.",
    },
    VariantProfile {
        id: VariantId::Safest,
        name: "Safest",
        distance_factor: 1.08,
        duration_factor: 1.20,
        impact_per_km: 1.1,
        elevation_gain_m: 60,
        recommended: false,
        note: "Safest roads.",
    },
];

/// Derive the three named options from one base route.
///
/// Battery impact is a linear estimate on the base distance. Pure: the same
/// inputs always produce the same options.
pub fn generate(
    base_distance_km: f64,
    base_duration_min: u32,
    current_battery_pct: u32,
) -> Vec<RouteOption> {
    PROFILES
        .iter()
        .map(|profile| {
            let distance_km = if profile.distance_factor == 1.0 {
                base_distance_km
            } else {
                round1(base_distance_km * profile.distance_factor)
            };
            let duration_min =
                (f64::from(base_duration_min) * profile.duration_factor).round() as u32;
            let battery_impact_pct = (base_distance_km * profile.impact_per_km).round().max(0.0) as u32;

            RouteOption {
                id: profile.id,
                name: profile.name.to_string(),
                distance_km,
                duration_min,
                battery_impact_pct,
                elevation_gain_m: profile.elevation_gain_m,
                is_recommended: profile.recommended,
                requires_charging_stop: battery_impact_pct > current_battery_pct,
                smart_summary: format!(
                    "{distance_km}km | {duration_min}m | -{battery_impact_pct}% | {}",
                    profile.note
                ),
                suggested_station_id: None,
            }
        })
        .collect()
}

pub fn recommended(options: &[RouteOption]) -> Option<&RouteOption> {
    options.iter().find(|o| o.is_recommended)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_id(options: &[RouteOption], id: VariantId) -> &RouteOption {
        options.iter().find(|o| o.id == id).unwrap()
    }

    #[test]
    fn fifty_km_at_sixty_percent() {
        let options = generate(50.0, 40, 60);
        assert_eq!(options.len(), 3);

        let fastest = by_id(&options, VariantId::Fastest);
        assert_eq!(fastest.distance_km, 50.0);
        assert_eq!(fastest.duration_min, 40);
        assert_eq!(fastest.battery_impact_pct, 70);
        assert_eq!(fastest.elevation_gain_m, 120);
        assert!(fastest.requires_charging_stop);

        let efficient = by_id(&options, VariantId::Efficient);
        assert_eq!(efficient.distance_km, 52.5);
        assert_eq!(efficient.duration_min, 44);
        assert_eq!(efficient.battery_impact_pct, 45);
        assert_eq!(efficient.elevation_gain_m, 40);
        assert!(!efficient.requires_charging_stop);

        let safest = by_id(&options, VariantId::Safest);
        assert_eq!(safest.distance_km, 54.0);
        assert_eq!(safest.duration_min, 48);
        assert_eq!(safest.battery_impact_pct, 55);
        assert_eq!(safest.elevation_gain_m, 60);
        assert!(!safest.requires_charging_stop);
    }

    #[test]
    fn efficient_is_the_only_recommended_option() {
        let options = generate(12.3, 25, 80);
        assert_eq!(recommended(&options).unwrap().id, VariantId::Efficient);
        assert_eq!(options.iter().filter(|o| o.is_recommended).count(), 1);
    }

    #[test]
    fn summary_lists_distance_duration_and_impact() {
        let options = generate(50.0, 40, 60);
        assert_eq!(
            by_id(&options, VariantId::Efficient).smart_summary,
            "52.5km | 44m | -45% | Optimised path."
        );
    }

    #[test]
    fn impact_equal_to_battery_needs_no_stop() {
        // 50 km * 1.4 = 70 %
        let options = generate(50.0, 40, 70);
        assert!(!by_id(&options, VariantId::Fastest).requires_charging_stop);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_three_fixed_variants(
                distance in 0.1f64..500.0,
                duration in 1u32..1_000,
                battery in 0u32..=100
            ) {
                let options = generate(distance, duration, battery);
                let ids: Vec<VariantId> = options.iter().map(|o| o.id).collect();
                prop_assert_eq!(ids, vec![VariantId::Fastest, VariantId::Efficient, VariantId::Safest]);
                prop_assert_eq!(by_id(&options, VariantId::Efficient).distance_km, round1(distance * 1.05));
                prop_assert_eq!(by_id(&options, VariantId::Safest).distance_km, round1(distance * 1.08));
            }

            #[test]
            fn prop_requires_stop_iff_impact_exceeds_battery(
                distance in 0.1f64..500.0,
                duration in 1u32..1_000,
                battery in 0u32..=100
            ) {
                for option in generate(distance, duration, battery) {
                    prop_assert_eq!(
                        option.requires_charging_stop,
                        option.battery_impact_pct > battery
                    );
                }
            }

            #[test]
            fn prop_generation_is_deterministic(
                distance in 0.1f64..500.0,
                duration in 1u32..1_000,
                battery in 0u32..=100
            ) {
                prop_assert_eq!(
                    generate(distance, duration, battery),
                    generate(distance, duration, battery)
                );
            }
        }
    }
}
