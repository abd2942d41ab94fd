//! Synthetic order generation.
//!
//! Produces a realistic year of last-mile orders: a Prime/Standard mix,
//! normally distributed delivery times, occasional delays past the
//! promised date, tier-specific carrier mixes and a conceptual delivery
//! cost. The same seed always produces the same orders.

use crate::config::SimulateConfig;
use crate::ingest::RawOrderRow;
use crate::models::{Carrier, OrderRecord, RouteScore, ServiceLevel};
use anyhow::{bail, Context, Result};
use chrono::Duration;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use std::path::Path;
use tracing::{debug, info};

const PRIME_CARRIER_MIX: [(Carrier, f64); 4] = [
    (Carrier::Amzl, 0.85),
    (Carrier::Ups, 0.07),
    (Carrier::Usps, 0.05),
    (Carrier::FedEx, 0.03),
];

const STANDARD_CARRIER_MIX: [(Carrier, f64); 4] = [
    (Carrier::Amzl, 0.20),
    (Carrier::Ups, 0.40),
    (Carrier::Usps, 0.30),
    (Carrier::FedEx, 0.10),
];

const ROUTE_SCORE_MIX: [(RouteScore, f64); 3] = [
    (RouteScore::High, 0.50),
    (RouteScore::Medium, 0.35),
    (RouteScore::Low, 0.15),
];

/// Cost per package, in dollars.
const AMZL_BASE_COST: f64 = 5.00;
const THIRD_PARTY_BASE_COST: f64 = 4.00;
const PRIME_COST_PREMIUM: f64 = 1.2;

const DESTINATIONS: [(&str, &str); 20] = [
    ("New York", "NY"),
    ("Los Angeles", "CA"),
    ("Chicago", "IL"),
    ("Houston", "TX"),
    ("Phoenix", "AZ"),
    ("Philadelphia", "PA"),
    ("San Antonio", "TX"),
    ("San Diego", "CA"),
    ("Dallas", "TX"),
    ("Austin", "TX"),
    ("Jacksonville", "FL"),
    ("Columbus", "OH"),
    ("Charlotte", "NC"),
    ("Seattle", "WA"),
    ("Denver", "CO"),
    ("Boston", "MA"),
    ("Nashville", "TN"),
    ("Portland", "OR"),
    ("Atlanta", "GA"),
    ("Miami", "FL"),
];

/// Generate `count` synthetic orders.
pub fn generate(count: usize, config: &SimulateConfig) -> Result<Vec<OrderRecord>> {
    check_config(config)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let span_days = (config.end_date - config.start_date).num_days();

    let prime_days = Normal::new(config.prime_days_mean, config.prime_days_std_dev)
        .context("Invalid Prime delivery-time distribution")?;
    let standard_days = Normal::new(config.standard_days_mean, config.standard_days_std_dev)
        .context("Invalid Standard delivery-time distribution")?;

    let prime_carriers = WeightedIndex::new(PRIME_CARRIER_MIX.iter().map(|(_, w)| *w))?;
    let standard_carriers = WeightedIndex::new(STANDARD_CARRIER_MIX.iter().map(|(_, w)| *w))?;
    let route_scores = WeightedIndex::new(ROUTE_SCORE_MIX.iter().map(|(_, w)| *w))?;

    info!("Generating {} synthetic orders (seed {})", count, config.seed);

    let mut orders = Vec::with_capacity(count);
    for i in 0..count {
        let order_date = config.start_date + Duration::days(rng.gen_range(0..=span_days));
        let is_prime = rng.gen::<f64>() < config.prime_ratio;

        let (level, days_dist, carriers, delay_probability) = if is_prime {
            (
                ServiceLevel::Prime,
                &prime_days,
                (&prime_carriers, &PRIME_CARRIER_MIX),
                config.prime_delay_probability,
            )
        } else {
            (
                ServiceLevel::Standard,
                &standard_days,
                (&standard_carriers, &STANDARD_CARRIER_MIX),
                config.standard_delay_probability,
            )
        };

        let promised_days = (days_dist.sample(&mut rng).round() as i64).max(1);
        let promised_delivery_date = order_date + Duration::days(promised_days);

        let mut delivery_date = promised_delivery_date;
        if rng.gen::<f64>() < delay_probability {
            delivery_date += Duration::days(rng.gen_range(1..=config.max_delay_days));
        }

        let carrier = carriers.1[carriers.0.sample(&mut rng)].0;

        let base_cost = if carrier.is_third_party() {
            THIRD_PARTY_BASE_COST
        } else {
            AMZL_BASE_COST
        };
        let premium = if is_prime { PRIME_COST_PREMIUM } else { 1.0 };
        let cost = base_cost * premium * rng.gen_range(0.9..1.1);

        let (city, state) = DESTINATIONS[rng.gen_range(0..DESTINATIONS.len())];
        let route_score = ROUTE_SCORE_MIX[route_scores.sample(&mut rng)].0;

        orders.push(OrderRecord {
            order_id: format!("ORD-{:07}", i),
            service_level: level,
            carrier,
            destination_state: state.to_string(),
            destination_city: city.to_string(),
            order_date,
            delivery_date,
            promised_delivery_date,
            route_score,
            delivery_cost_cents: Some((cost * 100.0).round() as i64),
        });
    }

    debug!("Generated {} orders", orders.len());
    Ok(orders)
}

/// Write orders as CSV in the layout ingestion reads.
pub fn write_csv(orders: &[OrderRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for order in orders {
        writer
            .serialize(RawOrderRow::from(order))
            .with_context(|| format!("Failed to write order {}", order.order_id))?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

fn check_config(config: &SimulateConfig) -> Result<()> {
    if config.end_date < config.start_date {
        bail!(
            "Simulation end_date {} is before start_date {}",
            config.end_date,
            config.start_date
        );
    }

    for (name, p) in [
        ("prime_ratio", config.prime_ratio),
        ("prime_delay_probability", config.prime_delay_probability),
        ("standard_delay_probability", config.standard_delay_probability),
    ] {
        if !(0.0..=1.0).contains(&p) {
            bail!("Simulation {} must be between 0.0 and 1.0, got {}", name, p);
        }
    }

    if config.max_delay_days < 1 {
        bail!("Simulation max_delay_days must be at least 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::compute;
    use crate::analysis::FilterContext;
    use crate::ingest::{load_inputs, IngestOptions};
    use crate::store::OrderStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_same_seed_same_orders() {
        let config = SimulateConfig::default();
        let first = generate(200, &config).unwrap();
        let second = generate(200, &config).unwrap();
        assert_eq!(first, second);

        let other = generate(
            200,
            &SimulateConfig {
                seed: 7,
                ..SimulateConfig::default()
            },
        )
        .unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_generated_orders_respect_invariants() {
        let config = SimulateConfig::default();
        let orders = generate(1000, &config).unwrap();

        for order in &orders {
            assert!(order.delivery_date >= order.order_date);
            assert!(order.delivery_date >= order.promised_delivery_date);
            assert!(order.order_date >= config.start_date && order.order_date <= config.end_date);
            assert!(order.delivery_days() >= 1);
            assert!(order.delivery_cost_cents.unwrap() > 0);
        }
    }

    #[test]
    fn test_distribution_shape() {
        let orders = generate(5000, &SimulateConfig::default()).unwrap();
        let metrics = compute(&orders, &FilterContext::new());

        let prime_share = metrics.service_levels.prime.orders as f64 / 5000.0;
        assert!((prime_share - 0.70).abs() < 0.05, "prime share {}", prime_share);

        assert!(
            metrics.service_levels.prime.avg_delivery_days
                < metrics.service_levels.standard.avg_delivery_days
        );
        assert!(
            metrics.service_levels.prime.on_time_pct > metrics.service_levels.standard.on_time_pct
        );
        assert!(metrics.carrier_share(Carrier::Amzl) > 50.0);

        let prime = FilterContext::new().with_service_levels([ServiceLevel::Prime]);
        assert!(compute(&orders, &prime).carrier_share(Carrier::Amzl) > 75.0);
    }

    #[test]
    fn test_written_csv_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("simulated_orders.csv");
        let orders = generate(50, &SimulateConfig::default()).unwrap();
        write_csv(&orders, &path).unwrap();

        let store = Arc::new(OrderStore::new());
        let summary =
            tokio_test::block_on(load_inputs(&[path], store.clone(), &IngestOptions::default()))
                .unwrap();

        assert_eq!(summary.accepted, 50);
        assert_eq!(summary.rejected, 0);
        assert_eq!(store.snapshot().as_slice(), orders.as_slice());
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = SimulateConfig {
            prime_ratio: 1.5,
            ..SimulateConfig::default()
        };
        assert!(generate(10, &config).is_err());

        let config = SimulateConfig {
            end_date: SimulateConfig::default().start_date - Duration::days(1),
            ..SimulateConfig::default()
        };
        assert!(generate(10, &config).is_err());
    }
}
