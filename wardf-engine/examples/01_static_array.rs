//! Static Array Example
//!
//! Three simulated antennas in a triangle listen to one Wi-Fi emitter. The
//! engine collects their RSSI readings in 1 s windows, multilaterates each
//! window and prints the smoothed fixes. Halfway through, the emitter moves.
//!
//! ## What You'll Learn
//!
//! - Describing an antenna array and validating a configuration
//! - Registering hardware with the HAL
//! - Spawning the engine and subscribing to estimates
//! - Swapping the configuration while the engine runs
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run -p wardf-engine --example 01_static_array
//! ```

use std::sync::Arc;

use wardf_core::algorithms::{CentroidParams, PathLossParams};
use wardf_core::{AntennaArray, AntennaDescriptor, Point3};
use wardf_engine::{AlgorithmKind, DfConfiguration, EngineBuilder, LogTelemetry};
use wardf_hal::{Antenna, HardwareRegistry, SimulatedBackend};

const ANTENNAS: [(&str, f64, f64); 3] = [("north", 5.0, 10.0), ("west", 0.0, 0.0), ("east", 10.0, 0.0)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Direction Finding: Static Array");
    println!("===============================\n");

    let emitter = Point3::planar(5.0, 3.0);
    let mut registry = HardwareRegistry::new();
    let mut backends = Vec::new();
    for (id, x, y) in ANTENNAS {
        let backend = SimulatedBackend::emitter(Point3::planar(x, y), emitter, PathLossParams::default())
            .with_target("aa:bb:cc:dd:ee:ff");
        registry.register(Antenna::new(id, backend.clone()));
        backends.push(backend);
        println!("  antenna {:>5} at ({:4.1}, {:4.1})", id, x, y);
    }
    println!("  emitter       at ({:4.1}, {:4.1})\n", emitter.x, emitter.y);

    let array = AntennaArray::new(
        ANTENNAS
            .iter()
            .map(|(id, x, y)| AntennaDescriptor::at(*id, *x, *y, 0.0))
            .collect(),
    );
    let config = DfConfiguration::new(array)
        .with_window(1_000)
        .with_fallback(AlgorithmKind::WeightedCentroid(CentroidParams::default()));
    let engine = EngineBuilder::new(config, registry)?
        .with_telemetry(Arc::new(LogTelemetry))
        .spawn();
    let mut estimates = engine.subscribe();
    engine.start().await?;

    for cycle in 1..=8 {
        let Some(estimate) = estimates.next().await else {
            break;
        };
        match estimate.position_value() {
            Some(p) => println!(
                "cycle {}: ({:5.2}, {:5.2})  confidence {:.2}  [{}{}]",
                cycle,
                p.x,
                p.y,
                estimate.confidence.as_float(),
                estimate.algorithm,
                if estimate.smoothed { ", smoothed" } else { "" }
            ),
            None => println!("cycle {}: no fix ({:?})", cycle, estimate.status),
        }

        if cycle == 4 {
            let moved = Point3::planar(7.0, 6.0);
            for backend in &backends {
                backend.move_emitter(moved);
            }
            println!("\n  emitter moved to ({:.1}, {:.1})\n", moved.x, moved.y);
        }
    }

    // shorter windows from here on; the engine picks them up at the next boundary
    let faster = engine.config().get().as_ref().clone().with_window(500);
    engine.set_configuration(faster)?;
    if let Some(estimate) = estimates.next().await {
        println!("\nafter swap: {:?}", estimate.position_value());
    }

    let status = engine.status().await?;
    println!(
        "\n{} cycles, {} estimates, mean compute {:.0} µs",
        status.metrics.cycles, status.metrics.estimates_emitted, status.metrics.avg_compute_us
    );
    engine.shutdown().await?;
    Ok(())
}
