// server/src/cli/handlers.rs

use anyhow::Result;
use lib::seed::{provision_from_seed, SeedFile};
use lib::storage_engine::StorageBundle;
use lib::{AssignmentEngine, NewEmergency};
use models::{AssignmentResult, Coordinate, DistanceResult, EmergencyId, TargetDepartment};

fn print_assignment(result: &AssignmentResult) {
    match result {
        AssignmentResult::Assigned { emergency_id, hospital_id, message, .. } => {
            println!("==> {} [emergency {}, hospital {}]", message, emergency_id, hospital_id);
        }
        AssignmentResult::Failed { emergency_id, reason, message } => {
            println!("==> Assignment failed ({}): {} [emergency {}]", reason, message, emergency_id);
        }
    }
}

fn format_ranked(rank: usize, result: &DistanceResult) -> String {
    format!(
        "{:>2}. {:<28} {:>8.2} km  {:<14} beds {:>3}  [{}]",
        rank,
        result.hospital_name,
        result.distance_km,
        result.duration.as_deref().unwrap_or("-"),
        result.available_beds,
        result.hospital_id
    )
}

pub async fn handle_seed(bundle: &StorageBundle, seed: &SeedFile) -> Result<()> {
    let provisioned = provision_from_seed(bundle.hospitals.as_ref(), bundle.capacity.as_ref(), seed).await?;
    if provisioned == 0 {
        println!("==> Hospitals already provisioned; seed skipped");
    } else {
        println!("==> Provisioned {} hospitals", provisioned);
    }
    Ok(())
}

pub async fn handle_hospitals(engine: &AssignmentEngine) -> Result<()> {
    let overview = engine.hospital_overview().await?;
    if overview.is_empty() {
        println!("==> No hospitals provisioned");
        return Ok(());
    }
    for status in overview {
        let beds = match &status.beds {
            Some(beds) => format!("{}/{}", beds.available_beds(), beds.total_beds()),
            None => "unavailable".to_string(),
        };
        println!(
            "[{}] {:<28} {} beds {:<11} {}{}",
            status.hospital.id,
            status.hospital.name,
            status.hospital.coordinate,
            beds,
            status.hospital.address.as_deref().unwrap_or(""),
            if status.hospital.is_active { "" } else { " (inactive)" }
        );
    }
    Ok(())
}

pub async fn handle_nearest(engine: &AssignmentEngine, lat: f64, lng: f64) -> Result<()> {
    let ranked = engine.get_nearest_hospitals(lat, lng).await?;
    if ranked.is_empty() {
        println!("==> No active hospitals found in the system");
    }
    for (i, result) in ranked.iter().enumerate() {
        println!("{}", format_ranked(i + 1, result));
    }
    Ok(())
}

pub async fn handle_report(
    engine: &AssignmentEngine,
    location: Option<(f64, f64)>,
    department: TargetDepartment,
    description: Option<String>,
) -> Result<()> {
    let outcome = engine
        .report(NewEmergency {
            origin: location.map(|(lat, lng)| Coordinate::new(lat, lng)),
            target_department: department,
            description,
        })
        .await?;
    println!("==> Recorded emergency {}", outcome.emergency_id);
    match outcome.assignment {
        Some(result) => print_assignment(&result),
        None => println!("==> Not addressed to a hospital; no bed reserved"),
    }
    Ok(())
}

pub async fn handle_assign(engine: &AssignmentEngine, id: EmergencyId) -> Result<()> {
    let result = engine.assign(id).await?;
    print_assignment(&result);
    Ok(())
}

pub async fn handle_redirect(engine: &AssignmentEngine, id: EmergencyId, reason: &str) -> Result<()> {
    let result = engine.redirect(id, reason).await?;
    print_assignment(&result);
    Ok(())
}

pub async fn handle_show(engine: &AssignmentEngine, id: EmergencyId) -> Result<()> {
    let record = engine.get_emergency(id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub async fn handle_backfill(engine: &AssignmentEngine) -> Result<()> {
    let results = engine.assign_pending().await?;
    let assigned = results.iter().filter(|r| r.is_assigned()).count();
    println!("==> Processed {} pending emergencies, {} assigned", results.len(), assigned);
    for result in &results {
        print_assignment(result);
    }
    Ok(())
}
