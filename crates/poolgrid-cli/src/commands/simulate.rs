use std::path::Path;

use poolgrid_balance::CycleReport;

use crate::scenario::Scenario;

pub fn simulate(path: &Path, cycles: u32, format: &str) -> anyhow::Result<()> {
    let scenario = Scenario::from_file(path)?;
    let mut sim = scenario.build()?;

    let mut reports = Vec::with_capacity(cycles as usize);
    for _ in 0..cycles {
        reports.push(sim.balancer.balance()?);
        sim.advance()?;
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        _ => {
            for (i, report) in reports.iter().enumerate() {
                println!("{}", format_cycle(i + 1, report));
            }
        }
    }

    Ok(())
}

pub fn format_cycle(cycle: usize, report: &CycleReport) -> String {
    let mut out = format!(
        "cycle {cycle} ({:?}, total {})",
        report.branch, report.total_processes
    );
    if !report.overrides_resolved {
        out.push_str(" [overrides unavailable]");
    }
    for pool in &report.pools {
        let to = match pool.decision {
            poolgrid_balance::ScaleDecision::ScaleTo(n) => n.to_string(),
            poolgrid_balance::ScaleDecision::NoChange => "-".to_string(),
        };
        let forced = pool
            .override_count
            .map(|n| format!(" forced={n}"))
            .unwrap_or_default();
        out.push_str(&format!(
            "\n  {:<20} ideal={:>6.2}{forced} desired={:<3} {} → {}",
            pool.queue, pool.ideal, pool.desired, pool.from, to
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_output_lists_every_pool() {
        let scenario = Scenario::from_toml_str(
            r#"
[supervisor]
max_processes = 4

[[queues]]
name = "fast"
backlog = 3
processes = 1

[[queues]]
name = "idle"
processes = 2
"#,
        )
        .unwrap();
        let mut sim = scenario.build().unwrap();
        let report = sim.balancer.balance().unwrap();

        let text = format_cycle(1, &report);
        assert!(text.starts_with("cycle 1 (Binary"));
        assert!(text.contains("fast"));
        assert!(text.contains("idle"));
    }

    #[test]
    fn backlog_drains_between_cycles() {
        let scenario = Scenario::from_toml_str(
            r#"
[supervisor]
max_processes = 4
balance_max_shift = 4

[[queues]]
name = "jobs"
backlog = 10
jobs_per_process = 5
processes = 1
"#,
        )
        .unwrap();
        let mut sim = scenario.build().unwrap();

        let first = sim.balancer.balance().unwrap();
        assert_eq!(first.pools[0].decision, poolgrid_balance::ScaleDecision::ScaleTo(4));
        sim.advance().unwrap();

        // Four processes drained the whole backlog; the pool falls back to the floor.
        assert_eq!(sim.backlog_sizes().unwrap(), vec![("jobs".to_string(), 0)]);
        sim.balancer.balance().unwrap();
        assert_eq!(sim.supervisor.counts(), vec![("jobs".to_string(), 1)]);
    }

    #[test]
    fn simulate_reads_scenario_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        std::fs::write(&path, "[[queues]]\nname = \"default\"\nbacklog = 1\n").unwrap();

        assert!(simulate(&path, 2, "json").is_ok());
    }
}
