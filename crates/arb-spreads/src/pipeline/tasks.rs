//! The standard task graph.

use super::{Task, TaskGraph};
use crate::{
    Settings,
    measures::{Measure, Ois3m, TipsTreasury},
    report::{TableFormat, publish_summary, table_paths},
    sources::{
        CIP_FILE, FRENCH_DATASETS, FedCurve, HttpFetcher, pull_cip_workbook, pull_curve, pull_french,
        table_file_name,
    },
};
use std::sync::Arc;

const SETUP: &str = "setup_dirs";

fn pull_task(settings: &Settings, name: &str, curve: FedCurve) -> Task {
    Task::new(name, format!("Download the Fed {curve} yield curve"), move |s| {
        let fetcher = HttpFetcher::new()?;
        pull_curve(&fetcher, curve, &s.data_dir)?;
        Ok(())
    })
    .with_task_dep([SETUP])
    .with_targets([settings.data_dir.join(curve.file_name())])
}

fn french_task(settings: &Settings) -> Task {
    let targets = FRENCH_DATASETS
        .iter()
        .map(|dataset| settings.data_dir.join(table_file_name(dataset, 0)));
    Task::new("pull_ken_french", "Download the Ken French portfolio returns", |s| {
        let fetcher = HttpFetcher::new()?;
        for dataset in FRENCH_DATASETS {
            pull_french(&fetcher, dataset, &s.data_dir, s.start_date, s.end_date)?;
        }
        Ok(())
    })
    .with_task_dep([SETUP])
    .with_targets(targets)
    .with_config("start_date", settings.start_date)
    .with_config("end_date", settings.end_date)
}

fn cip_task(settings: &Settings) -> Task {
    Task::new("download_cip_data", "Download the CIP deviations workbook", |s| {
        let fetcher = HttpFetcher::new()?;
        pull_cip_workbook(&fetcher, &s.manual_data_dir)?;
        Ok(())
    })
    .with_task_dep([SETUP])
    .with_targets([settings.manual_data_dir.join(CIP_FILE)])
}

fn compute_task(settings: &Settings, name: &str, measure: Arc<dyn Measure>) -> Task {
    let doc = format!("Compute {}", measure.description());
    let file_dep = measure.input_paths(settings);
    let target = measure.output_path(settings);
    Task::new(name, doc, move |s| {
        measure.run(s)?;
        Ok(())
    })
    .with_task_dep([SETUP])
    .with_file_dep(file_dep)
    .with_targets([target])
}

fn tables_task(settings: &Settings, name: &str, measure: Arc<dyn Measure>) -> Task {
    let doc = format!("Summary tables for {}", measure.name());
    let source = measure.output_path(settings);
    let targets = table_paths(measure.as_ref(), settings, &TableFormat::ALL);
    Task::new(name, doc, move |s| {
        publish_summary(measure.as_ref(), s, &TableFormat::ALL)?;
        Ok(())
    })
    .with_file_dep([source])
    .with_targets(targets)
    .with_config("start_date", settings.start_date)
    .with_config("end_date", settings.end_date)
}

/// Build the standard graph for `settings`.
///
/// Paths are resolved once, here, so the graph reflects the directories that
/// existed when it was built.
pub fn default_graph(settings: &Settings) -> TaskGraph {
    let tips: Arc<dyn Measure> = Arc::new(TipsTreasury);
    let ois: Arc<dyn Measure> = Arc::new(Ois3m);

    let mut graph = TaskGraph::new();
    graph.register(Task::new(SETUP, "Create the data and output directories", |s| {
        s.create_dirs()
    }));
    graph.register(pull_task(settings, "pull_fed_yield_curve", FedCurve::Nominal));
    graph.register(pull_task(settings, "pull_fed_tips_yield_curve", FedCurve::Tips));
    graph.register(french_task(settings));
    graph.register(cip_task(settings));
    graph.register(compute_task(settings, "compute_tips_treasury", Arc::clone(&tips)));
    graph.register(tables_task(settings, "tips_treasury_tables", tips));
    graph.register(compute_task(settings, "process_ois_data", Arc::clone(&ois)));
    graph.register(tables_task(settings, "ois_tables", ois));
    graph
}
