// Copyright (c) The specsplit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use specsplit_metadata::{ExampleId, TimingModel};
use specsplit_runner::{
    config::{DefaultConfigWarnings, SpecsplitConfig},
    items::{FsSpecSource, Granularity, ItemBuilder},
    merge::merge_samples,
    partition::{ChunkRequest, LoadBalancer},
    report::{ReportParser, SampleGranularity},
    timings::{load_timing_model, write_timing_model},
};
use std::num::NonZeroUsize;

fn merged_model(config: &SpecsplitConfig, granularity: SampleGranularity) -> Result<TimingModel> {
    let parser = ReportParser::new(config.layout());
    let samples = [first_run()?, second_run()?]
        .iter()
        .map(|xml| parser.parse(xml, granularity))
        .collect::<Vec<_>>();
    Ok(merge_samples(granularity, &samples)?)
}

fn plan(
    config: &SpecsplitConfig,
    project: &FixtureProject,
    model: Option<&TimingModel>,
    granularity: Granularity,
    request: ChunkRequest,
) -> Result<Vec<Vec<String>>> {
    let source = FsSpecSource::new(project.root());
    let builder = ItemBuilder::new(config.layout(), config.static_weigher(), &source)
        .with_split_ratio(config.hybrid_split_ratio());
    let set = builder.build(
        project.candidates(),
        model,
        granularity,
        request.total_chunks(),
    );
    let assignment = LoadBalancer::balance(set.items, request.total_chunks())?;
    let mut chunks = Vec::with_capacity(assignment.total_chunks());
    for index in 0..assignment.total_chunks() {
        chunks.push(assignment.render(index)?);
    }
    Ok(chunks)
}

#[test]
fn example_timings_round_trip_through_disk() -> Result<()> {
    let project = FixtureProject::new()?;
    let config = SpecsplitConfig::from_sources(project.root(), None, &mut DefaultConfigWarnings)?;

    let model = merged_model(&config, SampleGranularity::Example)?;
    write_timing_model(&model, &config.timings_path())?;
    let loaded = load_timing_model(&config.timings_path())?;
    assert_eq!(loaded, model);

    let a = loaded
        .examples("spec/a_spec.sh")
        .expect("a_spec.sh has example data");
    assert_eq!(a.total, 10.0);
    assert_eq!(a.examples[&ExampleId::new(1)].time, 7.0);
    assert_eq!(a.examples[&ExampleId::new(1)].name, "a adds");
    assert_eq!(a.examples[&ExampleId::new(2)].time, 3.0);
    // b_spec.sh was only observed once, so the second run doesn't pull its average down.
    assert_eq!(loaded.file_duration("spec/b_spec.sh"), Some(3.0));
    assert_eq!(loaded.file_duration("spec/nested/c_spec.sh"), None);

    Ok(())
}

#[test]
fn file_granularity_pipeline() -> Result<()> {
    let project = FixtureProject::new()?;
    let config = SpecsplitConfig::default_config(project.root());
    let model = merged_model(&config, SampleGranularity::File)?;
    assert_eq!(model.version(), "1.0");

    let request: ChunkRequest = "1/2".parse()?;
    let chunks = plan(&config, &project, Some(&model), Granularity::File, request)?;

    // c_spec.sh (static estimate 25) outweighs everything else combined.
    assert_eq!(
        chunks,
        vec![
            vec!["spec/nested/c_spec.sh".to_owned()],
            vec!["spec/a_spec.sh".to_owned(), "spec/b_spec.sh".to_owned()],
        ]
    );
    Ok(())
}

#[test]
fn hybrid_granularity_pipeline() -> Result<()> {
    let project = FixtureProject::new()?;
    let config = SpecsplitConfig::default_config(project.root());
    let model = merged_model(&config, SampleGranularity::Example)?;

    // Total weight 38 over 2 chunks: only a_spec.sh (10) crosses the split threshold of 9.5.
    let request = ChunkRequest::new(0, 2)?;
    let chunks = plan(&config, &project, Some(&model), Granularity::Hybrid, request)?;
    assert_eq!(
        chunks,
        vec![
            vec!["spec/nested/c_spec.sh".to_owned()],
            vec!["spec/a_spec.sh:@1:@2".to_owned(), "spec/b_spec.sh".to_owned()],
        ]
    );

    // Every worker computes the same partition.
    let again = plan(&config, &project, Some(&model), Granularity::Hybrid, request)?;
    ensure!(again == chunks, "partition is not deterministic");
    Ok(())
}

#[test]
fn missing_model_uses_static_weights() -> Result<()> {
    let project = FixtureProject::new()?;
    let config = SpecsplitConfig::default_config(project.root());
    ensure!(
        load_timing_model(&config.timings_path()).is_err(),
        "no timing model has been written yet"
    );

    let request = ChunkRequest::new(0, 3)?;
    let chunks = plan(&config, &project, None, Granularity::Example, request)?;
    // a_spec.sh: 6 lines + 3 blocks = 36; c_spec.sh: 25; b_spec.sh: 4 lines + 2 blocks = 24.
    assert_eq!(
        chunks,
        vec![
            vec!["spec/a_spec.sh".to_owned()],
            vec!["spec/nested/c_spec.sh".to_owned()],
            vec!["spec/b_spec.sh".to_owned()],
        ]
    );

    let total_chunks = NonZeroUsize::new(5).expect("non-zero");
    let set = ItemBuilder::new(
        config.layout(),
        config.static_weigher(),
        &FsSpecSource::new(project.root()),
    )
    .build(project.candidates(), None, Granularity::File, total_chunks);
    assert_eq!(set.estimated.len(), SPEC_FILES.len());
    let assignment = LoadBalancer::balance(set.items, total_chunks)?;
    let empty: Vec<String> = Vec::new();
    assert_eq!(assignment.render(4)?, empty);
    Ok(())
}
