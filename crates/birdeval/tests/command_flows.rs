mod support;

use std::path::Path;

use birdeval::batch::ScoresArtifact;
use birdeval::cli::commands::{CommandContext, generate, run};
use birdeval::config::{PathOverrides, resolve_bench_paths};
use birdeval::dataset::read_predictions_artifact;
use birdeval::pipeline::PipelineMode;

use support::{
    ScriptedLlm, TOY_DB, TOY_SETUP_SQL, create_database, recording_context, unique_temp_dir,
};

fn bench_context(root: &Path, session: &str) -> (CommandContext, std::sync::Arc<support::RecordingSink>) {
    let data_dir = root.join("data");
    std::fs::create_dir_all(&data_dir).expect("data dir should be creatable");
    std::fs::write(
        data_dir.join("mini_dev_sqlite.json"),
        r#"[
            {"db_id": "toy", "question": "How many people?", "evidence": "t is people"},
            {"db_id": "toy", "question": "How many pets?", "evidence": ""},
            {"db_id": "toy", "question": "How many names?", "evidence": ""}
        ]"#,
    )
    .expect("questions should write");
    std::fs::write(
        data_dir.join("mini_dev_sqlite_gold.sql"),
        "SELECT COUNT(*) FROM t\ttoy\nSELECT COUNT(*) FROM pets\ttoy\nSELECT COUNT(name) FROM t\ttoy\n",
    )
    .expect("gold should write");
    create_database(&data_dir.join("dev_databases"), TOY_DB, TOY_SETUP_SQL);

    let paths = resolve_bench_paths(root, root, PathOverrides::default())
        .expect("paths should resolve");
    let (run, sink) = recording_context(session);
    (CommandContext { paths, run }, sink)
}

#[test]
fn run_command_writes_predictions_and_scores() {
    let root = unique_temp_dir("birdeval-flow-run");
    let (context, sink) = bench_context(&root, "flow-run");
    let args = run::RunArgs {
        num_samples: 10,
        mode: PipelineMode::Minimal,
        workers: 2,
        timeout_secs: 5.0,
    };

    run::run(&args, &context, ScriptedLlm::answering("SELECT COUNT(*) FROM t"))
        .expect("run should succeed");

    let predictions = read_predictions_artifact(&context.paths.out_dir.join("predictions.json"))
        .expect("predictions should read back");
    assert_eq!(predictions.len(), 3);
    assert!(predictions.values().all(|prediction| prediction.sql == "SELECT COUNT(*) FROM t"));

    let scores = serde_json::from_str::<ScoresArtifact>(
        &std::fs::read_to_string(context.paths.out_dir.join("scores.json"))
            .expect("scores should exist"),
    )
    .expect("scores should parse");
    assert_eq!((scores.total, scores.correct), (3, 2));
    assert_eq!(scores.accuracy_pct, 66.67);
    assert_eq!(scores.scores.get(&1), Some(&0));

    let labels = sink.execution_labels();
    assert_eq!(labels.iter().filter(|label| *label == "DB gold").count(), 3);
    assert_eq!(labels.iter().filter(|label| *label == "DB predicted").count(), 3);
}

#[test]
fn generate_command_honours_the_sample_limit() {
    let root = unique_temp_dir("birdeval-flow-generate");
    let (context, sink) = bench_context(&root, "flow-generate");
    let args = generate::GenerateArgs {
        num_samples: 2,
        mode: PipelineMode::Full,
        workers: 1,
        timeout_secs: 5.0,
    };

    generate::run(&args, &context, ScriptedLlm::answering("SELECT COUNT(*) FROM pets"))
        .expect("generate should succeed");

    let predictions = read_predictions_artifact(&context.paths.out_dir.join("predictions.json"))
        .expect("predictions should read back");
    assert_eq!(predictions.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(predictions[&0].db_id, TOY_DB);
    assert!(!context.paths.out_dir.join("scores.json").exists());
    assert_eq!(sink.execution_labels(), vec!["Test query", "Test query"]);
}
