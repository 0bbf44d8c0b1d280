//! Integration tests for loading, splitting and preprocessing.
//!
//! These tests run the crate end to end on the small fixture tables under
//! `tests/fixtures`.

use brushwork_processing::{
    Assignment, EpisodeKey, EpisodeLoader, ProcessingError, Recipe, SplitConfig, initial_split,
    vfold,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture() -> brushwork_processing::Dataset {
    EpisodeLoader::default()
        .load(
            fixtures_path().join("elements.csv"),
            fixtures_path().join("ratings.csv"),
        )
        .expect("fixtures should load")
}

fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_fixture_tables() {
    let data = load_fixture();
    assert_eq!(data.len(), 24);
    assert_eq!(
        data.feature_names().to_vec(),
        vec!["TREE", "MOUNTAIN", "LAKE", "CLOUDS", "BARN", "FRAMED", "votes"]
    );
    assert_eq!(data.target_name(), "rating");
    assert_eq!(data.episodes()[0].key, EpisodeKey::new(1, 1));
    assert_eq!(data.episodes()[0].title, "GLOW LAKE");
    assert_eq!(data.target()[0], 7.6);
    assert_eq!(data.column("votes").unwrap()[0], 227.0);
}

#[test]
fn test_load_missing_file() {
    let err = EpisodeLoader::default()
        .load(fixtures_path().join("nope.csv"), fixtures_path().join("ratings.csv"))
        .unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
    assert!(err.to_string().contains("elements"));
}

#[test]
fn test_load_unmatched_episode_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let elements = write_temp(
        &dir,
        "elements.csv",
        "EPISODE,TITLE,TREE\nS01E01,\"A\",1\nS01E02,\"B\",0\nS09E09,\"C\",1\n",
    );
    let ratings = write_temp(
        &dir,
        "ratings.csv",
        "season,episode,rating,votes\n1,1,7.5,100\n1,2,7.9,80\n",
    );
    let err = EpisodeLoader::default().load(&elements, &ratings).unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::UnmatchedJoin { count: 1, ref first } if first == "S09E09"
    ));
}

#[test]
fn test_load_missing_rating_value() {
    let dir = tempfile::tempdir().unwrap();
    let elements = write_temp(&dir, "elements.csv", "EPISODE,TITLE,TREE\nS01E01,A,1\nS01E02,B,0\n");
    let ratings = write_temp(
        &dir,
        "ratings.csv",
        "season,episode,rating,votes\n1,1,7.5,100\n1,2,,80\n",
    );
    let err = EpisodeLoader::default().load(&elements, &ratings).unwrap_err();
    assert_eq!(err.error_code(), "MALFORMED_VALUE");
}

// ============================================================================
// Splitting and folds
// ============================================================================

#[test]
fn test_split_then_folds_cover_training() {
    let data = load_fixture();
    let split = initial_split(data.len(), &SplitConfig::new(0.75, 11)).unwrap();
    let (training, test) = split.apply(&data);
    assert_eq!(training.len(), 18);
    assert_eq!(test.len(), 6);

    for t in test.episodes() {
        assert!(training.episodes().iter().all(|e| e.key != t.key));
    }

    let folds = vfold(training.len(), 5, 11).unwrap();
    let mut assessed: Vec<usize> = folds.iter().flat_map(|f| f.assessment.clone()).collect();
    assessed.sort_unstable();
    assert_eq!(assessed, (0..18).collect::<Vec<_>>());
}

// ============================================================================
// Recipes on real columns
// ============================================================================

#[test]
fn test_basic_recipe_drops_rare_and_constant_elements() {
    let data = load_fixture();
    let fitted = Recipe::basic().fit(&data.frame(), &Assignment::new()).unwrap();
    assert_eq!(fitted.dropped_columns(), vec!["BARN".to_string(), "FRAMED".to_string()]);
    assert_eq!(
        fitted.output_names,
        vec!["TREE", "MOUNTAIN", "LAKE", "CLOUDS", "votes"]
    );
}

#[test]
fn test_recipe_fitted_on_analysis_applies_to_assessment() {
    let data = load_fixture();
    let folds = vfold(data.len(), 4, 3).unwrap();
    let analysis = data.subset(&folds[0].analysis);
    let assessment = data.subset(&folds[0].assessment);

    let fitted = Recipe::pca()
        .fit(&analysis.frame(), &Assignment::new().with("num_comp", 2usize))
        .unwrap();
    let baked = fitted.transform(&assessment.frame()).unwrap();
    assert_eq!(baked.nrows(), assessment.len());
    assert_eq!(baked.names, vec!["PC1".to_string(), "PC2".to_string()]);
    assert!(baked.values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_max_output_width_on_fixture() {
    let data = load_fixture();
    assert_eq!(Recipe::basic().max_output_width(&data.frame()).unwrap(), 5);
    assert_eq!(Recipe::pca().max_output_width(&data.frame()).unwrap(), 4);
    assert_eq!(Recipe::corr().max_output_width(&data.frame()).unwrap(), 5);
}
