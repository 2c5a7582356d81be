//! Catalog seed loading.
//!
//! Seeds are YAML files (see `config/sources/`) describing sources and the
//! fields to ingest for each. Environment variables are substituted with
//! `${VAR}` or `${VAR:-default}` syntax before parsing.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use storage::CatalogSeed;

/// Load one seed file.
pub fn load_seed(path: &Path) -> Result<CatalogSeed> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    let expanded = shellexpand::env(&content)
        .with_context(|| format!("Failed to expand variables in {}", path.display()))?;
    let seed = CatalogSeed::from_yaml_str(&expanded)
        .with_context(|| format!("Invalid seed file: {}", path.display()))?;
    debug!(path = %path.display(), sources = seed.sources.len(), "Loaded seed file");
    Ok(seed)
}

/// Load and merge seeds from files and directories.
///
/// Directories contribute their `.yaml`/`.yml` files in name order.
pub fn load_seeds(paths: &[PathBuf]) -> Result<CatalogSeed> {
    let mut seeds = Vec::new();
    for path in paths {
        for file in seed_files(path)? {
            seeds.push(load_seed(&file)?);
        }
    }

    let seed = CatalogSeed::merge(seeds);
    seed.validate().context("Merged catalog seed is invalid")?;
    info!(
        sources = seed.sources.len(),
        fields = seed.sources.iter().map(|s| s.fields.len()).sum::<usize>(),
        "Loaded catalog seed"
    );
    Ok(seed)
}

fn seed_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("Failed to read seed directory: {}", path.display()))?
    {
        let file = entry?.path();
        if file
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_common::metrics;

    const HRRR: &str = r#"
sources:
  - short_name: hrrr
    name: HRRR 2D Surface Data (Sub-Hourly)
    src_url: ${HRRR_TEST_BASE_URL:-https://nomads.ncep.noaa.gov/pub/data/nccf/com/hrrr/prod}
    fields:
      - metric: 1
        idx: { short_name: TMP, level: 2 m above ground }
        grib: { short_name: TMP, level: 2 m above ground }
"#;

    const GFS: &str = r#"
sources:
  - short_name: gfs
    name: GFS 0.25 Degree
    fields:
      - metric: 15
        idx: { short_name: TCDC, level: entire atmosphere }
        grib: { short_name: TCDC, level: entire atmosphere }
"#;

    #[test]
    fn test_default_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hrrr.yaml");
        fs::write(&path, HRRR).unwrap();

        let seed = load_seed(&path).unwrap();
        assert_eq!(
            seed.sources[0].src_url.as_deref(),
            Some("https://nomads.ncep.noaa.gov/pub/data/nccf/com/hrrr/prod")
        );
        assert_eq!(seed.sources[0].fields[0].metric, metrics::TEMP);
    }

    #[test]
    fn test_directory_merged_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_hrrr.yaml"), HRRR).unwrap();
        fs::write(dir.path().join("a_gfs.yml"), GFS).unwrap();
        fs::write(dir.path().join("README.md"), "not a seed").unwrap();

        let seed = load_seeds(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = seed.sources.iter().map(|s| s.short_name.as_str()).collect();
        assert_eq!(names, vec!["gfs", "hrrr"]);
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, GFS.replace("metric: 15", "metric: 999")).unwrap();
        assert!(load_seed(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_seed(Path::new("/nonexistent/seed.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read seed file"));
    }
}
