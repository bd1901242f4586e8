use std::{
    hash::{Hash, Hasher},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use fxhash::FxHasher64;
use quilt_matrix::travel_matrices::TravelMatrices;

use crate::travel_matrix_provider::TravelMatrixProvider;

const CACHE_FOLDER_ENV_VAR: &str = "QUILT_CACHE_FOLDER";

/// Stores complete matrices keyed by coordinates and provider.
pub trait MatricesCache {
    fn cache<P>(
        &self,
        provider: &TravelMatrixProvider,
        points: &[P],
        matrices: &TravelMatrices,
    ) -> Result<(), anyhow::Error>
    where
        for<'a> &'a P: Into<geo_types::Point>;

    fn get_cached<P>(
        &self,
        provider: &TravelMatrixProvider,
        points: &[P],
    ) -> Result<Option<TravelMatrices>, anyhow::Error>
    where
        for<'a> &'a P: Into<geo_types::Point>;
}

fn hash_points<H, P>(points: &[P], hasher: &mut H)
where
    H: Hasher,
    for<'a> &'a P: Into<geo_types::Point>,
{
    points.len().hash(hasher);
    for point in points {
        let point: geo_types::Point = point.into();
        hasher.write_u64(point.x().to_bits());
        hasher.write_u64(point.y().to_bits());
    }
}

fn get_filename<P>(points: &[P], provider: &TravelMatrixProvider) -> String
where
    for<'a> &'a P: Into<geo_types::Point>,
{
    let mut hasher = FxHasher64::default();

    hash_points(points, &mut hasher);
    provider.hash(&mut hasher);

    let hash = hasher.finish();
    format!("{:016x}.json", hash)
}

/// One JSON file per entry in a cache folder.
pub struct FileCache {
    folder: PathBuf,
}

impl FileCache {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Cache in the folder named by `QUILT_CACHE_FOLDER`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(CACHE_FOLDER_ENV_VAR).ok().map(Self::new)
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn checked_folder(&self) -> Result<&Path, anyhow::Error> {
        if !self.folder.is_dir() {
            return Err(anyhow::anyhow!(
                "Path {} is not a directory",
                self.folder.display()
            ));
        }

        Ok(&self.folder)
    }
}

impl MatricesCache for FileCache {
    fn cache<P>(
        &self,
        provider: &TravelMatrixProvider,
        points: &[P],
        matrices: &TravelMatrices,
    ) -> Result<(), anyhow::Error>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let filename = get_filename(points, provider);
        let file = std::fs::File::create(self.checked_folder()?.join(filename))?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        serde_json::to_writer(&mut writer, &matrices)?;
        writer.flush()?;

        Ok(())
    }

    fn get_cached<P>(
        &self,
        provider: &TravelMatrixProvider,
        points: &[P],
    ) -> Result<Option<TravelMatrices>, anyhow::Error>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        let filename = get_filename(points, provider);
        let file_path = self.checked_folder()?.join(filename);

        if !file_path.is_file() {
            return Ok(None);
        }

        let file = std::fs::File::open(file_path)?;
        let matrices: TravelMatrices = serde_json::from_reader(BufReader::new(file))?;

        if matrices.num_locations != points.len() || !matrices.is_consistent() {
            return Ok(None);
        }

        Ok(Some(matrices))
    }
}

pub struct NoCache;

impl MatricesCache for NoCache {
    fn cache<P>(
        &self,
        _provider: &TravelMatrixProvider,
        _points: &[P],
        _matrices: &TravelMatrices,
    ) -> Result<(), anyhow::Error>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        Ok(())
    }

    fn get_cached<P>(
        &self,
        _provider: &TravelMatrixProvider,
        _points: &[P],
    ) -> Result<Option<TravelMatrices>, anyhow::Error>
    where
        for<'a> &'a P: Into<geo_types::Point>,
    {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use quilt_matrix::coordinate::Coordinate;

    use super::*;

    fn create_points() -> Vec<Coordinate> {
        vec![Coordinate::new(13.0, 52.0), Coordinate::new(13.1, 52.1)]
    }

    fn create_matrices() -> TravelMatrices {
        TravelMatrices {
            num_locations: 2,
            durations: vec![Some(0.0), Some(5.0), None, Some(0.0)],
            distances: vec![Some(0.0), Some(50.0), None, Some(0.0)],
        }
    }

    #[test]
    fn test_file_cache_round_trip() {
        let folder = tempfile::tempdir().unwrap();
        let cache = FileCache::new(folder.path());
        let provider = TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 40.0 };
        let points = create_points();

        assert!(cache.get_cached(&provider, &points).unwrap().is_none());

        cache.cache(&provider, &points, &create_matrices()).unwrap();

        assert_eq!(
            cache.get_cached(&provider, &points).unwrap(),
            Some(create_matrices())
        );
    }

    #[test]
    fn test_key_depends_on_provider_and_points() {
        let points = create_points();
        let slow = TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 40.0 };
        let fast = TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 80.0 };

        assert_eq!(get_filename(&points, &slow), get_filename(&points, &slow));
        assert_ne!(get_filename(&points, &slow), get_filename(&points, &fast));
        assert_ne!(
            get_filename(&points, &slow),
            get_filename(&points[..1], &slow)
        );
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let folder = tempfile::tempdir().unwrap();
        let cache = FileCache::new(folder.path().join("missing"));
        let provider = TravelMatrixProvider::AsTheCrowFlies { speed_kmh: 40.0 };

        assert!(cache.get_cached(&provider, &create_points()).is_err());
    }
}
