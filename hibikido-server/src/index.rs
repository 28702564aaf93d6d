//! Flat inner-product vector index
//!
//! Append-only store of unit vectors with monotonically assigned row ids
//! starting at 0. Search is an exhaustive inner-product scan returning the
//! top-k rows in descending score order, ties broken by the lower row id.
//! Deletion is not supported; rows belonging to deleted documents are
//! orphaned until a full rebuild.

use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"HBKX";
const VERSION: u32 = 1;

pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector and return its row id
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dim {
            return Err(Error::Index(format!(
                "dimension mismatch: expected {}, got {}",
                self.dim,
                vector.len()
            )));
        }
        let row = self.len();
        self.data.extend_from_slice(vector);
        Ok(row)
    }

    /// Inner-product top-k query
    ///
    /// Under unit-norm inputs the score is the cosine similarity in [-1, 1].
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(Error::Index(format!(
                "dimension mismatch: expected {}, got {}",
                self.dim,
                query.len()
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(row, stored)| {
                let score = stored.iter().zip(query).map(|(a, b)| a * b).sum();
                (row, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Persist to a file, atomically replacing any previous contents
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };

        {
            let mut writer = BufWriter::new(tmp.as_file());
            writer.write_all(MAGIC)?;
            writer.write_all(&VERSION.to_le_bytes())?;
            writer.write_all(&(self.dim as u32).to_le_bytes())?;
            writer.write_all(&(self.len() as u32).to_le_bytes())?;
            for value in &self.data {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
        }

        tmp.persist(path)
            .map_err(|e| Error::Index(format!("cannot replace {}: {}", path.display(), e)))?;
        debug!("Vector index saved: {} rows", self.len());
        Ok(())
    }

    /// Restore from a file written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::Index(format!(
                "not a vector index file: {}",
                path.display()
            )));
        }

        let version = read_u32(&mut reader)?;
        if version != VERSION {
            return Err(Error::Index(format!(
                "unsupported index version: {}",
                version
            )));
        }

        let dim = read_u32(&mut reader)? as usize;
        let count = read_u32(&mut reader)? as usize;

        let mut data = vec![0f32; dim * count];
        let mut buf = [0u8; 4];
        for value in &mut data {
            reader.read_exact(&mut buf)?;
            *value = f32::from_le_bytes(buf);
        }

        Ok(Self { dim, data })
    }

    /// Load the persisted index, or start a fresh one if the file is absent
    pub fn load_or_create(path: &Path, dim: usize) -> Result<Self> {
        if path.exists() {
            let index = Self::load(path)?;
            if index.dim != dim {
                return Err(Error::Index(format!(
                    "persisted index has dimension {}, expected {}",
                    index.dim, dim
                )));
            }
            info!("Loaded vector index with {} entries", index.len());
            Ok(index)
        } else {
            info!("Created new vector index");
            Ok(Self::new(dim))
        }
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0f32; dim];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn rows_are_assigned_monotonically() {
        let mut index = VectorIndex::new(4);
        assert_eq!(index.add(&unit(4, 0)).unwrap(), 0);
        assert_eq!(index.add(&unit(4, 1)).unwrap(), 1);
        assert_eq!(index.add(&unit(4, 2)).unwrap(), 2);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new(4);
        assert!(index.add(&[1.0, 0.0]).is_err());
        assert!(index.search(&[1.0, 0.0], 5).is_err());
    }

    #[test]
    fn search_orders_by_descending_score() {
        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[0.0, 1.0]).unwrap();
        index.add(&[0.6, 0.8]).unwrap();

        let hits = index.search(&[0.0, 1.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[2].0, 0);
        assert!(hits[0].1 > hits[1].1 && hits[1].1 > hits[2].1);
    }

    #[test]
    fn ties_break_toward_the_lower_row() {
        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();
        index.add(&[1.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 1);
    }

    #[test]
    fn k_zero_returns_nothing() {
        let mut index = VectorIndex::new(2);
        index.add(&[1.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.index");

        let mut index = VectorIndex::new(3);
        index.add(&[1.0, 0.0, 0.0]).unwrap();
        index.add(&[0.0, 0.6, 0.8]).unwrap();
        index.save(&path).unwrap();

        let restored = VectorIndex::load(&path).unwrap();
        assert_eq!(restored.dim(), 3);
        assert_eq!(restored.len(), 2);

        let hits = restored.search(&[0.0, 0.6, 0.8], 1).unwrap();
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn load_or_create_starts_empty_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.index");
        let index = VectorIndex::load_or_create(&path, 8).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn load_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.index");
        std::fs::write(&path, b"not an index at all").unwrap();
        assert!(VectorIndex::load(&path).is_err());
    }
}
