//! On-disk cache of built catalog tiers.
//!
//! Each tier is stored as one bincode record compressed with zstd. The file
//! name embeds an xxh3 digest of everything that can change a reference
//! raster or hash, so a changed font, character set, style list or
//! raster/hash parameter simply misses the cache.

use std::fs;
use std::path::{Path, PathBuf};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use perceptual::{HashConfig, HASH_VERSION};
use raster::{RasterConfig, Tier};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;
use zstd::{decode_all, encode_all};

use crate::charset::CharacterSet;
use crate::entry::{ReferenceEntry, TierCatalog};
use crate::error::CatalogError;
use crate::style::Style;

/// Bump this value whenever the on-disk tier record layout changes.
pub const CATALOG_SCHEMA_VERSION: u16 = 2;

/// Everything a cached tier depends on.
#[derive(Debug, Clone, Serialize)]
pub struct CacheKeyParts<'a> {
    pub family_fingerprint: u64,
    pub character_set: CharacterSet,
    pub styles: &'a [Style],
    pub tier: Tier,
    pub raster: &'a RasterConfig,
    pub hash: &'a HashConfig,
}

impl CacheKeyParts<'_> {
    pub fn digest(&self) -> Result<u64, CatalogError> {
        let bytes = encode_to_vec((CATALOG_SCHEMA_VERSION, HASH_VERSION, self), standard())?;
        Ok(xxh3_64(&bytes))
    }
}

#[derive(Serialize)]
struct TierRecordRef<'a> {
    schema_version: u16,
    key: u64,
    tier: Tier,
    entries: &'a [ReferenceEntry],
}

#[derive(Deserialize)]
struct TierRecord {
    schema_version: u16,
    key: u64,
    tier: Tier,
    entries: Vec<ReferenceEntry>,
}

/// Directory of compressed tier records.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    dir: PathBuf,
    level: i32,
}

impl CatalogCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            level: 3,
        }
    }

    /// Zstd level (1-22); higher is smaller but slower to write.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, family: &str, tier: Tier, key: u64) -> PathBuf {
        let slug: String = family
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        self.dir
            .join(format!("{slug}-{}-{key:016x}.bin.zst", tier.side()))
    }

    /// Read a cached tier. `Ok(None)` when nothing is cached under `key`;
    /// an error when a file exists but cannot be trusted.
    pub fn load(
        &self,
        family: &str,
        tier: Tier,
        key: u64,
    ) -> Result<Option<TierCatalog>, CatalogError> {
        let path = self.path_for(family, tier, key);
        if !path.exists() {
            return Ok(None);
        }
        let compressed = fs::read(&path).map_err(|err| CatalogError::cache_io(&path, err))?;
        let bytes = decode_all(&compressed[..]).map_err(|err| CatalogError::Decode(err.to_string()))?;
        let (record, _): (TierRecord, usize) = decode_from_slice(&bytes, standard())?;

        if record.schema_version != CATALOG_SCHEMA_VERSION {
            return Err(CatalogError::StaleCache(format!(
                "schema {} != {}",
                record.schema_version, CATALOG_SCHEMA_VERSION
            )));
        }
        if record.key != key || record.tier != tier {
            return Err(CatalogError::StaleCache(format!(
                "{} holds key {:016x} at {}",
                path.display(),
                record.key,
                record.tier
            )));
        }
        if let Some(entry) = record.entries.iter().find(|e| e.raster.tier() != tier || e.hash.tier() != tier) {
            return Err(CatalogError::StaleCache(format!(
                "entry {} is not at {tier}",
                entry.key
            )));
        }
        Ok(Some(TierCatalog::new(tier, record.entries)))
    }

    /// Write a tier atomically (temp file + rename) and return its path.
    pub fn store(
        &self,
        family: &str,
        key: u64,
        catalog: &TierCatalog,
    ) -> Result<PathBuf, CatalogError> {
        fs::create_dir_all(&self.dir).map_err(|err| CatalogError::cache_io(&self.dir, err))?;
        let record = TierRecordRef {
            schema_version: CATALOG_SCHEMA_VERSION,
            key,
            tier: catalog.tier(),
            entries: catalog.entries(),
        };
        let bytes = encode_to_vec(&record, standard())?;
        let compressed =
            encode_all(&bytes[..], self.level).map_err(|err| CatalogError::Encode(err.to_string()))?;

        let path = self.path_for(family, catalog.tier(), key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, compressed).map_err(|err| CatalogError::cache_io(&tmp, err))?;
        fs::rename(&tmp, &path).map_err(|err| CatalogError::cache_io(&path, err))?;
        Ok(path)
    }

    /// Remove every cached tier for `family`; returns how many files went.
    pub fn purge(&self, family: &str) -> Result<usize, CatalogError> {
        let sample_path = self.path_for(family, Tier::T128, 0);
        let Some(prefix) = sample_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split_once('-'))
            .map(|(slug, _)| format!("{slug}-"))
        else {
            return Ok(0);
        };
        let read = match fs::read_dir(&self.dir) {
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(CatalogError::cache_io(&self.dir, err)),
        };
        let mut removed = 0;
        for entry in read.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".bin.zst") {
                fs::remove_file(entry.path()).map_err(|err| CatalogError::cache_io(entry.path(), err))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
