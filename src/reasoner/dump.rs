//! Constraint dumps for offline inspection of model creation.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::formula::Formula;

const DIGEST_PREFIX: usize = 12;

/// Writes constraint sets as JSON lines into a directory.
///
/// File names are `constraints_<count>_<digest>.jsonl`, where the digest is a
/// blake3 prefix over the written lines, so identical sets map to one file.
#[derive(Debug, Clone)]
pub struct ConstraintDump {
    dir: PathBuf,
}

impl ConstraintDump {
    /// Dumps into `dir`, created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `constraints` and returns the file path.
    pub fn write(&self, constraints: &[Formula]) -> io::Result<PathBuf> {
        let mut lines = Vec::with_capacity(constraints.len());
        for c in constraints {
            lines.push(serde_json::to_string(c).map_err(io::Error::other)?);
        }
        let mut hasher = blake3::Hasher::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize().to_hex();
        let name = format!("constraints_{}_{}.jsonl", constraints.len(), &digest[..DIGEST_PREFIX]);

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let mut out = BufWriter::new(fs::File::create(&path)?);
        for line in &lines {
            out.write_all(line.as_bytes())?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_literal;

    #[test]
    fn writes_one_line_per_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let dump = ConstraintDump::new(dir.path().join("dumps"));
        let p = Formula::literal(&parse_literal("loc(1)").unwrap()).unwrap();
        let constraints = vec![Formula::or(vec![p.clone(), Formula::not(p)]), Formula::truth()];

        let path = dump.write(&constraints).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("constraints_2_"), "{name}");
        assert!(name.ends_with(".jsonl"));

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<Formula> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, constraints);

        assert_eq!(dump.write(&constraints).unwrap(), path);
    }
}
