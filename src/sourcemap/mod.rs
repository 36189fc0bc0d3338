use crate::Result;
use sourcemap::SourceMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// A source coordinate: original or compiled, both expressed the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
}

/// Ordered filename-rewrite patterns tried by [`SourceMapManager::find_compiled`].
/// Each entry rewrites a source extension to its compiled counterpart.
const REWRITE_PATTERNS: &[(&str, &str)] = &[(".ts", ".js"), (".tsx", ".js"), (".mts", ".mjs")];

struct CachedMap {
    map: SourceMap,
    original_dir: PathBuf,
}

/// Loads, caches, and bidirectionally maps between source and compiled coordinates.
/// Absence of a mapping is a first-class `None` result, never an error; a malformed
/// map is logged once per path and then treated as absent.
pub struct SourceMapManager {
    cache: Arc<RwLock<HashMap<String, Option<Arc<CachedMap>>>>>,
    output_dir: Option<String>,
}

impl SourceMapManager {
    pub fn new(output_dir: Option<String>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            output_dir,
        }
    }

    /// Translate a source-file location to its compiled-file location, if a loaded
    /// map covers it.
    pub async fn map_source_to_compiled(&self, source_file: &str, line: u32, column: Option<u32>) -> Option<Location> {
        let compiled_file = self.find_compiled(source_file).await?;
        let cached = self.load(&compiled_file).await?;

        let source_name = Path::new(source_file)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(source_file);

        let token = cached.map.tokens().find(|t| {
            t.get_source()
                .map(|s| s.ends_with(source_name))
                .unwrap_or(false)
                && t.get_src_line() == line
                && column.map(|c| t.get_src_col() == c).unwrap_or(true)
        })?;

        Some(Location {
            file: compiled_file,
            line: token.get_dst_line(),
            column: Some(token.get_dst_col()),
        })
    }

    /// Translate a compiled-file location back to its original source location.
    pub async fn map_compiled_to_source(&self, compiled_file: &str, line: u32, column: Option<u32>) -> Option<Location> {
        let cached = self.load(compiled_file).await?;
        let token = cached.map.lookup_token(line, column.unwrap_or(0))?;
        let source = token.get_source()?;

        Some(Location {
            file: cached.original_dir.join(source).to_string_lossy().into_owned(),
            line: token.get_src_line(),
            column: Some(token.get_src_col()),
        })
    }

    /// Find the compiled artifact a given source path maps to, by convention.
    /// Tries the configured output-dir remap first, then each rewrite pattern.
    pub async fn find_compiled(&self, source_file: &str) -> Option<String> {
        for (from, to) in REWRITE_PATTERNS {
            if let Some(stripped) = source_file.strip_suffix(from) {
                let candidate = format!("{}{}", stripped, to);
                let candidate = match &self.output_dir {
                    Some(dir) => remap_to_output_dir(&candidate, dir),
                    None => candidate,
                };
                if Path::new(&candidate).is_file() {
                    return Some(candidate);
                }
            }
        }
        if Path::new(source_file).is_file() {
            return Some(source_file.to_string());
        }
        None
    }

    async fn load(&self, compiled_file: &str) -> Option<Arc<CachedMap>> {
        if let Some(hit) = self.cache.read().await.get(compiled_file) {
            return hit.clone();
        }

        let parsed = self.parse(compiled_file);
        if parsed.is_none() {
            warn!("no usable source map for {}", compiled_file);
        }
        self.cache.write().await.insert(compiled_file.to_string(), parsed.clone());
        parsed
    }

    fn parse(&self, compiled_file: &str) -> Option<Arc<CachedMap>> {
        let compiled_path = Path::new(compiled_file);
        let original_dir = compiled_path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

        let map_bytes = std::fs::read(format!("{}.map", compiled_file))
            .ok()
            .or_else(|| self.read_inline_map(compiled_path))?;

        match SourceMap::from_reader(map_bytes.as_slice()) {
            Ok(map) => Some(Arc::new(CachedMap { map, original_dir })),
            Err(e) => {
                warn!("malformed source map for {}: {}", compiled_file, e);
                None
            }
        }
    }

    fn read_inline_map(&self, compiled_path: &Path) -> Option<Vec<u8>> {
        let contents = std::fs::read_to_string(compiled_path).ok()?;
        let comment = contents.lines().rev().find(|l| l.contains("sourceMappingURL="))?;
        let url = comment.split("sourceMappingURL=").nth(1)?.trim();
        let map_path = compiled_path.parent().unwrap_or_else(|| Path::new(".")).join(url);
        std::fs::read(map_path).ok()
    }
}

fn remap_to_output_dir(candidate: &str, output_dir: &str) -> String {
    Path::new(output_dir)
        .join(Path::new(candidate).file_name().unwrap_or_default())
        .to_string_lossy()
        .into_owned()
}
