//! 目录缓存：每种语言一个 JSON 文件，先写临时文件再原子重命名。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::{CatalogTree, SeriesNode};
use crate::common::models::Language;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("缓存读写失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("缓存 JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("缓存结构无效: {0}")]
    Schema(String),
}

/// 目录缓存接口：抓取器写入，下载器读取
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, language: Language) -> Result<Option<CatalogTree>, CacheError>;
    async fn save(&self, tree: &CatalogTree) -> Result<(), CacheError>;
}

// 带语言标记的缓存文档（当前写入格式）
#[derive(Debug, Serialize, Deserialize)]
pub struct TaggedCatalog {
    pub language: Language,
    pub series: Vec<SeriesNode>,
    #[serde(default = "default_complete")]
    pub complete: bool,
    #[serde(default)]
    pub failed: Vec<String>,
}

fn default_complete() -> bool {
    true
}

/// 磁盘上可能出现的两种缓存文档
#[derive(Debug)]
pub enum CatalogDocument {
    /// 旧格式：只有系列数组，语言由文件决定
    Flat(Vec<SeriesNode>),
    /// 带语言标记与抓取状态的对象
    Tagged(TaggedCatalog),
}

impl CatalogDocument {
    // 顶层是数组还是对象决定唯一的解码方式，其他形状直接拒绝
    pub fn decode(value: Value) -> Result<Self, CacheError> {
        match value {
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(migrate_legacy_node)
                    .collect::<Result<Vec<_>, _>>()?;
                let series = serde_json::from_value(Value::Array(items))?;
                Ok(CatalogDocument::Flat(series))
            }
            Value::Object(mut map) => {
                let Some(series) = map.remove("series") else {
                    return Err(CacheError::Schema("对象缺少 series 字段".to_string()));
                };
                let Value::Array(items) = series else {
                    return Err(CacheError::Schema("series 必须是数组".to_string()));
                };
                let items = items
                    .into_iter()
                    .map(migrate_legacy_node)
                    .collect::<Result<Vec<_>, _>>()?;
                map.insert("series".to_string(), Value::Array(items));
                Ok(CatalogDocument::Tagged(serde_json::from_value(Value::Object(map))?))
            }
            other => Err(CacheError::Schema(format!(
                "顶层必须是数组或对象，实际为: {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn into_tree(self, language: Language) -> Result<CatalogTree, CacheError> {
        match self {
            CatalogDocument::Flat(series) => Ok(CatalogTree {
                language,
                series,
                complete: true,
                failed: Vec::new(),
            }),
            CatalogDocument::Tagged(doc) => {
                if doc.language != language {
                    return Err(CacheError::Schema(format!(
                        "缓存语言为 {}，期望 {}",
                        doc.language, language
                    )));
                }
                Ok(CatalogTree {
                    language: doc.language,
                    series: doc.series,
                    complete: doc.complete,
                    failed: doc.failed,
                })
            }
        }
    }
}

// 旧版节点使用 "type": "series" | "container"，迁移为 "kind"；
// 两者都没有时（英文版旧工具的输出）按内容推断
fn migrate_legacy_node(item: Value) -> Result<Value, CacheError> {
    let Value::Object(mut map) = item else {
        return Err(CacheError::Schema("系列条目必须是对象".to_string()));
    };
    if !map.contains_key("kind") {
        if let Some(kind) = map.remove("type") {
            map.insert("kind".to_string(), kind);
        } else if map.contains_key("subseries") {
            map.insert("kind".to_string(), Value::from("container"));
        } else if map.contains_key("episodes") {
            map.insert("kind".to_string(), Value::from("leaf"));
        }
    }
    Ok(Value::Object(map))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 目录缓存的 JSON 文件实现
#[derive(Debug, Clone)]
pub struct JsonCacheStore {
    dir: PathBuf,
}

impl JsonCacheStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, language: Language) -> PathBuf {
        self.dir.join(format!("structure_{}.json", language))
    }
}

#[async_trait]
impl CacheStore for JsonCacheStore {
    async fn load(&self, language: Language) -> Result<Option<CatalogTree>, CacheError> {
        let path = self.path_for(language);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("缓存不存在: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let value: Value = serde_json::from_slice(&data)?;
        let tree = CatalogDocument::decode(value)?.into_tree(language)?;
        info!(
            "已加载目录缓存 {}: {} 个系列，{} 集",
            path.display(),
            tree.series.len(),
            tree.episode_count()
        );
        Ok(Some(tree))
    }

    async fn save(&self, tree: &CatalogTree) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(tree.language);
        let tmp = path.with_extension("json.tmp");

        let doc = TaggedCatalog {
            language: tree.language,
            series: tree.series.clone(),
            complete: tree.complete,
            failed: tree.failed.clone(),
        };
        let data = serde_json::to_vec_pretty(&doc)?;

        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("目录缓存已写入: {}", path.display());
        Ok(())
    }
}
