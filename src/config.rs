//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// 默认的已知浏览器名
pub const DEFAULT_BROWSER_NAMES: [&str; 4] = ["chrome", "edge", "firefox", "safari"];

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {0}")]
    NotFound(String),

    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// SQL 后端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// 测试结果表名
    pub table: String,
    /// IN 列表中允许的最大运行数
    pub max_in_values: usize,
    /// 同一组运行上的状态析取达到该数量时合并为 IN
    pub max_or_conditions_for_in: usize,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            table: "test_results".to_string(),
            max_in_values: 1000,
            max_or_conditions_for_in: 2,
        }
    }
}

/// 查询引擎配置, 缺失的字段使用默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 解析器接受的浏览器名
    pub browser_names: Vec<String>,
    /// 后端接受的最大查询规模
    pub max_query_size: usize,
    pub sql: SqlConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            browser_names: DEFAULT_BROWSER_NAMES.iter().map(|s| s.to_string()).collect(),
            max_query_size: 1000,
            sql: SqlConfig::default(),
        }
    }
}

impl SearchConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(display));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}
