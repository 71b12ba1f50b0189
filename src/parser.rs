//! 查询请求的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse_str()
//!   └─ parse_value()
//!        ├─ "run_ids" → 非空整数列表, 缺失或为空即报错
//!        └─ "query"   → 单个条件对象, 或非空的条件对象列表 (备选条件)
//!                        └─ parse_item()
//!                             ├─ try_pattern()      {"pattern": ...}
//!                             ├─ try_status_eq()    {"browser_name": ..., "status": "PASS"}
//!                             ├─ try_status_neq()   {"browser_name": ..., "status": {"not": "PASS"}}
//!                             ├─ try_not()          {"not": <条件>}          (递归调用parse_item)
//!                             ├─ try_or()           {"or": [<条件>, ...]}    (递归调用parse_item)
//!                             └─ try_and()          {"and": [<条件>, ...]}   (递归调用parse_item)
//! ```
//!
//! ## 形状判定
//!
//! 条件对象没有类型标签, 仅凭键是否存在来区分。按上图顺序依次尝试每种形状:
//!
//! 1. 必需的键缺失或 JSON 类型不符 → 该形状不匹配, 记录原因后尝试下一个
//! 2. 必需的键齐全且类型正确 → 接受该形状, 之后的校验错误直接返回
//!    (未知浏览器、未知状态、空的 `or`/`and`、子条件错误)
//! 3. 所有形状都不匹配 → 返回 [`ParseError::NoMatchingShape`], 列出每种形状的失败原因
//!
//! 因此 `{"pattern": "a", "or": []}` 会被解析为名称匹配, 而不是空的析取。
//!
//! ## 解析示例
//!
//! ```text
//! // 同一浏览器在查询的运行中既有通过又有失败 (不稳定测试)
//! {"run_ids": [1, 2],
//!  "query": {"and": [{"browser_name": "chrome", "status": "PASS"},
//!                    {"browser_name": "chrome", "status": "FAIL"}]}}
//!
//! // 多个备选条件, 任一成立即可
//! {"run_ids": [1], "query": [{"pattern": "/dom/"}, {"pattern": "/html/"}]}
//! ```

use crate::ast::{ItemQuery, RunQuery};
use crate::config::{SearchConfig, DEFAULT_BROWSER_NAMES};
use crate::status::TestStatus;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// 条件对象的六种形状, 顺序即尝试顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    TestNamePattern,
    StatusEq,
    StatusNeq,
    Not,
    Or,
    And,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::TestNamePattern => "test name pattern",
            Shape::StatusEq => "test status constraint",
            Shape::StatusNeq => "negated test status constraint",
            Shape::Not => "negation",
            Shape::Or => "disjunction",
            Shape::And => "conjunction",
        };
        f.write_str(name)
    }
}

/// 某个形状不匹配的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub shape: Shape,
    pub reason: String,
}

fn describe_mismatches(tried: &[ShapeMismatch]) -> String {
    tried
        .iter()
        .map(|m| format!("{} ({})", m.shape, m.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing run query property: \"{0}\"")]
    MissingField(&'static str),

    #[error("property \"{field}\" must be {expected}")]
    InvalidType { field: &'static str, expected: &'static str },

    #[error("invalid browser name: \"{0}\"")]
    UnknownBrowser(String),

    #[error("invalid test status: \"{0}\"")]
    UnknownStatus(String),

    #[error("non-empty disjunction required: \"or\" has no arguments")]
    EmptyDisjunction,

    #[error("non-empty conjunction required: \"and\" has no arguments")]
    EmptyConjunction,

    #[error("run query property \"query\" must not be an empty list")]
    EmptyAlternatives,

    #[error("failed to parse query fragment as {}", describe_mismatches(.tried))]
    NoMatchingShape { tried: Vec<ShapeMismatch> },
}

impl ParseError {
    /// 形状正确但取值不在已知集合内 (浏览器名或状态)
    pub fn is_domain_error(&self) -> bool {
        matches!(self, ParseError::UnknownBrowser(_) | ParseError::UnknownStatus(_))
    }
}

/// 单个形状的尝试结果
enum Attempt {
    Accepted(ItemQuery),
    Mismatch(String),
}

type ShapeRule = fn(&QueryParser, &Map<String, Value>) -> Result<Attempt, ParseError>;

const SHAPES: [(Shape, ShapeRule); 6] = [
    (Shape::TestNamePattern, QueryParser::try_pattern),
    (Shape::StatusEq, QueryParser::try_status_eq),
    (Shape::StatusNeq, QueryParser::try_status_neq),
    (Shape::Not, QueryParser::try_not),
    (Shape::Or, QueryParser::try_or),
    (Shape::And, QueryParser::try_and),
];

/// 读取非空字符串字段, 缺失、为空或类型不符时返回不匹配原因
fn non_empty_str<'v>(obj: &'v Map<String, Value>, key: &str) -> Result<&'v str, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(format!("missing \"{}\"", key)),
        Some(Value::String(s)) if s.is_empty() => Err(format!("missing \"{}\"", key)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("\"{}\" is not a string", key)),
    }
}

#[derive(Debug, Clone)]
pub struct QueryParser {
    /// 已知浏览器名, 统一小写
    browsers: BTreeSet<String>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new(DEFAULT_BROWSER_NAMES)
    }
}

impl QueryParser {
    pub fn new<I, S>(browser_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            browsers: browser_names
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.browser_names)
    }

    pub fn browser_names(&self) -> impl Iterator<Item = &str> {
        self.browsers.iter().map(String::as_str)
    }

    /// 从 JSON 文本解析查询请求
    pub fn parse_str(&self, input: &str) -> Result<RunQuery, ParseError> {
        let value: Value = serde_json::from_str(input)?;
        self.parse_value(&value)
    }

    /// 从已解码的 JSON 值解析查询请求
    pub fn parse_value(&self, value: &Value) -> Result<RunQuery, ParseError> {
        let obj = value.as_object().ok_or(ParseError::InvalidType {
            field: "$",
            expected: "an object",
        })?;

        let run_ids = self.parse_run_ids(obj)?;

        let exists = match obj.get("query") {
            None | Some(Value::Null) => return Err(ParseError::MissingField("query")),
            Some(Value::Array(items)) if items.is_empty() => {
                return Err(ParseError::EmptyAlternatives)
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| self.parse_item(item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(item) => vec![self.parse_item(item)?],
        };

        Ok(RunQuery { run_ids, exists })
    }

    fn parse_run_ids(&self, obj: &Map<String, Value>) -> Result<Vec<i64>, ParseError> {
        let ids = match obj.get("run_ids") {
            None | Some(Value::Null) => return Err(ParseError::MissingField("run_ids")),
            Some(Value::Array(ids)) => ids,
            Some(_) => return Err(invalid_run_ids()),
        };
        if ids.is_empty() {
            return Err(ParseError::MissingField("run_ids"));
        }
        ids.iter().map(|id| id.as_i64().ok_or_else(invalid_run_ids)).collect()
    }

    /// 解析单个条件对象, 按固定顺序尝试每种形状
    pub fn parse_item(&self, value: &Value) -> Result<ItemQuery, ParseError> {
        let Some(obj) = value.as_object() else {
            return Err(ParseError::NoMatchingShape {
                tried: SHAPES
                    .iter()
                    .map(|(shape, _)| ShapeMismatch {
                        shape: *shape,
                        reason: "not an object".to_string(),
                    })
                    .collect(),
            });
        };

        let mut tried = Vec::with_capacity(SHAPES.len());
        for (shape, rule) in SHAPES {
            match rule(self, obj)? {
                Attempt::Accepted(query) => return Ok(query),
                Attempt::Mismatch(reason) => tried.push(ShapeMismatch { shape, reason }),
            }
        }
        Err(ParseError::NoMatchingShape { tried })
    }

    fn try_pattern(&self, obj: &Map<String, Value>) -> Result<Attempt, ParseError> {
        match obj.get("pattern") {
            None => Ok(Attempt::Mismatch("missing \"pattern\"".to_string())),
            Some(Value::String(pattern)) => Ok(Attempt::Accepted(ItemQuery::pattern(pattern.as_str()))),
            Some(_) => Ok(Attempt::Mismatch("\"pattern\" is not a string".to_string())),
        }
    }

    fn try_status_eq(&self, obj: &Map<String, Value>) -> Result<Attempt, ParseError> {
        let browser_name = match non_empty_str(obj, "browser_name") {
            Ok(name) => name,
            Err(reason) => return Ok(Attempt::Mismatch(reason)),
        };
        let status = match non_empty_str(obj, "status") {
            Ok(status) => status,
            Err(reason) => return Ok(Attempt::Mismatch(reason)),
        };
        Ok(Attempt::Accepted(ItemQuery::StatusEq {
            browser_name: self.check_browser(browser_name)?,
            status: check_status(status)?,
        }))
    }

    fn try_status_neq(&self, obj: &Map<String, Value>) -> Result<Attempt, ParseError> {
        let browser_name = match non_empty_str(obj, "browser_name") {
            Ok(name) => name,
            Err(reason) => return Ok(Attempt::Mismatch(reason)),
        };
        let status = match obj.get("status") {
            Some(Value::Object(status)) => match non_empty_str(status, "not") {
                Ok(status) => status,
                Err(reason) => return Ok(Attempt::Mismatch(format!("status: {}", reason))),
            },
            Some(_) => return Ok(Attempt::Mismatch("\"status\" is not an object".to_string())),
            None => return Ok(Attempt::Mismatch("missing \"status.not\"".to_string())),
        };
        Ok(Attempt::Accepted(ItemQuery::StatusNeq {
            browser_name: self.check_browser(browser_name)?,
            status: check_status(status)?,
        }))
    }

    fn try_not(&self, obj: &Map<String, Value>) -> Result<Attempt, ParseError> {
        match obj.get("not") {
            None | Some(Value::Null) => Ok(Attempt::Mismatch("missing \"not\"".to_string())),
            Some(arg) => Ok(Attempt::Accepted(ItemQuery::negate(self.parse_item(arg)?))),
        }
    }

    fn try_or(&self, obj: &Map<String, Value>) -> Result<Attempt, ParseError> {
        match self.list_arg(obj, "or")? {
            Ok(args) if args.is_empty() => Err(ParseError::EmptyDisjunction),
            Ok(args) => Ok(Attempt::Accepted(ItemQuery::Or(args))),
            Err(reason) => Ok(Attempt::Mismatch(reason)),
        }
    }

    fn try_and(&self, obj: &Map<String, Value>) -> Result<Attempt, ParseError> {
        match self.list_arg(obj, "and")? {
            Ok(args) if args.is_empty() => Err(ParseError::EmptyConjunction),
            Ok(args) => Ok(Attempt::Accepted(ItemQuery::And(args))),
            Err(reason) => Ok(Attempt::Mismatch(reason)),
        }
    }

    /// 解析 `or`/`and` 的参数列表; 外层错误为致命错误, 内层错误为不匹配原因
    fn list_arg(
        &self,
        obj: &Map<String, Value>,
        key: &str,
    ) -> Result<Result<Vec<ItemQuery>, String>, ParseError> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(Err(format!("missing \"{}\"", key))),
            Some(Value::Array(items)) => {
                let args = items
                    .iter()
                    .map(|item| self.parse_item(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Ok(args))
            }
            Some(_) => Ok(Err(format!("\"{}\" is not a list", key))),
        }
    }

    fn check_browser(&self, browser_name: &str) -> Result<String, ParseError> {
        let lower = browser_name.to_lowercase();
        if self.browsers.contains(&lower) {
            Ok(lower)
        } else {
            Err(ParseError::UnknownBrowser(browser_name.to_string()))
        }
    }
}

fn invalid_run_ids() -> ParseError {
    ParseError::InvalidType {
        field: "run_ids",
        expected: "a list of integers",
    }
}

fn check_status(status: &str) -> Result<TestStatus, ParseError> {
    TestStatus::parse_strict(status).ok_or_else(|| ParseError::UnknownStatus(status.to_string()))
}
