use crate::run::RunId;
use crate::status::TestStatus;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// AST 的根节点, 代表一个尚未绑定到具体测试运行的查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    /// 需要查询的测试运行 ID, 保持请求中的顺序
    pub run_ids: Vec<RunId>,
    /// 备选条件树列表, 任一条件树成立即命中
    pub exists: Vec<ItemQuery>,
}

/// 针对单个测试的条件表达式树
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemQuery {
    /// 测试名子串匹配, 例如 `{"pattern": "/dom/"}`
    TestNamePattern { pattern: String },
    /// 指定浏览器的运行结果等于某状态
    StatusEq { browser_name: String, status: TestStatus },
    /// 指定浏览器的运行结果不等于某状态
    StatusNeq { browser_name: String, status: TestStatus },
    /// 逻辑非运算 (NOT)
    Not(Box<ItemQuery>),
    /// 逻辑或运算 (OR), 至少一个子条件
    Or(Vec<ItemQuery>),
    /// 逻辑与运算 (AND), 至少一个子条件
    And(Vec<ItemQuery>),
    /// 常量真, 解析器不会产生
    True,
    /// 常量假, 解析器不会产生
    False,
}

impl ItemQuery {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        ItemQuery::TestNamePattern { pattern: pattern.into() }
    }

    pub fn status_eq(browser_name: impl Into<String>, status: TestStatus) -> Self {
        ItemQuery::StatusEq { browser_name: browser_name.into(), status }
    }

    pub fn status_neq(browser_name: impl Into<String>, status: TestStatus) -> Self {
        ItemQuery::StatusNeq { browser_name: browser_name.into(), status }
    }

    pub fn negate(arg: ItemQuery) -> Self {
        ItemQuery::Not(Box::new(arg))
    }

    /// 叶子节点 (原子条件) 判断
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            ItemQuery::TestNamePattern { .. } | ItemQuery::StatusEq { .. } | ItemQuery::StatusNeq { .. }
        )
    }
}

#[derive(Serialize)]
struct NotStatus {
    not: TestStatus,
}

/// 序列化为与解析器输入一致的线上格式
impl Serialize for ItemQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ItemQuery::TestNamePattern { pattern } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("pattern", pattern)?;
                map.end()
            }
            ItemQuery::StatusEq { browser_name, status } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("browser_name", browser_name)?;
                map.serialize_entry("status", status)?;
                map.end()
            }
            ItemQuery::StatusNeq { browser_name, status } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("browser_name", browser_name)?;
                map.serialize_entry("status", &NotStatus { not: *status })?;
                map.end()
            }
            ItemQuery::Not(arg) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("not", arg)?;
                map.end()
            }
            ItemQuery::Or(args) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("or", args)?;
                map.end()
            }
            ItemQuery::And(args) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("and", args)?;
                map.end()
            }
            // 常量不属于线上语言
            ItemQuery::True => serializer.serialize_bool(true),
            ItemQuery::False => serializer.serialize_bool(false),
        }
    }
}

impl Serialize for RunQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RunQuery", 2)?;
        state.serialize_field("run_ids", &self.run_ids)?;
        match self.exists.as_slice() {
            [single] => state.serialize_field("query", single)?,
            alternatives => state.serialize_field("query", alternatives)?,
        }
        state.end()
    }
}
